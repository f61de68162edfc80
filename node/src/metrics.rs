//! # Prometheus Metrics
//!
//! Operational metrics for the vault node, served at `/metrics`.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] under
//! the `strongbox` prefix so they do not collide with any default global
//! registry consumers.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

use strongbox_contracts::VaultSnapshot;

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Committed user deposits.
    pub deposits_total: IntCounter,
    /// Committed user withdrawals.
    pub withdrawals_total: IntCounter,
    /// Committed recovery operations.
    pub recoveries_total: IntCounter,
    /// Rejected steps, by action.
    pub rejections_total: IntCounterVec,
    /// Ledger total per asset, in smallest units. Lossy above 2^53.
    pub asset_total_balance: GaugeVec,
    /// Audit events recorded.
    pub events_recorded: IntGauge,
    /// Time spent applying a single step.
    pub operation_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("strongbox".into()), None)?;

        let deposits_total = IntCounter::new("deposits_total", "Committed user deposits")?;
        registry.register(Box::new(deposits_total.clone()))?;

        let withdrawals_total =
            IntCounter::new("withdrawals_total", "Committed user withdrawals")?;
        registry.register(Box::new(withdrawals_total.clone()))?;

        let recoveries_total =
            IntCounter::new("recoveries_total", "Committed recovery operations")?;
        registry.register(Box::new(recoveries_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("rejections_total", "Rejected operations by action"),
            &["action"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let asset_total_balance = GaugeVec::new(
            Opts::new(
                "asset_total_balance",
                "Ledger total per asset in smallest units",
            ),
            &["asset"],
        )?;
        registry.register(Box::new(asset_total_balance.clone()))?;

        let events_recorded = IntGauge::new("events_recorded", "Audit events recorded")?;
        registry.register(Box::new(events_recorded.clone()))?;

        let operation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Time spent applying a single vault operation",
            )
            .buckets(vec![
                0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1,
            ]),
        )?;
        registry.register(Box::new(operation_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            deposits_total,
            withdrawals_total,
            recoveries_total,
            rejections_total,
            asset_total_balance,
            events_recorded,
            operation_latency_seconds,
        })
    }

    /// Records one applied step.
    pub fn record_step(&self, action: &str, ok: bool, elapsed: Duration) {
        self.operation_latency_seconds.observe(elapsed.as_secs_f64());
        if !ok {
            self.rejections_total.with_label_values(&[action]).inc();
            return;
        }
        match action {
            "deposit" => self.deposits_total.inc(),
            "withdraw" => self.withdrawals_total.inc(),
            "reassign" | "assign_excess" | "admin_top_up" | "admin_withdraw_from" => {
                self.recoveries_total.inc()
            }
            _ => {}
        }
    }

    /// Publishes per-asset totals and the event count from a snapshot.
    pub fn observe_snapshot(&self, snapshot: &VaultSnapshot) {
        for asset in &snapshot.assets {
            self.asset_total_balance
                .with_label_values(&[&asset.asset.to_hex()])
                .set(asset.total_balance as f64);
        }
        self.events_recorded.set(snapshot.event_count as i64);
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(State(metrics): State<SharedMetrics>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
