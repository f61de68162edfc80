//! # REST API
//!
//! Builds the axum router that exposes a replayed vault's read surface. All
//! endpoints share application state through axum's `State` extractor. The
//! surface is read-only; writes happen through scenarios.
//!
//! Individual account balances are not served. A principal reads only its
//! own balance, and the HTTP surface has no caller identity to check.
//!
//! ## Endpoints
//!
//! | Method | Path                           | Description                     |
//! |--------|--------------------------------|---------------------------------|
//! | GET    | `/health`                      | Liveness probe                  |
//! | GET    | `/status`                      | Counters and version summary    |
//! | GET    | `/assets/:asset`               | Totals and capacity of an asset |
//! | GET    | `/price`                       | Current validated native price  |
//! | GET    | `/events`                      | Audit log, optionally filtered  |
//! | GET    | `/metrics`                     | Prometheus exposition           |

use axum::{
    extract::{FromRef, Path, Query, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use strongbox_contracts::{Counters, CustodyVault, EventRecord};
use strongbox_protocol::ledger::{Amount, Capacity};

use crate::metrics::{metrics_handler, SharedMetrics};
use crate::scenario::{parse_asset, parse_principal};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The replayed vault. Read-only from here on.
    pub vault: Arc<CustodyVault>,
    /// Prometheus metrics.
    pub metrics: SharedMetrics,
}

impl FromRef<AppState> for SharedMetrics {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.metrics)
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/assets/:asset", get(asset_handler))
        .route("/price", get(price_handler))
        .route("/events", get(events_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Number of assets the ledger knows about.
    pub assets: usize,
    /// Operation counters.
    pub counters: Counters,
    /// Audit events recorded.
    pub event_count: usize,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /assets/:asset`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssetResponse {
    /// Hex asset id.
    pub asset: String,
    pub total_balance: Amount,
    pub capacity: Capacity,
    /// `None` when capacity is unlimited.
    pub available_capacity: Option<Amount>,
    /// Custody holdings not yet on the books.
    pub custody_surplus: Amount,
    /// Number of accounts with a non-zero balance.
    pub accounts: usize,
}

/// Response payload for `GET /price`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PriceResponse {
    /// Price at 8 decimals.
    pub price: u128,
    pub observed_at: String,
    pub completed_seq: u64,
    /// Description of the upstream feed.
    pub feed: String,
}

/// Error body returned on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Query string for `GET /events`.
#[derive(Debug, Deserialize)]
pub struct EventQuery {
    /// Only events performed by this operator (label or hex address).
    pub operator: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`: returns a summary of the vault.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let vault = &state.vault;
    Json(StatusResponse {
        version: state.version.clone(),
        assets: vault.ledger().assets().len(),
        counters: vault.counters(),
        event_count: vault.events().len(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `GET /assets/:asset`: totals and capacity for one asset. Unknown assets
/// read as empty.
async fn asset_handler(
    Path(asset): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let id = parse_asset(&asset);
    let vault = &state.vault;
    Json(AssetResponse {
        asset: id.to_hex(),
        total_balance: vault.total_of(&id),
        capacity: vault.capacity_of(&id),
        available_capacity: vault.available_capacity(&id),
        custody_surplus: vault.custody_surplus(&id),
        accounts: vault.ledger().accounts_of(&id).len(),
    })
}

/// `GET /price`: the current validated native price. A quote that fails
/// validation yields 503.
async fn price_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.vault.current_quote() {
        Ok(quote) => (
            StatusCode::OK,
            Json(PriceResponse {
                price: quote.price,
                observed_at: quote.observed_at.to_rfc3339(),
                completed_seq: quote.completed_seq,
                feed: state.vault.price_feed_description(),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

/// `GET /events`: the audit log, oldest first.
async fn events_handler(
    Query(query): Query<EventQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let records: Vec<EventRecord> = match query.operator {
        Some(operator) => state
            .vault
            .event_log()
            .by_operator(&parse_principal(&operator))
            .into_iter()
            .cloned()
            .collect(),
        None => state.vault.events().to_vec(),
    };
    Json(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use strongbox_protocol::ledger::{Address, AssetId};
    use tower::ServiceExt;

    use crate::metrics::NodeMetrics;
    use crate::scenario::Scenario;

    const WORLD: &str = r#"{
        "admin": "admin",
        "price": { "answer": 250000000000 },
        "holders": [
            { "holder": "alice", "asset": "USDC", "amount": 1000 },
            { "holder": "stray", "asset": "USDC", "amount": 50 }
        ],
        "roles": [{ "principal": "ops", "role": "recovery" }],
        "steps": [
            { "set_capacity": { "caller": "admin", "asset": "USDC", "capacity": { "limited": 900 } } },
            { "deposit": { "caller": "alice", "asset": "USDC", "amount": 600 } },
            { "reassign": { "operator": "ops", "from": "alice", "to": "bob", "asset": "USDC", "amount": 100 } },
            { "side_transfer": { "holder": "stray", "asset": "USDC", "amount": 50 } }
        ]
    }"#;

    /// Creates a router over a vault replayed from `json`.
    fn router_for(json: &str) -> Router {
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        let metrics = Arc::new(NodeMetrics::new().unwrap());
        let mut env = scenario.build(None).unwrap();
        env.run(&scenario, &metrics);

        create_router(AppState {
            version: "0.1.0-test".into(),
            vault: Arc::new(env.vault),
            metrics,
        })
    }

    /// Sends a GET request and returns the (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = router_for(WORLD);
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_counters() {
        let router = router_for(WORLD);
        let (status, body) = get(&router, "/status").await;

        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.counters.deposit_count, 1);
        assert_eq!(resp.counters.recovery_count, 1);
        assert_eq!(resp.version, "0.1.0-test");
    }

    #[tokio::test]
    async fn asset_endpoint_reports_capacity_and_surplus() {
        let router = router_for(WORLD);
        let (status, body) = get(&router, "/assets/usdc").await;

        assert_eq!(status, StatusCode::OK);
        let resp: AssetResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.asset, AssetId::derive("USDC").to_hex());
        assert_eq!(resp.total_balance, 600);
        assert_eq!(resp.capacity, Capacity::Limited(900));
        assert_eq!(resp.available_capacity, Some(300));
        assert_eq!(resp.custody_surplus, 50);
        assert_eq!(resp.accounts, 2);
    }

    #[tokio::test]
    async fn account_balances_are_not_served() {
        let router = router_for(WORLD);
        let (status, _) = get(&router, "/balances/bob/USDC").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let alice = Address::from_label("alice").to_hex();
        let (status, _) = get(&router, &format!("/balances/{alice}/USDC")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn price_endpoint_returns_normalized_price() {
        let router = router_for(WORLD);
        let (status, body) = get(&router, "/price").await;

        assert_eq!(status, StatusCode::OK);
        let resp: PriceResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.price, 250_000_000_000);
        assert_eq!(resp.feed, "scenario");
    }

    #[tokio::test]
    async fn stale_price_is_service_unavailable() {
        let router = router_for(
            r#"{ "admin": "admin", "price": { "answer": 250000000000, "age_secs": 7200 } }"#,
        );
        let (status, body) = get(&router, "/price").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let resp: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(resp.error.starts_with("stale price"));
    }

    #[tokio::test]
    async fn events_filter_by_operator() {
        let router = router_for(WORLD);

        let (_, body) = get(&router, "/events").await;
        let all: Vec<EventRecord> = serde_json::from_slice(&body).unwrap();
        // role grant, capacity, deposit, reassign
        assert_eq!(all.len(), 4);

        let (_, body) = get(&router, "/events?operator=ops").await;
        let mine: Vec<EventRecord> = serde_json::from_slice(&body).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].event.kind(), "reassigned");
    }

    #[tokio::test]
    async fn metrics_endpoint_exposes_counters() {
        let router = router_for(WORLD);
        let (status, body) = get(&router, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("strongbox_deposits_total 1"));
        assert!(text.contains("strongbox_recoveries_total 1"));
    }
}
