// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Strongbox Operator Node
//!
//! Entry point for the `strongbox-node` binary. Parses CLI arguments,
//! initializes logging and metrics, replays a vault scenario and either
//! prints the report or serves the vault's read surface over HTTP.
//!
//! The binary supports three subcommands:
//!
//! - `replay` : run a scenario and print a JSON report
//! - `serve`  : run a scenario, then serve the read API and `/metrics`
//! - `version`: print build version information

mod api;
mod cli;
mod logging;
mod metrics;
mod scenario;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use strongbox_protocol::config::VaultConfig;

use cli::{Commands, StrongboxCli, VaultArgs};
use metrics::NodeMetrics;
use scenario::{ReplayEnv, ReplayReport, Scenario};

const DEFAULT_LOG_FILTER: &str =
    "strongbox_node=info,strongbox_contracts=info,strongbox_protocol=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = StrongboxCli::parse();

    match cli.command {
        Commands::Replay(args) => replay(args),
        Commands::Serve(args) => serve(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Replays a scenario and prints the report to stdout.
fn replay(args: cli::ReplayArgs) -> Result<()> {
    logging::init_logging(DEFAULT_LOG_FILTER, args.vault.log_format)?;

    let metrics = NodeMetrics::new().context("failed to register metrics")?;
    let (_, report) = run_scenario(&args.vault, &metrics)?;

    let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
    println!("{}", json);

    if args.strict && report.rejected() > 0 {
        bail!("{} step(s) rejected", report.rejected());
    }
    Ok(())
}

/// Replays a scenario, then serves the resulting vault until shutdown.
async fn serve(args: cli::ServeArgs) -> Result<()> {
    logging::init_logging(DEFAULT_LOG_FILTER, args.vault.log_format)?;

    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    let (env, report) = run_scenario(&args.vault, &node_metrics)?;
    tracing::info!(
        steps = report.steps.len(),
        rejected = report.rejected(),
        "scenario replayed"
    );

    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            strongbox_protocol::config::PROTOCOL_VERSION,
        ),
        vault: Arc::new(env.vault),
        metrics: Arc::clone(&node_metrics),
    };

    let router = api::create_router(app_state);
    let addr = format!("{}:{}", args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", addr))?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;

    tracing::info!("strongbox-node stopped");
    Ok(())
}

/// Loads the scenario (and optional configuration override) and runs it.
fn run_scenario(args: &VaultArgs, metrics: &NodeMetrics) -> Result<(ReplayEnv, ReplayReport)> {
    let scenario = Scenario::load(&args.scenario)?;
    let config = args.config.as_deref().map(load_config).transpose()?;

    tracing::info!(
        scenario = %args.scenario.display(),
        steps = scenario.steps.len(),
        "replaying scenario"
    );

    let mut env = scenario.build(config)?;
    let report = env.run(&scenario, metrics);
    Ok((env, report))
}

/// Reads a [`VaultConfig`] from a JSON file. Missing fields take defaults.
fn load_config(path: &Path) -> Result<VaultConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}

/// Prints version information to stdout.
fn print_version() {
    println!("strongbox-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol       {}", strongbox_protocol::config::PROTOCOL_VERSION);
    println!("rustc          {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received, draining connections");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::logging::LogFormat;

    #[test]
    fn config_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{ "per_tx_limit": 42 }"#).unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.per_tx_limit, 42);
        assert_eq!(
            cfg.max_withdrawal_quote_value,
            VaultConfig::default().max_withdrawal_quote_value
        );
    }

    #[test]
    fn run_scenario_applies_config_override() {
        let mut scenario = tempfile::NamedTempFile::new().unwrap();
        scenario
            .write_all(
                br#"{
                    "admin": "admin",
                    "price": { "answer": 250000000000 },
                    "holders": [{ "holder": "alice", "asset": "NATIVE", "amount": 1000 }],
                    "steps": [
                        { "deposit": { "caller": "alice", "asset": "NATIVE", "amount": 1000 } },
                        { "withdraw": { "caller": "alice", "asset": "NATIVE", "amount": 100 } }
                    ]
                }"#,
            )
            .unwrap();
        let mut config = tempfile::NamedTempFile::new().unwrap();
        config.write_all(br#"{ "per_tx_limit": 50 }"#).unwrap();

        let args = VaultArgs {
            scenario: scenario.path().to_path_buf(),
            config: Some(config.path().to_path_buf()),
            log_format: LogFormat::Pretty,
        };
        let metrics = NodeMetrics::new().unwrap();
        let (env, report) = run_scenario(&args, &metrics).unwrap();

        assert!(report.steps[0].ok);
        assert!(!report.steps[1].ok);
        assert_eq!(env.vault.policy().per_tx_limit(), 50);
        assert_eq!(metrics.rejections_total.with_label_values(&["withdraw"]).get(), 1);
    }
}
