//! # CLI Interface
//!
//! Command-line arguments for `strongbox-node`, built with `clap` derive.
//! Three subcommands: `replay`, `serve`, and `version`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Strongbox vault operator node.
///
/// Replays vault scenarios against in-memory custody and a fixed price
/// feed, and serves the resulting vault's read surface and Prometheus
/// metrics over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "strongbox-node",
    about = "Strongbox vault operator node",
    version,
    propagate_version = true
)]
pub struct StrongboxCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a scenario and print the JSON report to stdout.
    Replay(ReplayArgs),
    /// Replay a scenario, then serve the vault's read surface.
    Serve(ServeArgs),
    /// Print version information and exit.
    Version,
}

/// Options shared by every subcommand that builds a vault.
#[derive(Args, Debug)]
pub struct VaultArgs {
    /// Path to the scenario file (JSON).
    #[arg(long, short = 's', env = "STRONGBOX_SCENARIO")]
    pub scenario: PathBuf,

    /// Path to a vault configuration file (JSON). Overrides the scenario's
    /// own configuration.
    #[arg(long, short = 'c', env = "STRONGBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, env = "STRONGBOX_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Arguments for the `replay` subcommand.
#[derive(Args, Debug)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub vault: VaultArgs,

    /// Exit with an error if any step was rejected.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the `serve` subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub vault: VaultArgs,

    /// Port for the HTTP API and `/metrics`.
    #[arg(long, short = 'p', env = "STRONGBOX_PORT", default_value_t = 9750)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, env = "STRONGBOX_BIND", default_value = "127.0.0.1")]
    pub bind: String,
}
