//! Command line interface definition.

use clap::{Args, Parser, Subcommand};

/// Mongopilot: per-node sidecar controller for MongoDB replica sets.
#[derive(Parser)]
#[command(name = "mongopilot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start the controller.
    Serve(ServeArgs),
    /// Print version information.
    Version,
}

/// Arguments for the serve command.
///
/// Everything is environment-driven in deployment; the flags below exist
/// for local runs and override the corresponding variables.
#[derive(Args)]
pub struct ServeArgs {
    /// Admin API bind port (overrides API_PORT).
    #[arg(long)]
    pub api_port: Option<u16>,

    /// Reconciler interval in milliseconds (overrides RECONCILE_INTERVAL).
    #[arg(long)]
    pub reconcile_interval_ms: Option<u64>,
}
