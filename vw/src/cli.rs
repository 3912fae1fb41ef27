//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// VersionWatch - watch a deployment for new builds
#[derive(Parser)]
#[command(
    name = "versionwatch",
    about = "Watches a deployed version marker and prompts when a new build lands",
    version,
    after_help = "Send SIGUSR1 to mark the context hidden (polling pauses) and SIGUSR2 to mark it visible again."
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch the configured version marker until an update is confirmed
    Watch {
        /// Override the poll interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Override the maximum number of checks (-1 for unbounded)
        #[arg(long)]
        max_checks: Option<i64>,
    },

    /// Print the effective configuration
    Config,
}
