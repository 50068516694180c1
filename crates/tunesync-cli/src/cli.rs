//! CLI argument definitions for tunesync.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tunesync")]
#[command(about = "Mirrors what your desktop music player is playing to a presence status", version)]
pub struct Args {
    /// Path to config file (default: <config dir>/tunesync/config.toml)
    #[arg(short, long, value_name = "FILE", env = "TUNESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Poll the players and publish the status until Ctrl+C (default)
    Run,
    /// Sample every running player once and print what it reports
    Sample {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve the memory signatures of every running player
    Scan,
}
