mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Args, Command};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tunesync_core::Config;

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "tunesync=debug,tunesync_core=debug"
    } else {
        "tunesync=info,tunesync_core=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = load_config(&args);

    match args.command.unwrap_or(Command::Run) {
        Command::Run => commands::run::run(config),
        Command::Sample { json } => commands::sample::run(config, json),
        Command::Scan => commands::scan::run(config),
    }
}

/// Read the config, falling back to defaults when it cannot be used.
fn load_config(args: &Args) -> Config {
    let Some(path) = args.config.clone().or_else(Config::default_path) else {
        warn!("No config directory on this system, using defaults");
        return Config::default();
    };
    match Config::load(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config {}: {}, using defaults", path.display(), e);
            Config::default()
        }
    }
}
