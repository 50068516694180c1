//! Main polling mode command.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tunesync_core::{
    Config, FileSink, LogSink, PollingOrchestrator, PresenceSink, Publisher, SinkKind,
    SystemDiscovery,
};

/// Poll the players and publish the status until Ctrl+C
pub fn run(config: Config) -> Result<()> {
    let cancel = setup_shutdown_handler()?;
    let sink = build_sink(&config)?;
    let publisher = Publisher::new(sink, config.format.formatter());
    let polling = config.polling.clone();
    let discovery = SystemDiscovery::new(config).context("Failed to set up player discovery")?;

    let mut orchestrator = PollingOrchestrator::new(discovery, publisher, polling);

    println!("Watching for music players... (Press Ctrl+C to quit)");
    super::runtime()?.block_on(orchestrator.run(cancel));

    println!("Shutdown complete.");
    Ok(())
}

/// Cancel the polling loop on Ctrl+C
fn setup_shutdown_handler() -> Result<CancellationToken> {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    ctrlc::set_handler(move || {
        println!("\nShutting down...");
        trigger.cancel();
    })?;
    Ok(cancel)
}

fn build_sink(config: &Config) -> Result<Box<dyn PresenceSink>> {
    match config.sink.kind {
        SinkKind::Log => Ok(Box::new(LogSink)),
        SinkKind::File => {
            let path = config
                .sink
                .path
                .clone()
                .context("sink.path is required for the file sink")?;
            info!("Writing status to {}", path.display());
            Ok(Box::new(FileSink::new(path)))
        }
    }
}
