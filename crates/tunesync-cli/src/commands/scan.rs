//! Signature diagnostics for the memory-read players.

use anyhow::Result;
use owo_colors::OwoColorize;
use strum::IntoEnumIterator;
use tunesync_core::{Config, PlayerDiscovery, PlayerKind, SystemDiscovery};

/// Resolve every anchor of each running memory-read player
pub fn run(config: Config) -> Result<()> {
    let discovery = SystemDiscovery::new(config)?;

    for kind in PlayerKind::iter().filter(|kind| kind.module().is_some()) {
        let Some(pid) = discovery.locate(kind) else {
            println!("{} {}", kind.to_string().bold(), "not running".dimmed());
            continue;
        };
        println!("{} (pid {})", kind.to_string().bold(), pid);

        match discovery.scan(kind, pid) {
            Ok(found) => {
                for (name, address) in found {
                    println!("  {:<16} {}", name, address.to_string().green());
                }
            }
            Err(e) => println!("  {} {}", "error:".red(), e),
        }
    }
    Ok(())
}
