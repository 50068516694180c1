//! One-shot sampling of every running player.

use anyhow::Result;
use owo_colors::OwoColorize;
use serde_json::json;
use strum::IntoEnumIterator;
use tunesync_core::format::format_clock;
use tunesync_core::{
    Config, PlayerDiscovery, PlayerKind, StatusFormatter, SystemDiscovery, TrackSnapshot,
    TrackSource,
};

/// What one player reported.
enum Outcome {
    NotRunning,
    Failed(String),
    Idle,
    Playing(TrackSnapshot),
}

/// Sample each player once and print the result
pub fn run(config: Config, json_output: bool) -> Result<()> {
    let formatter = config.format.formatter();
    let discovery = SystemDiscovery::new(config)?;

    let outcomes: Vec<(PlayerKind, Option<u32>, Outcome)> =
        super::runtime()?.block_on(async {
            let mut outcomes = Vec::new();
            for kind in PlayerKind::iter() {
                let pid = discovery.locate(kind);
                let outcome = match pid {
                    Some(pid) => sample_player(&discovery, kind, pid).await,
                    None => Outcome::NotRunning,
                };
                outcomes.push((kind, pid, outcome));
            }
            outcomes
        });

    if json_output {
        print_json(&outcomes, &formatter)?;
    } else {
        for (kind, pid, outcome) in &outcomes {
            print_outcome(*kind, *pid, outcome, &formatter);
        }
    }
    Ok(())
}

async fn sample_player(discovery: &SystemDiscovery, kind: PlayerKind, pid: u32) -> Outcome {
    let mut source = match discovery.connect(kind, pid) {
        Ok(source) => source,
        Err(e) => return Outcome::Failed(e.to_string()),
    };
    match source.sample().await {
        Ok(Some(track)) => Outcome::Playing(track),
        Ok(None) => Outcome::Idle,
        Err(e) => Outcome::Failed(e.to_string()),
    }
}

fn print_outcome(
    kind: PlayerKind,
    pid: Option<u32>,
    outcome: &Outcome,
    formatter: &StatusFormatter,
) {
    let header = match pid {
        Some(pid) => format!("{} (pid {})", kind, pid),
        None => kind.to_string(),
    };
    println!("{}", header.bold());

    match outcome {
        Outcome::NotRunning => println!("  {}", "not running".dimmed()),
        Outcome::Failed(message) => println!("  {} {}", "error:".red(), message),
        Outcome::Idle => println!("  {}", "nothing playing".dimmed()),
        Outcome::Playing(track) => {
            let state = if track.paused {
                "paused".yellow().to_string()
            } else {
                "playing".green().to_string()
            };
            println!("  {} {} - {}", state, track.title, track.artists);
            if !track.album.is_empty() {
                println!("  album:    {}", track.album);
            }
            if track.has_timeline() {
                println!(
                    "  position: {} / {}",
                    format_clock(track.elapsed),
                    format_clock(track.duration)
                );
            }
            println!("  identity: {}", track.identity.dimmed());
            if !track.url.is_empty() {
                println!("  url:      {}", track.url.dimmed());
            }
            println!("  status:   {}", formatter.format(track).cyan());
        }
    }
}

fn print_json(
    outcomes: &[(PlayerKind, Option<u32>, Outcome)],
    formatter: &StatusFormatter,
) -> Result<()> {
    let entries: Vec<_> = outcomes
        .iter()
        .map(|(kind, pid, outcome)| {
            let (state, track, status, error) = match outcome {
                Outcome::NotRunning => ("not_running", None, None, None),
                Outcome::Failed(message) => ("error", None, None, Some(message.clone())),
                Outcome::Idle => ("idle", None, None, None),
                Outcome::Playing(track) => {
                    ("playing", Some(track), Some(formatter.format(track)), None)
                }
            };
            json!({
                "player": kind.to_string(),
                "pid": pid,
                "state": state,
                "track": track,
                "status": status,
                "error": error,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
