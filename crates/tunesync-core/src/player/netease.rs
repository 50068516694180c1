//! NetEase Cloud Music.
//!
//! The client keeps the current track id and timing in memory but not the
//! metadata, so the id is correlated with the on-disk play queues. When the
//! code anchors cannot be found (usually a client update) the source reads the
//! title through a fixed module offset instead, and failing that parses the
//! main window title.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::{HeuristicsConfig, PlayersConfig};
use crate::error::Result;
use crate::model::{TrackSnapshot, synthesize_identity};
use crate::player::TrackSource;
use crate::player::layout::netease as layout;
use crate::player::playlist::{PlaylistCache, PlaylistKind};
use crate::player::stall::StallDetector;
use crate::process::{ReadMemory, RemoteAddress, SsoLayout, decode_wide_text, main_window_title};
use crate::signature::{AnchorSignature, Operand, SignatureScanner};

pub const PLAYER_ANCHOR: AnchorSignature = AnchorSignature {
    name: "netease.audio_player",
    pattern: "48 8D 0D ? ? ? ? E8 ? ? ? ? 48 8D 0D ? ? ? ? E8 ? ? ? ? 90 48 8D 0D ? ? ? ? \
              E8 ? ? ? ? 48 8D 05 ? ? ? ? 48 8D A5 ? ? ? ? 5F 5D C3 CC CC CC CC CC 48 89 \
              4C 24 ? 55 57 48 81 EC ? ? ? ? 48 8D 6C 24 ? 48 8D 7C 24",
    operand: Operand::RipRelative {
        disp_offset: 3,
        instr_len: 7,
    },
};

pub const SCHEDULE_ANCHOR: AnchorSignature = AnchorSignature {
    name: "netease.schedule",
    pattern: "66 0F 2E 0D ? ? ? ? 7A ? 75 ? 66 0F 2E 15",
    operand: Operand::RipRelative {
        disp_offset: 4,
        instr_len: 8,
    },
};

pub const ANCHORS: [AnchorSignature; 2] = [PLAYER_ANCHOR, SCHEDULE_ANCHOR];

const UNKNOWN_ARTIST: &str = "Unknown Artist";
const TITLE_MODE_ALBUM: &str = "NetEase Cloud Music";
const SONG_URL: &str = "https://music.163.com/#/song?id=";

/// Settings a NetEase source is built with.
#[derive(Debug, Clone, Default)]
pub struct NetEaseOptions {
    /// Directory holding `playingList` and `fmPlay`. `None` disables correlation.
    pub data_dir: Option<PathBuf>,
    pub stall_threshold: Option<Duration>,
    /// Window titles shown while nothing is playing.
    pub generic_titles: Vec<String>,
}

impl NetEaseOptions {
    pub fn from_config(players: &PlayersConfig, heuristics: &HeuristicsConfig) -> Self {
        Self {
            data_dir: players.netease_data_dir(),
            stall_threshold: heuristics.stall_threshold(),
            generic_titles: heuristics.generic_window_titles.clone(),
        }
    }
}

enum Mode<R> {
    Memory {
        reader: R,
        player: RemoteAddress,
        schedule: RemoteAddress,
    },
    /// Title only, through `layout::LEGACY_TITLE` and then the window title.
    Legacy { reader: R, module_base: u64 },
}

/// What the audio player struct says about the current track.
#[derive(Debug, Clone, PartialEq)]
struct PlayerState {
    id: String,
    paused: bool,
    elapsed: f64,
    duration: f64,
}

pub struct NetEase<R> {
    pid: u32,
    mode: Mode<R>,
    playlists: Vec<PlaylistCache>,
    stall: StallDetector,
    generic_titles: Vec<String>,
    title_provider: fn(u32) -> Option<String>,
}

impl<R: ReadMemory> NetEase<R> {
    /// Resolve the anchors in the module at `module_base` and pick an extraction mode.
    pub fn attach(
        reader: R,
        pid: u32,
        module_base: u64,
        scanner: &SignatureScanner,
        options: NetEaseOptions,
    ) -> Result<Self> {
        let player = PLAYER_ANCHOR.resolve(scanner, &reader, pid, module_base)?;
        let schedule = SCHEDULE_ANCHOR.resolve(scanner, &reader, pid, module_base)?;

        let mode = if player.is_resolved() && schedule.is_resolved() {
            info!(
                "NetEase (pid {}): player at {}, schedule at {}",
                pid, player, schedule
            );
            Mode::Memory {
                reader,
                player,
                schedule,
            }
        } else {
            info!(
                "NetEase (pid {}): anchors not found, falling back to legacy title mode",
                pid
            );
            Mode::Legacy {
                reader,
                module_base,
            }
        };

        let playlists = options
            .data_dir
            .as_deref()
            .map(|dir| {
                vec![
                    PlaylistCache::in_dir(PlaylistKind::PlayingList, dir),
                    PlaylistCache::in_dir(PlaylistKind::FmQueue, dir),
                ]
            })
            .unwrap_or_default();

        Ok(Self {
            pid,
            mode,
            playlists,
            stall: StallDetector::new(options.stall_threshold),
            generic_titles: options.generic_titles,
            title_provider: main_window_title,
        })
    }

    /// Replace how the main window title is obtained.
    pub fn with_title_provider(mut self, provider: fn(u32) -> Option<String>) -> Self {
        self.title_provider = provider;
        self
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether the memory anchors resolved.
    pub fn is_memory_mode(&self) -> bool {
        matches!(self.mode, Mode::Memory { .. })
    }

    /// Sample the current track as of `now`.
    pub fn sample_at(&mut self, now: Instant) -> Result<Option<TrackSnapshot>> {
        let state = match &self.mode {
            Mode::Memory {
                reader,
                player,
                schedule,
            } => read_player_state(reader, *player, *schedule)?,
            Mode::Legacy {
                reader,
                module_base,
            } => return Ok(self.sample_legacy(reader, *module_base)),
        };

        let Some(state) = state else {
            self.stall.reset();
            return Ok(None);
        };

        let Some(track) = self
            .playlists
            .iter_mut()
            .find_map(|playlist| playlist.lookup(&state.id))
        else {
            debug!("NetEase track {} not in any play queue", state.id);
            return Ok(None);
        };

        let duration = if state.duration > 0.0 {
            state.duration
        } else {
            track.duration.unwrap_or(0.0)
        };

        let paused = if state.paused {
            self.stall.reset();
            true
        } else {
            self.stall.observe(&state.id, state.elapsed, now)
        };

        Ok(Some(TrackSnapshot {
            url: format!("{}{}", SONG_URL, state.id),
            identity: state.id,
            title: track.title,
            artists: track.artists,
            album: track.album,
            cover_url: track.cover_url,
            elapsed: state.elapsed,
            duration,
            paused,
        }))
    }

    /// Title from the fixed-offset pointer chain, artist from the window title.
    fn sample_legacy(&self, reader: &R, module_base: u64) -> Option<TrackSnapshot> {
        let title = match read_legacy_title(reader, module_base) {
            Ok(Some(title)) => title,
            Ok(None) => return self.sample_window_title(),
            Err(e) => {
                debug!("NetEase legacy title read failed: {}", e);
                return self.sample_window_title();
            }
        };

        let artist = (self.title_provider)(self.pid)
            .and_then(|window| {
                window
                    .split(" - ")
                    .nth(1)
                    .map(|artist| artist.to_string())
            })
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
        let song = title.split(" - ").next().unwrap_or(title.as_str());

        Some(TrackSnapshot {
            identity: synthesize_identity("mem", &title),
            title: song.to_string(),
            artists: artist,
            album: TITLE_MODE_ALBUM.to_string(),
            cover_url: String::new(),
            elapsed: 0.0,
            duration: 0.0,
            paused: false,
            url: String::new(),
        })
    }

    fn sample_window_title(&self) -> Option<TrackSnapshot> {
        let raw = (self.title_provider)(self.pid)?;
        let title = raw.trim();
        if title.is_empty() || self.generic_titles.iter().any(|g| g == title) {
            return None;
        }

        let (song, artist) = match title.split_once(" - ") {
            Some((song, artist)) if !artist.trim().is_empty() => (song.trim(), artist.trim()),
            Some((song, _)) => (song.trim(), UNKNOWN_ARTIST),
            None => (title, UNKNOWN_ARTIST),
        };

        Some(TrackSnapshot {
            identity: synthesize_identity("title", title),
            title: song.to_string(),
            artists: artist.to_string(),
            album: TITLE_MODE_ALBUM.to_string(),
            cover_url: String::new(),
            elapsed: 0.0,
            duration: 0.0,
            paused: false,
            url: String::new(),
        })
    }
}

/// Follow the 32-bit pointer chain at `layout::LEGACY_TITLE`. `None` when a
/// link is null or the title is empty.
fn read_legacy_title<R: ReadMemory>(reader: &R, module_base: u64) -> Result<Option<String>> {
    let holder = reader.read_u32(module_base + layout::LEGACY_TITLE)?;
    if holder == 0 {
        return Ok(None);
    }
    let text = reader.read_u32(u64::from(holder))?;
    if text == 0 {
        return Ok(None);
    }
    let bytes = reader.read_bytes(u64::from(text), layout::LEGACY_TITLE_BYTES)?;
    let title = decode_wide_text(&bytes);
    Ok((!title.is_empty()).then_some(title))
}

fn read_player_state<R: ReadMemory>(
    reader: &R,
    player: RemoteAddress,
    schedule: RemoteAddress,
) -> Result<Option<PlayerState>> {
    let status = reader.read_i32(player.offset(layout::STATUS))?;
    if status == layout::STATUS_WAITING {
        return Ok(None);
    }

    let play_info = reader.read_u64(player.offset(layout::PLAY_INFO))?;
    if play_info == 0 {
        return Ok(None);
    }
    let raw_id = reader.read_remote_string(play_info + layout::PLAY_INFO_ID, SsoLayout::X64)?;
    let id = raw_id.split_once('_').map_or(raw_id.as_str(), |(id, _)| id);
    if id.is_empty() {
        return Ok(None);
    }

    let elapsed = reader.read_f64(schedule.get())?;
    let duration = reader.read_f64(player.offset(layout::DURATION))?;

    Ok(Some(PlayerState {
        id: id.to_string(),
        paused: status == layout::STATUS_PAUSED,
        elapsed: sanitize_seconds(elapsed),
        duration: sanitize_seconds(duration),
    }))
}

fn sanitize_seconds(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

impl<R: ReadMemory + Send> TrackSource for NetEase<R> {
    async fn sample(&mut self) -> Result<Option<TrackSnapshot>> {
        self.sample_at(Instant::now())
    }
}
