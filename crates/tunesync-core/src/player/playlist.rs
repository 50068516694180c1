//! NetEase Cloud Music's on-disk play queues.
//!
//! The client rewrites `playingList` and `fmPlay` often, usually touching only
//! bookkeeping fields. Each file is re-read when its modification time changes,
//! and re-deserialized only when the hash of its normalized content changes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::md5_hex;

/// Which queue file a cache tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistKind {
    /// `playingList`: the regular play queue, entries nest metadata under `track`.
    PlayingList,
    /// `fmPlay`: the personal radio queue, metadata inline.
    FmQueue,
}

impl PlaylistKind {
    pub fn file_name(self) -> &'static str {
        match self {
            PlaylistKind::PlayingList => "playingList",
            PlaylistKind::FmQueue => "fmPlay",
        }
    }

    fn array_key(self) -> &'static str {
        match self {
            PlaylistKind::PlayingList => "list",
            PlaylistKind::FmQueue => "queue",
        }
    }

    /// Entry fields that change without the track changing.
    fn volatile_fields(self) -> &'static [&'static str] {
        match self {
            PlaylistKind::PlayingList => &["randomOrder", "privilege", "referInfo", "fromInfo"],
            PlaylistKind::FmQueue => &["privilege", "alg", "score"],
        }
    }

    fn strip_volatile(self, entry: &mut Map<String, Value>) {
        for field in self.volatile_fields() {
            entry.remove(*field);
        }
        if self == PlaylistKind::PlayingList {
            if let Some(Value::Object(track)) = entry.get_mut("track") {
                track.remove("privilege");
            }
        }
    }
}

/// Metadata of one queue entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistTrack {
    pub id: String,
    pub title: String,
    /// Artist names joined with `,`.
    pub artists: String,
    pub album: String,
    pub cover_url: String,
    /// Seconds, when the entry carries a duration.
    pub duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Millis(f64),
    Text(String),
    Nested { dt: Box<RawDuration> },
}

impl RawDuration {
    fn millis(&self) -> Option<f64> {
        match self {
            RawDuration::Millis(ms) => Some(*ms),
            RawDuration::Text(text) => text.trim().parse().ok(),
            RawDuration::Nested { dt } => dt.millis(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawArtist {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAlbum {
    name: Option<String>,
    cover: Option<String>,
    #[serde(rename = "picUrl")]
    pic_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTrack {
    name: Option<String>,
    artists: Option<Vec<RawArtist>>,
    album: Option<RawAlbum>,
    duration: Option<RawDuration>,
    dt: Option<RawDuration>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    id: RawId,
    track: Option<RawTrack>,
    #[serde(flatten)]
    inline: RawTrack,
}

impl RawEntry {
    fn into_track(self) -> PlaylistTrack {
        let id = match self.id {
            RawId::Text(text) => text,
            RawId::Number(n) => n.to_string(),
        };
        let outer_duration = self
            .inline
            .duration
            .as_ref()
            .or(self.inline.dt.as_ref())
            .and_then(RawDuration::millis);
        let meta = self.track.unwrap_or(self.inline);
        let duration_ms = meta
            .duration
            .as_ref()
            .or(meta.dt.as_ref())
            .and_then(RawDuration::millis)
            .or(outer_duration);
        let artists = meta
            .artists
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.name)
            .collect::<Vec<_>>()
            .join(",");
        let album = meta.album.unwrap_or_default();

        PlaylistTrack {
            id,
            title: meta.name.unwrap_or_default(),
            artists,
            album: album.name.unwrap_or_default(),
            cover_url: album.cover.or(album.pic_url).unwrap_or_default(),
            duration: duration_ms.filter(|ms| *ms > 0.0).map(|ms| ms / 1000.0),
        }
    }
}

/// Strip volatile fields and hash the result.
///
/// Returns the normalized entries and the MD5 of `{"<key>": [...]}`.
fn normalize(kind: PlaylistKind, bytes: &[u8]) -> Result<(Vec<Value>, String)> {
    let mut root: Value = serde_json::from_slice(bytes)?;
    let Some(Value::Array(mut entries)) = root.get_mut(kind.array_key()).map(Value::take) else {
        return Err(Error::MalformedAuxiliaryData(format!(
            "{} has no '{}' array",
            kind.file_name(),
            kind.array_key()
        )));
    };

    for entry in &mut entries {
        if let Value::Object(map) = entry {
            kind.strip_volatile(map);
        }
    }

    let mut wrapper = Map::new();
    wrapper.insert(kind.array_key().to_string(), Value::Array(entries));
    let hash = md5_hex(serde_json::to_string(&wrapper)?.as_bytes());

    let entries = match wrapper.remove(kind.array_key()) {
        Some(Value::Array(entries)) => entries,
        _ => Vec::new(),
    };
    Ok((entries, hash))
}

/// Cached, hash-deduplicated view of one queue file.
#[derive(Debug)]
pub struct PlaylistCache {
    kind: PlaylistKind,
    path: PathBuf,
    modified: Option<SystemTime>,
    hash: Option<String>,
    tracks: Option<Vec<PlaylistTrack>>,
    deserializations: usize,
}

impl PlaylistCache {
    pub fn new(kind: PlaylistKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            modified: None,
            hash: None,
            tracks: None,
            deserializations: 0,
        }
    }

    /// Cache for `kind`'s file inside the client's data directory.
    pub fn in_dir(kind: PlaylistKind, dir: &Path) -> Self {
        Self::new(kind, dir.join(kind.file_name()))
    }

    pub fn kind(&self) -> PlaylistKind {
        self.kind
    }

    /// Refresh from disk if needed and find the entry with `id`.
    pub fn lookup(&mut self, id: &str) -> Option<PlaylistTrack> {
        self.refresh();
        self.find(id).cloned()
    }

    /// Re-read the file when its modification time moved.
    pub fn refresh(&mut self) {
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => {
                self.forget();
                return;
            }
        };
        if self.modified == Some(modified) {
            return;
        }

        match fs::read(&self.path) {
            Ok(bytes) => self.ingest(modified, &bytes),
            Err(e) => {
                debug!("Failed to read {}: {}", self.path.display(), e);
                self.forget();
            }
        }
    }

    /// Take in the file content observed at `modified`.
    ///
    /// Content that normalizes to the already-cached hash keeps the parsed entries.
    /// Malformed content empties the cache until the next modification.
    pub fn ingest(&mut self, modified: SystemTime, bytes: &[u8]) {
        self.modified = Some(modified);

        let (entries, hash) = match normalize(self.kind, bytes) {
            Ok(normalized) => normalized,
            Err(e) => {
                debug!("Ignoring {}: {}", self.kind.file_name(), e);
                self.hash = None;
                self.tracks = None;
                return;
            }
        };

        if self.tracks.is_some() && self.hash.as_deref() == Some(hash.as_str()) {
            return;
        }

        debug!("{} content changed, deserializing", self.kind.file_name());
        let tracks = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<RawEntry>(entry) {
                Ok(raw) => Some(raw.into_track()),
                Err(e) => {
                    debug!("Skipping unreadable {} entry: {}", self.kind.file_name(), e);
                    None
                }
            })
            .collect();
        self.tracks = Some(tracks);
        self.hash = Some(hash);
        self.deserializations += 1;
    }

    pub fn find(&self, id: &str) -> Option<&PlaylistTrack> {
        self.tracks.as_ref()?.iter().find(|track| track.id == id)
    }

    pub fn len(&self) -> usize {
        self.tracks.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times entries were rebuilt from JSON.
    pub fn deserializations(&self) -> usize {
        self.deserializations
    }

    fn forget(&mut self) {
        self.modified = None;
        self.hash = None;
        self.tracks = None;
    }
}
