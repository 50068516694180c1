use md5::{Digest, Md5};
use serde::Serialize;

/// Everything known about the track a player is on, at one sampling instant.
///
/// Snapshots are values: a changed field means a new snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSnapshot {
    /// Stable per distinct track; changes iff the track changed.
    pub identity: String,
    pub title: String,
    /// Display string of all artists.
    pub artists: String,
    pub album: String,
    pub cover_url: String,
    /// Seconds into the track.
    pub elapsed: f64,
    /// Track length in seconds, 0 when unknown.
    pub duration: f64,
    pub paused: bool,
    pub url: String,
}

impl TrackSnapshot {
    pub fn with_paused(&self, paused: bool) -> Self {
        Self {
            paused,
            ..self.clone()
        }
    }

    pub fn with_elapsed(&self, elapsed: f64) -> Self {
        Self {
            elapsed,
            ..self.clone()
        }
    }

    /// Whether elapsed/duration describe a real timeline.
    pub fn has_timeline(&self) -> bool {
        self.duration > 0.0
    }
}

/// Identity for players that expose no track id: `<scope>:<md5 of text>`.
pub fn synthesize_identity(scope: &str, text: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(text.as_bytes());
    format!("{}:{:x}", scope, hasher.finalize())
}

/// Hex MD5 digest of arbitrary bytes.
pub fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", Md5::digest(bytes))
}
