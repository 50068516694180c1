use std::time::Instant;

use serde::Serialize;

use crate::model::TrackSnapshot;
use crate::player::PlayerKind;

/// Where a source is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// No live backend, the player is not running or could not be attached.
    Absent,
    Active,
    /// Active, with a change waiting out the debounce window.
    Pending,
}

/// Point-in-time view of one source, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub kind: PlayerKind,
    pub phase: Phase,
    pub pid: Option<u32>,
    pub last: Option<TrackSnapshot>,
    /// Set when the player could not be read, usually for lack of privileges
    /// or an unsupported client build.
    pub access_denied: bool,
}

/// A change that has been observed but not yet committed.
#[derive(Debug, Clone)]
pub(crate) struct Pending {
    pub snapshot: Option<TrackSnapshot>,
    pub observed_at: Instant,
}

/// Everything the orchestrator remembers about one player.
pub(crate) struct SourceState<S> {
    pub kind: PlayerKind,
    pub source: Option<S>,
    pub pid: Option<u32>,
    /// Latest sample and when it was taken.
    pub last: Option<TrackSnapshot>,
    pub last_sampled_at: Option<Instant>,
    pub pending: Option<Pending>,
    /// What this source currently stands for, and the sample instant it reflects.
    pub committed: Option<TrackSnapshot>,
    pub committed_at: Option<Instant>,
    pub access_denied: bool,
    pub last_attempt: Option<Instant>,
}

impl<S> SourceState<S> {
    pub fn new(kind: PlayerKind) -> Self {
        Self {
            kind,
            source: None,
            pid: None,
            last: None,
            last_sampled_at: None,
            pending: None,
            committed: None,
            committed_at: None,
            access_denied: false,
            last_attempt: None,
        }
    }

    pub fn phase(&self) -> Phase {
        match (&self.source, &self.pending) {
            (None, _) => Phase::Absent,
            (Some(_), Some(_)) => Phase::Pending,
            (Some(_), None) => Phase::Active,
        }
    }

    /// Whether this source may own the published status.
    pub fn has_info(&self) -> bool {
        self.source.is_some() && self.committed.is_some()
    }

    /// Drop the backend and everything learned from it.
    ///
    /// The denied flag survives; it is cleared only when the process goes away.
    pub fn reset(&mut self) {
        self.source = None;
        self.last = None;
        self.last_sampled_at = None;
        self.pending = None;
        self.committed = None;
        self.committed_at = None;
    }

    /// The committed snapshot with elapsed time carried forward to `now`.
    pub fn extrapolated(&self, now: Instant) -> Option<TrackSnapshot> {
        let committed = self.committed.as_ref()?;
        if committed.paused || !committed.has_timeline() {
            return Some(committed.clone());
        }
        let since = self
            .committed_at
            .map(|at| now.saturating_duration_since(at).as_secs_f64())
            .unwrap_or(0.0);
        Some(committed.with_elapsed((committed.elapsed + since).min(committed.duration)))
    }

    pub fn status(&self) -> SourceStatus {
        SourceStatus {
            kind: self.kind,
            phase: self.phase(),
            pid: self.pid,
            last: self.last.clone(),
            access_denied: self.access_denied,
        }
    }
}
