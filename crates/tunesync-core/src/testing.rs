//! Scripted players and a recording sink for exercising the orchestrator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Error, Result};
use crate::model::TrackSnapshot;
use crate::player::{PlayerDiscovery, PlayerKind, TrackSource};
use crate::presence::PresenceSink;

/// A snapshot with placeholder metadata.
pub fn snapshot(identity: &str, title: &str, elapsed: f64, duration: f64) -> TrackSnapshot {
    TrackSnapshot {
        identity: identity.to_string(),
        title: title.to_string(),
        artists: "Test Artist".to_string(),
        album: String::new(),
        cover_url: String::new(),
        elapsed,
        duration,
        paused: false,
        url: String::new(),
    }
}

/// Failure a scripted player produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    AccessDenied,
    SignatureUnresolved,
    TargetNotFound,
    Transient,
    Malformed,
}

impl Failure {
    fn error(self) -> Error {
        match self {
            Failure::AccessDenied => Error::RemoteAccessDenied {
                address: 0,
                message: "scripted".to_string(),
            },
            Failure::SignatureUnresolved => Error::SignatureUnresolved("scripted".to_string()),
            Failure::TargetNotFound => Error::TargetNotFound("scripted".to_string()),
            Failure::Transient => Error::TransientTransport("scripted".to_string()),
            Failure::Malformed => Error::MalformedAuxiliaryData("scripted".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Track(Option<TrackSnapshot>),
    Fail(Failure),
    Panic,
}

#[derive(Debug)]
struct PlayerScript {
    pid: Option<u32>,
    reply: Reply,
    connect_failure: Option<Failure>,
    connects: usize,
    samples: usize,
}

impl Default for PlayerScript {
    fn default() -> Self {
        Self {
            pid: None,
            reply: Reply::Track(None),
            connect_failure: None,
            connects: 0,
            samples: 0,
        }
    }
}

type Scripts = Arc<Mutex<HashMap<PlayerKind, PlayerScript>>>;

/// Discovery whose players do whatever the test says. Clones share the script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDiscovery {
    scripts: Scripts,
}

impl ScriptedDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_script<T>(&self, kind: PlayerKind, f: impl FnOnce(&mut PlayerScript) -> T) -> T {
        let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
        f(scripts.entry(kind).or_default())
    }

    /// `None` makes the player look closed.
    pub fn set_running(&self, kind: PlayerKind, pid: Option<u32>) {
        self.with_script(kind, |script| script.pid = pid);
    }

    pub fn set_track(&self, kind: PlayerKind, track: Option<TrackSnapshot>) {
        self.with_script(kind, |script| script.reply = Reply::Track(track));
    }

    pub fn fail_samples(&self, kind: PlayerKind, failure: Failure) {
        self.with_script(kind, |script| script.reply = Reply::Fail(failure));
    }

    pub fn panic_samples(&self, kind: PlayerKind) {
        self.with_script(kind, |script| script.reply = Reply::Panic);
    }

    pub fn fail_connects(&self, kind: PlayerKind, failure: Option<Failure>) {
        self.with_script(kind, |script| script.connect_failure = failure);
    }

    /// Connection attempts so far, failed ones included.
    pub fn connects(&self, kind: PlayerKind) -> usize {
        self.with_script(kind, |script| script.connects)
    }

    pub fn samples(&self, kind: PlayerKind) -> usize {
        self.with_script(kind, |script| script.samples)
    }
}

impl PlayerDiscovery for ScriptedDiscovery {
    type Source = ScriptedSource;

    fn locate(&self, kind: PlayerKind) -> Option<u32> {
        self.with_script(kind, |script| script.pid)
    }

    fn connect(&self, kind: PlayerKind, _pid: u32) -> Result<ScriptedSource> {
        let failure = self.with_script(kind, |script| {
            script.connects += 1;
            script.connect_failure
        });
        match failure {
            Some(failure) => Err(failure.error()),
            None => Ok(ScriptedSource {
                kind,
                scripts: Arc::clone(&self.scripts),
            }),
        }
    }
}

#[derive(Debug)]
pub struct ScriptedSource {
    kind: PlayerKind,
    scripts: Scripts,
}

impl TrackSource for ScriptedSource {
    async fn sample(&mut self) -> Result<Option<TrackSnapshot>> {
        let reply = {
            let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
            let script = scripts.entry(self.kind).or_default();
            script.samples += 1;
            script.reply.clone()
        };
        match reply {
            Reply::Track(track) => Ok(track),
            Reply::Fail(failure) => Err(failure.error()),
            Reply::Panic => panic!("scripted panic in {} sample", self.kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Set(String),
    Clear,
}

/// Sink that remembers every successful call. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
    fail_next: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make the next call fail without being recorded.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: SinkCall) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::TransientTransport("scripted sink failure".to_string()));
        }
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        Ok(())
    }
}

impl PresenceSink for RecordingSink {
    fn set_status(&mut self, name: &str) -> Result<()> {
        self.record(SinkCall::Set(name.to_string()))
    }

    fn clear_status(&mut self) -> Result<()> {
        self.record(SinkCall::Clear)
    }
}
