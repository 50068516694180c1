//! The polling loop that turns per-player samples into one published status.
//!
//! Every tick each player is located, attached if needed, and sampled. A sample
//! that differs from the previous one beyond the normal passing of time starts
//! a debounce window; it is committed only if nothing else changes before the
//! window closes. The first player (in priority order) with committed info owns
//! the published status. Between commits the owner's elapsed time is carried
//! forward on the wall clock so the progress display keeps moving.

mod change;
mod state;

pub use change::detect_change;
pub use state::{Phase, SourceStatus};

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use strum::IntoEnumIterator;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PollingConfig;
use crate::error::{ErrorKind, Result};
use crate::model::TrackSnapshot;
use crate::player::{PlayerDiscovery, PlayerKind, TrackSource};
use crate::presence::{PresenceSink, Publisher};

use state::{Pending, SourceState};

pub struct PollingOrchestrator<D: PlayerDiscovery, S> {
    discovery: D,
    publisher: Publisher<S>,
    config: PollingConfig,
    states: Vec<SourceState<D::Source>>,
    owner: Option<PlayerKind>,
    last_progress: Option<Instant>,
}

impl<D, S> PollingOrchestrator<D, S>
where
    D: PlayerDiscovery,
    S: PresenceSink,
{
    pub fn new(discovery: D, publisher: Publisher<S>, config: PollingConfig) -> Self {
        Self {
            discovery,
            publisher,
            config,
            states: PlayerKind::iter().map(SourceState::new).collect(),
            owner: None,
            last_progress: None,
        }
    }

    /// Tick until `cancel` fires, then clear the status.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            "Polling players every {}ms",
            self.config.tick_interval().as_millis()
        );

        loop {
            self.tick(Instant::now()).await;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.tick_interval()) => {}
            }
        }

        if let Err(e) = self.publisher.clear() {
            warn!("Failed to clear status on shutdown: {}", e);
        }
        info!("Polling stopped");
    }

    /// Run one polling pass as of `now`.
    ///
    /// Never fails: an error or panic inside the pass is logged and every
    /// source is reset.
    pub async fn tick(&mut self, now: Instant) {
        let outcome = AssertUnwindSafe(self.poll_all(now)).catch_unwind().await;
        let reason = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };
        error!("Polling pass failed, resetting all players: {}", reason);
        self.reset_all();
    }

    /// Per-player diagnostics, in priority order.
    pub fn statuses(&self) -> Vec<SourceStatus> {
        self.states.iter().map(SourceState::status).collect()
    }

    /// The player that owns the status and the snapshot it last committed.
    pub fn current(&self) -> Option<(PlayerKind, &TrackSnapshot)> {
        self.states
            .iter()
            .find(|state| state.has_info())
            .and_then(|state| state.committed.as_ref().map(|track| (state.kind, track)))
    }

    pub fn publisher(&self) -> &Publisher<S> {
        &self.publisher
    }

    async fn poll_all(&mut self, now: Instant) -> Result<()> {
        let mut ownership_changed = false;
        for index in 0..self.states.len() {
            ownership_changed |= self.poll_source(index, now).await;
        }
        if ownership_changed {
            self.apply_owner(now)?;
        }
        self.update_progress(now)
    }

    /// Returns whether what this source stands for changed.
    async fn poll_source(&mut self, index: usize, now: Instant) -> bool {
        let discovery = &self.discovery;
        let config = &self.config;
        let state = &mut self.states[index];
        let kind = state.kind;

        let Some(pid) = discovery.locate(kind) else {
            if state.pid.is_some() {
                info!("{} is no longer running", kind);
            }
            let had_info = state.has_info();
            forget_process(state, None);
            return had_info;
        };

        let mut changed = false;
        if state.pid != Some(pid) {
            if state.pid.is_some() {
                info!("{} restarted (pid {})", kind, pid);
            }
            changed = state.has_info();
            forget_process(state, Some(pid));
        }

        if state.source.is_none() && !attach(discovery, config, state, pid, now) {
            return changed;
        }
        let Some(source) = state.source.as_mut() else {
            return changed;
        };

        let sample = match source.sample().await {
            Ok(sample) => sample,
            Err(e) => match e.kind() {
                // An unreachable player reads as idle. One failed tick only opens a
                // debounce window; failures that outlast it clear the status.
                ErrorKind::TransientTransport => {
                    debug!("{} sample failed, retrying next tick: {}", kind, e);
                    None
                }
                ErrorKind::MalformedAuxiliaryData => {
                    debug!("{} returned unusable data: {}", kind, e);
                    None
                }
                _ => {
                    if e.is_access_denied() {
                        warn!(
                            "{} cannot be read, it needs elevated privileges or is an unsupported version: {}",
                            kind, e
                        );
                        state.access_denied = true;
                        state.last_attempt = Some(now);
                    } else {
                        info!("{} detached: {}", kind, e);
                    }
                    changed |= state.has_info();
                    state.reset();
                    return changed;
                }
            },
        };

        changed | observe(state, sample, now, config)
    }

    fn owner_index(&self) -> Option<usize> {
        self.states.iter().position(SourceState::has_info)
    }

    /// Make the sink show the current owner's track, or nothing.
    fn apply_owner(&mut self, now: Instant) -> Result<()> {
        let owner = self.owner_index();
        let kind = owner.map(|index| self.states[index].kind);
        if kind != self.owner {
            match kind {
                Some(kind) => info!("{} now owns the status", kind),
                None => info!("No player has anything to show"),
            }
            self.owner = kind;
        }

        match owner.and_then(|index| self.states[index].extrapolated(now)) {
            Some(track) => self.publisher.publish(&track)?,
            None => self.publisher.clear()?,
        };
        Ok(())
    }

    /// Republish the owner's track with its elapsed time carried forward.
    fn update_progress(&mut self, now: Instant) -> Result<()> {
        let due = self.last_progress.is_none_or(|at| {
            now.saturating_duration_since(at) >= self.config.progress_interval()
        });
        if !due {
            return Ok(());
        }
        self.last_progress = Some(now);

        let Some(state) = self.owner_index().map(|index| &self.states[index]) else {
            return Ok(());
        };
        let playing = state
            .committed
            .as_ref()
            .is_some_and(|track| !track.paused && track.has_timeline());
        if let Some(track) = state.extrapolated(now).filter(|_| playing) {
            self.publisher.publish(&track)?;
        }
        Ok(())
    }

    /// Drop every backend. Pids and denied flags survive so a denied player
    /// still waits out its retry interval.
    fn reset_all(&mut self) {
        for state in &mut self.states {
            state.reset();
        }
        self.owner = None;
        if let Err(e) = self.publisher.clear() {
            warn!("Failed to clear status: {}", e);
        }
    }
}

/// Forget everything tied to the previous process, including the denied flag.
fn forget_process<S>(state: &mut SourceState<S>, pid: Option<u32>) {
    state.reset();
    state.pid = pid;
    state.access_denied = false;
    state.last_attempt = None;
}

/// Try to build the backend. Returns whether a source is now attached.
fn attach<D: PlayerDiscovery>(
    discovery: &D,
    config: &PollingConfig,
    state: &mut SourceState<D::Source>,
    pid: u32,
    now: Instant,
) -> bool {
    let kind = state.kind;
    let retry_later = state.access_denied
        && state.last_attempt.is_some_and(|at| {
            now.saturating_duration_since(at) < config.denied_retry_interval()
        });
    if retry_later {
        return false;
    }
    state.last_attempt = Some(now);

    match discovery.connect(kind, pid) {
        Ok(source) => {
            info!("Attached to {} (pid {})", kind, pid);
            state.source = Some(source);
            state.access_denied = false;
            true
        }
        Err(e) if e.is_access_denied() => {
            if !state.access_denied {
                warn!(
                    "{} cannot be attached, it needs elevated privileges or is an unsupported version: {}",
                    kind, e
                );
            }
            state.access_denied = true;
            false
        }
        Err(e) if e.kind() == ErrorKind::TargetNotFound => {
            debug!("{} (pid {}) not ready: {}", kind, pid, e);
            false
        }
        Err(e) => {
            warn!("Failed to attach to {} (pid {}): {}", kind, pid, e);
            false
        }
    }
}

/// Feed one sample through change detection and the debounce window.
///
/// Returns whether a change was committed.
fn observe<S>(
    state: &mut SourceState<S>,
    sample: Option<TrackSnapshot>,
    now: Instant,
    config: &PollingConfig,
) -> bool {
    let wall = state
        .last_sampled_at
        .map(|at| now.saturating_duration_since(at))
        .unwrap_or_default();

    if detect_change(
        sample.as_ref(),
        state.last.as_ref(),
        wall,
        config.jump_tolerance_secs,
    ) {
        debug!("{} change observed", state.kind);
        state.pending = Some(Pending {
            snapshot: sample.clone(),
            observed_at: now,
        });
    } else if state.pending.is_none() && state.committed.is_some() && sample.is_some() {
        // Same track, time moving normally: keep the committed view fresh.
        state.committed = sample.clone();
        state.committed_at = Some(now);
    }
    state.last = sample;
    state.last_sampled_at = Some(now);

    let due = state.pending.as_ref().is_some_and(|pending| {
        now.saturating_duration_since(pending.observed_at) >= config.debounce_window()
    });
    if !due {
        return false;
    }

    let pending = state.pending.take();
    match pending.as_ref().and_then(|p| p.snapshot.as_ref()) {
        Some(track) => debug!("{} committed '{}'", state.kind, track.title),
        None => debug!("{} committed no track", state.kind),
    }
    // The latest sample matches the pending one apart from elapsed time.
    state.committed = state.last.clone();
    state.committed_at = Some(now);
    true
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::StatusFormatter;
    use crate::testing::{Failure, RecordingSink, ScriptedDiscovery, SinkCall, snapshot};
    use std::time::Duration;

    type Orchestrator = PollingOrchestrator<ScriptedDiscovery, RecordingSink>;

    fn orchestrator(discovery: &ScriptedDiscovery, sink: &RecordingSink) -> Orchestrator {
        PollingOrchestrator::new(
            discovery.clone(),
            Publisher::new(sink.clone(), StatusFormatter::default()),
            PollingConfig::default(),
        )
    }

    fn at(start: Instant, secs: f64) -> Instant {
        start + Duration::from_secs_f64(secs)
    }

    fn formatted(track: &TrackSnapshot) -> String {
        StatusFormatter::default().format(track)
    }

    #[tokio::test]
    async fn test_commit_after_debounce() {
        let discovery = ScriptedDiscovery::new();
        let sink = RecordingSink::new();
        let mut orch = orchestrator(&discovery, &sink);
        let start = Instant::now();

        discovery.set_running(PlayerKind::Tencent, Some(100));
        discovery.set_track(PlayerKind::Tencent, Some(snapshot("1", "Letting Go", 10.0, 200.0)));
        orch.tick(start).await;
        assert_eq!(orch.statuses()[1].phase, Phase::Pending);

        discovery.set_track(PlayerKind::Tencent, Some(snapshot("1", "Letting Go", 11.0, 200.0)));
        orch.tick(at(start, 1.0)).await;
        assert!(sink.calls().is_empty());

        discovery.set_track(PlayerKind::Tencent, Some(snapshot("1", "Letting Go", 11.5, 200.0)));
        orch.tick(at(start, 1.5)).await;
        assert_eq!(
            sink.calls(),
            vec![SinkCall::Set(formatted(&snapshot("1", "Letting Go", 11.5, 200.0)))]
        );
        assert_eq!(orch.statuses()[1].phase, Phase::Active);
        assert_eq!(orch.current().unwrap().0, PlayerKind::Tencent);
    }

    #[tokio::test]
    async fn test_flicker_is_never_committed() {
        let discovery = ScriptedDiscovery::new();
        let sink = RecordingSink::new();
        let mut orch = orchestrator(&discovery, &sink);
        let start = Instant::now();

        discovery.set_running(PlayerKind::LxMusic, Some(7));
        for i in 0..10 {
            let id = if i % 2 == 0 { "a" } else { "b" };
            discovery.set_track(PlayerKind::LxMusic, Some(snapshot(id, id, 0.0, 0.0)));
            orch.tick(at(start, i as f64)).await;
        }
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn test_priority_owner() {
        let discovery = ScriptedDiscovery::new();
        let sink = RecordingSink::new();
        let mut orch = orchestrator(&discovery, &sink);
        let start = Instant::now();

        discovery.set_running(PlayerKind::LxMusic, Some(7));
        discovery.set_track(PlayerKind::LxMusic, Some(snapshot("lx", "群青", 0.0, 0.0)));
        orch.tick(start).await;
        orch.tick(at(start, 2.0)).await;
        assert_eq!(orch.current().unwrap().0, PlayerKind::LxMusic);

        discovery.set_running(PlayerKind::NetEase, Some(3));
        discovery.set_track(PlayerKind::NetEase, Some(snapshot("ne", "晴天", 0.0, 0.0)));
        orch.tick(at(start, 3.0)).await;
        orch.tick(at(start, 5.0)).await;
        assert_eq!(orch.current().unwrap().0, PlayerKind::NetEase);

        assert_eq!(
            sink.calls(),
            vec![
                SinkCall::Set(formatted(&snapshot("lx", "群青", 0.0, 0.0))),
                SinkCall::Set(formatted(&snapshot("ne", "晴天", 0.0, 0.0))),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_info_hands_over_to_next_owner() {
        let discovery = ScriptedDiscovery::new();
        let sink = RecordingSink::new();
        let mut orch = orchestrator(&discovery, &sink);
        let start = Instant::now();

        let ne = snapshot("ne", "晴天", 0.0, 0.0);
        let lx = snapshot("lx", "群青", 0.0, 0.0);
        discovery.set_running(PlayerKind::NetEase, Some(3));
        discovery.set_track(PlayerKind::NetEase, Some(ne.clone()));
        discovery.set_running(PlayerKind::LxMusic, Some(7));
        discovery.set_track(PlayerKind::LxMusic, Some(lx.clone()));
        orch.tick(start).await;
        orch.tick(at(start, 2.0)).await;

        discovery.set_track(PlayerKind::NetEase, None);
        orch.tick(at(start, 3.0)).await;
        orch.tick(at(start, 4.0)).await;
        assert_eq!(sink.calls().len(), 1);
        orch.tick(at(start, 4.5)).await;

        assert_eq!(
            sink.calls(),
            vec![SinkCall::Set(formatted(&ne)), SinkCall::Set(formatted(&lx))]
        );

        discovery.set_track(PlayerKind::LxMusic, None);
        orch.tick(at(start, 5.0)).await;
        orch.tick(at(start, 7.0)).await;
        assert_eq!(sink.calls().last(), Some(&SinkCall::Clear));
    }

    #[tokio::test]
    async fn test_progress_is_extrapolated() {
        let discovery = ScriptedDiscovery::new();
        let sink = RecordingSink::new();
        let mut orch = orchestrator(&discovery, &sink);
        let start = Instant::now();

        discovery.set_running(PlayerKind::Tencent, Some(100));
        discovery.set_track(PlayerKind::Tencent, Some(snapshot("1", "Letting Go", 60.0, 200.0)));
        orch.tick(start).await;
        discovery.set_track(PlayerKind::Tencent, Some(snapshot("1", "Letting Go", 62.0, 200.0)));
        orch.tick(at(start, 2.0)).await;

        // A single failed sample does not freeze the progress display.
        discovery.fail_samples(PlayerKind::Tencent, Failure::Transient);
        orch.tick(at(start, 3.0)).await;

        assert_eq!(
            sink.calls().last(),
            Some(&SinkCall::Set(formatted(&snapshot(
                "1",
                "Letting Go",
                63.0,
                200.0
            ))))
        );
    }

    #[tokio::test]
    async fn test_persistent_transport_failure_clears_status() {
        let discovery = ScriptedDiscovery::new();
        let sink = RecordingSink::new();
        let mut orch = orchestrator(&discovery, &sink);
        let start = Instant::now();

        discovery.set_running(PlayerKind::LxMusic, Some(7));
        discovery.set_track(PlayerKind::LxMusic, Some(snapshot("lx", "群青", 0.0, 0.0)));
        orch.tick(start).await;
        orch.tick(at(start, 1.5)).await;
        assert_eq!(
            sink.calls(),
            vec![SinkCall::Set(formatted(&snapshot("lx", "群青", 0.0, 0.0)))]
        );

        discovery.fail_samples(PlayerKind::LxMusic, Failure::Transient);
        orch.tick(at(start, 3.0)).await;
        orch.tick(at(start, 4.0)).await;
        assert!(orch.current().is_some());

        orch.tick(at(start, 4.5)).await;
        assert_eq!(sink.calls().last(), Some(&SinkCall::Clear));
        assert!(orch.current().is_none());
        assert_eq!(orch.statuses()[2].phase, Phase::Active);
    }

    #[tokio::test]
    async fn test_transport_blip_keeps_status() {
        let discovery = ScriptedDiscovery::new();
        let sink = RecordingSink::new();
        let mut orch = orchestrator(&discovery, &sink);
        let start = Instant::now();

        discovery.set_running(PlayerKind::LxMusic, Some(7));
        discovery.set_track(PlayerKind::LxMusic, Some(snapshot("lx", "群青", 0.0, 0.0)));
        orch.tick(start).await;
        orch.tick(at(start, 1.5)).await;

        discovery.fail_samples(PlayerKind::LxMusic, Failure::Transient);
        orch.tick(at(start, 2.0)).await;
        discovery.set_track(PlayerKind::LxMusic, Some(snapshot("lx", "群青", 0.0, 0.0)));
        for i in 1..=10 {
            orch.tick(at(start, 2.0 + i as f64 * 0.233)).await;
        }

        assert!(!sink.calls().contains(&SinkCall::Clear));
        assert_eq!(orch.current().map(|(kind, _)| kind), Some(PlayerKind::LxMusic));
    }

    #[tokio::test]
    async fn test_process_loss_clears_only_owner() {
        let discovery = ScriptedDiscovery::new();
        let sink = RecordingSink::new();
        let mut orch = orchestrator(&discovery, &sink);
        let start = Instant::now();

        discovery.set_running(PlayerKind::NetEase, Some(3));
        discovery.set_track(PlayerKind::NetEase, Some(snapshot("ne", "晴天", 0.0, 0.0)));
        discovery.set_running(PlayerKind::LxMusic, Some(7));
        discovery.set_track(PlayerKind::LxMusic, Some(snapshot("lx", "群青", 0.0, 0.0)));
        orch.tick(start).await;
        orch.tick(at(start, 2.0)).await;
        let before = sink.calls();

        discovery.set_running(PlayerKind::LxMusic, None);
        orch.tick(at(start, 3.0)).await;
        assert_eq!(sink.calls(), before);
        assert_eq!(orch.statuses()[2].phase, Phase::Absent);

        discovery.set_running(PlayerKind::NetEase, None);
        orch.tick(at(start, 4.0)).await;
        assert_eq!(sink.calls().last(), Some(&SinkCall::Clear));
        assert!(orch.current().is_none());
    }

    #[tokio::test]
    async fn test_denied_is_sticky_until_restart() {
        let discovery = ScriptedDiscovery::new();
        let sink = RecordingSink::new();
        let mut orch = orchestrator(&discovery, &sink);
        let start = Instant::now();

        discovery.set_running(PlayerKind::Tencent, Some(100));
        discovery.fail_connects(PlayerKind::Tencent, Some(Failure::AccessDenied));
        orch.tick(start).await;
        orch.tick(at(start, 1.0)).await;
        orch.tick(at(start, 2.0)).await;
        assert_eq!(discovery.connects(PlayerKind::Tencent), 1);
        assert!(orch.statuses()[1].access_denied);

        orch.tick(at(start, 5.0)).await;
        assert_eq!(discovery.connects(PlayerKind::Tencent), 2);
        assert!(orch.statuses()[1].access_denied);

        // A new process gets a fresh attempt right away.
        discovery.set_running(PlayerKind::Tencent, Some(101));
        discovery.fail_connects(PlayerKind::Tencent, None);
        orch.tick(at(start, 5.5)).await;
        assert_eq!(discovery.connects(PlayerKind::Tencent), 3);
        assert!(!orch.statuses()[1].access_denied);
        assert_eq!(orch.statuses()[1].phase, Phase::Active);
    }

    #[tokio::test]
    async fn test_not_ready_is_retried_every_tick() {
        let discovery = ScriptedDiscovery::new();
        let sink = RecordingSink::new();
        let mut orch = orchestrator(&discovery, &sink);
        let start = Instant::now();

        discovery.set_running(PlayerKind::NetEase, Some(3));
        discovery.fail_connects(PlayerKind::NetEase, Some(Failure::TargetNotFound));
        for i in 0..3 {
            orch.tick(at(start, i as f64 * 0.233)).await;
        }
        assert_eq!(discovery.connects(PlayerKind::NetEase), 3);
        assert!(!orch.statuses()[0].access_denied);
    }

    #[tokio::test]
    async fn test_denied_sample_detaches() {
        let discovery = ScriptedDiscovery::new();
        let sink = RecordingSink::new();
        let mut orch = orchestrator(&discovery, &sink);
        let start = Instant::now();

        discovery.set_running(PlayerKind::NetEase, Some(3));
        discovery.set_track(PlayerKind::NetEase, Some(snapshot("ne", "晴天", 0.0, 0.0)));
        orch.tick(start).await;
        orch.tick(at(start, 2.0)).await;

        discovery.fail_samples(PlayerKind::NetEase, Failure::AccessDenied);
        orch.tick(at(start, 3.0)).await;
        let status = &orch.statuses()[0];
        assert_eq!(status.phase, Phase::Absent);
        assert!(status.access_denied);
        assert_eq!(sink.calls().last(), Some(&SinkCall::Clear));
    }

    #[tokio::test]
    async fn test_panic_resets_everything() {
        let discovery = ScriptedDiscovery::new();
        let sink = RecordingSink::new();
        let mut orch = orchestrator(&discovery, &sink);
        let start = Instant::now();

        discovery.set_running(PlayerKind::LxMusic, Some(7));
        discovery.set_track(PlayerKind::LxMusic, Some(snapshot("lx", "群青", 0.0, 0.0)));
        orch.tick(start).await;
        orch.tick(at(start, 2.0)).await;

        discovery.panic_samples(PlayerKind::LxMusic);
        orch.tick(at(start, 3.0)).await;
        assert_eq!(sink.calls().last(), Some(&SinkCall::Clear));
        assert!(
            orch.statuses()
                .iter()
                .all(|status| status.phase == Phase::Absent)
        );

        // The loop carries on and picks the player up again.
        discovery.set_track(PlayerKind::LxMusic, Some(snapshot("lx", "群青", 0.0, 0.0)));
        orch.tick(at(start, 4.0)).await;
        assert_eq!(orch.statuses()[2].phase, Phase::Pending);
    }

    #[tokio::test]
    async fn test_sink_failure_resets_and_recovers() {
        let discovery = ScriptedDiscovery::new();
        let sink = RecordingSink::new();
        let mut orch = orchestrator(&discovery, &sink);
        let start = Instant::now();

        discovery.set_running(PlayerKind::LxMusic, Some(7));
        discovery.set_track(PlayerKind::LxMusic, Some(snapshot("lx", "群青", 0.0, 0.0)));
        orch.tick(start).await;
        sink.fail_next();
        orch.tick(at(start, 2.0)).await;
        assert!(sink.calls().is_empty());
        assert_eq!(orch.statuses()[2].phase, Phase::Absent);

        orch.tick(at(start, 3.0)).await;
        orch.tick(at(start, 5.0)).await;
        assert_eq!(
            sink.calls(),
            vec![SinkCall::Set(formatted(&snapshot("lx", "群青", 0.0, 0.0)))]
        );
    }

    #[tokio::test]
    async fn test_sink_failure_keeps_denied_flag() {
        let discovery = ScriptedDiscovery::new();
        let sink = RecordingSink::new();
        let mut orch = orchestrator(&discovery, &sink);
        let start = Instant::now();

        discovery.set_running(PlayerKind::NetEase, Some(3));
        discovery.set_track(PlayerKind::NetEase, Some(snapshot("ne", "晴天", 0.0, 0.0)));
        discovery.set_running(PlayerKind::Tencent, Some(100));
        discovery.fail_connects(PlayerKind::Tencent, Some(Failure::AccessDenied));
        orch.tick(start).await;
        assert!(orch.statuses()[1].access_denied);

        sink.fail_next();
        orch.tick(at(start, 1.5)).await;
        assert!(sink.calls().is_empty());
        let status = &orch.statuses()[1];
        assert!(status.access_denied);
        assert_eq!(status.pid, Some(100));

        orch.tick(at(start, 2.0)).await;
        orch.tick(at(start, 4.0)).await;
        assert_eq!(discovery.connects(PlayerKind::Tencent), 1);
        assert!(orch.statuses()[1].access_denied);

        orch.tick(at(start, 5.0)).await;
        assert_eq!(discovery.connects(PlayerKind::Tencent), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let discovery = ScriptedDiscovery::new();
        let sink = RecordingSink::new();
        let mut orch = orchestrator(&discovery, &sink);

        let cancel = CancellationToken::new();
        cancel.cancel();
        orch.run(cancel).await;
        assert!(sink.calls().is_empty());
    }
}
