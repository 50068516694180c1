use std::time::{Duration, Instant};

/// Elapsed times closer than this count as "not advancing".
const ELAPSED_EPSILON: f64 = 1e-3;

/// Flags a track as paused when its elapsed time stops moving.
///
/// Some player builds keep reporting "playing" while the audio is stopped; a
/// frozen elapsed time is the only visible symptom.
#[derive(Debug, Clone)]
pub struct StallDetector {
    threshold: Option<Duration>,
    last: Option<Observation>,
}

#[derive(Debug, Clone)]
struct Observation {
    identity: String,
    elapsed: f64,
    since: Instant,
}

impl StallDetector {
    /// `None` disables detection.
    pub fn new(threshold: Option<Duration>) -> Self {
        Self {
            threshold,
            last: None,
        }
    }

    /// Record a sample of a playing track. Returns whether it looks stalled.
    pub fn observe(&mut self, identity: &str, elapsed: f64, now: Instant) -> bool {
        let Some(threshold) = self.threshold else {
            return false;
        };

        match &self.last {
            Some(last)
                if last.identity == identity
                    && (last.elapsed - elapsed).abs() < ELAPSED_EPSILON =>
            {
                now.saturating_duration_since(last.since) > threshold
            }
            _ => {
                self.last = Some(Observation {
                    identity: identity.to_string(),
                    elapsed,
                    since: now,
                });
                false
            }
        }
    }

    /// Forget the baseline, e.g. while the player itself reports a pause.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> StallDetector {
        StallDetector::new(Some(Duration::from_secs(3)))
    }

    #[test]
    fn test_advancing_is_not_stalled() {
        let start = Instant::now();
        let mut stall = detector();
        for i in 0..20 {
            let now = start + Duration::from_millis(500 * i);
            assert!(!stall.observe("1", i as f64 * 0.5, now));
        }
    }

    #[test]
    fn test_frozen_elapsed_stalls_after_threshold() {
        let start = Instant::now();
        let mut stall = detector();
        assert!(!stall.observe("1", 42.0, start));
        assert!(!stall.observe("1", 42.0, start + Duration::from_secs(3)));
        assert!(stall.observe("1", 42.0, start + Duration::from_millis(3100)));

        // Moving again clears it.
        assert!(!stall.observe("1", 42.5, start + Duration::from_millis(3500)));
    }

    #[test]
    fn test_track_change_resets_baseline() {
        let start = Instant::now();
        let mut stall = detector();
        stall.observe("1", 0.0, start);
        assert!(!stall.observe("2", 0.0, start + Duration::from_secs(10)));
    }

    #[test]
    fn test_disabled() {
        let start = Instant::now();
        let mut stall = StallDetector::new(None);
        stall.observe("1", 5.0, start);
        assert!(!stall.observe("1", 5.0, start + Duration::from_secs(60)));
    }

    #[test]
    fn test_reset() {
        let start = Instant::now();
        let mut stall = detector();
        stall.observe("1", 5.0, start);
        stall.reset();
        assert!(!stall.observe("1", 5.0, start + Duration::from_secs(60)));
    }
}
