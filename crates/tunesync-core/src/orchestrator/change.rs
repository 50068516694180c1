use std::time::Duration;

use crate::model::TrackSnapshot;

/// Whether `current` differs meaningfully from `previous`, sampled `wall` apart.
///
/// Elapsed time moving in step with the wall clock is not a change; moving more
/// than `tolerance` seconds away from it is a seek. Paused snapshots and
/// snapshots without a timeline are compared by identity and pause state only.
pub fn detect_change(
    current: Option<&TrackSnapshot>,
    previous: Option<&TrackSnapshot>,
    wall: Duration,
    tolerance: f64,
) -> bool {
    let (current, previous) = match (current, previous) {
        (None, None) => return false,
        (Some(current), Some(previous)) => (current, previous),
        _ => return true,
    };

    if current.identity != previous.identity || current.paused != previous.paused {
        return true;
    }
    if current.paused || !current.has_timeline() || !previous.has_timeline() {
        return false;
    }

    let drift = (current.elapsed - previous.elapsed) - wall.as_secs_f64();
    drift.abs() > tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 0.4;

    fn track(identity: &str, elapsed: f64, paused: bool) -> TrackSnapshot {
        TrackSnapshot {
            identity: identity.into(),
            title: "Idol".into(),
            artists: "YOASOBI".into(),
            album: String::new(),
            cover_url: String::new(),
            elapsed,
            duration: 213.0,
            paused,
            url: String::new(),
        }
    }

    fn changed(current: &TrackSnapshot, previous: &TrackSnapshot, wall_secs: f64) -> bool {
        detect_change(
            Some(current),
            Some(previous),
            Duration::from_secs_f64(wall_secs),
            TOLERANCE,
        )
    }

    #[test]
    fn test_presence_flips() {
        let a = track("1", 0.0, false);
        assert!(detect_change(Some(&a), None, Duration::ZERO, TOLERANCE));
        assert!(detect_change(None, Some(&a), Duration::ZERO, TOLERANCE));
        assert!(!detect_change(None, None, Duration::ZERO, TOLERANCE));
    }

    #[test]
    fn test_identity_and_pause() {
        assert!(changed(&track("2", 11.0, false), &track("1", 10.0, false), 1.0));
        assert!(changed(&track("1", 10.0, true), &track("1", 10.0, false), 0.0));
        assert!(changed(&track("1", 10.0, false), &track("1", 10.0, true), 0.0));
    }

    #[test]
    fn test_elapsed_tracks_wall_clock() {
        let previous = track("1", 10.0, false);
        for (elapsed, wall) in [(11.0, 1.0), (10.233, 0.233), (11.3, 1.0), (10.7, 1.0)] {
            let drift: f64 = (elapsed - 10.0) - wall;
            assert_eq!(
                changed(&track("1", elapsed, false), &previous, wall),
                drift.abs() > TOLERANCE,
                "elapsed={} wall={}",
                elapsed,
                wall
            );
        }
    }

    #[test]
    fn test_seek_detected() {
        let previous = track("1", 10.0, false);
        assert!(changed(&track("1", 60.0, false), &previous, 1.0));
        assert!(changed(&track("1", 2.0, false), &previous, 1.0));
    }

    #[test]
    fn test_paused_ignores_elapsed() {
        let previous = track("1", 10.0, true);
        assert!(!changed(&track("1", 10.0, true), &previous, 5.0));
    }

    #[test]
    fn test_no_timeline_ignores_elapsed() {
        let mut previous = track("1", 0.0, false);
        previous.duration = 0.0;
        let current = previous.clone();
        assert!(!changed(&current, &previous, 1.0));
    }
}
