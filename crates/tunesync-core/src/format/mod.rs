//! Rendering a track into a byte-budgeted presence name.
//!
//! The full composition is `prefix + title [+ " - " + artists] [+ progress]`.
//! When it does not fit, the lower-priority optional segment is dropped and the
//! rest is cut at a character boundary. Budgets count UTF-8 bytes.

use serde::{Deserialize, Serialize};

use crate::model::TrackSnapshot;

pub const PROGRESS_BAR_CELLS: usize = 10;

/// Which optional segment survives when the status is too long.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPriority {
    #[default]
    Artist,
    Progress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFormatter {
    pub budget: usize,
    pub show_artist: bool,
    pub show_progress_bar: bool,
    pub priority: OverflowPriority,
    pub prefix: String,
}

impl Default for StatusFormatter {
    fn default() -> Self {
        Self {
            budget: crate::config::defaults::STATUS_BUDGET_BYTES,
            show_artist: true,
            show_progress_bar: true,
            priority: OverflowPriority::Artist,
            prefix: String::new(),
        }
    }
}

impl StatusFormatter {
    pub fn format(&self, track: &TrackSnapshot) -> String {
        let prefix_len = self.prefix.len();
        if prefix_len >= self.budget {
            return truncate_utf8(&self.prefix, self.budget).to_string();
        }
        let content_budget = self.budget - prefix_len;

        let artist = if self.show_artist && !track.artists.is_empty() {
            format!(" - {}", track.artists)
        } else {
            String::new()
        };
        let progress = self.progress_segment(track);

        let full = format!("{}{}{}", track.title, artist, progress);
        let content = if full.len() <= content_budget {
            full
        } else {
            let kept = match self.priority {
                OverflowPriority::Artist => artist,
                OverflowPriority::Progress => progress,
            };
            let reduced = format!("{}{}", track.title, kept);
            if reduced.len() <= content_budget {
                reduced
            } else {
                truncate_utf8(&reduced, content_budget)
                    .trim_end()
                    .to_string()
            }
        };

        format!("{}{}", self.prefix, content)
    }

    fn progress_segment(&self, track: &TrackSnapshot) -> String {
        if track.paused {
            return " (Paused)".to_string();
        }
        if !self.show_progress_bar || !track.has_timeline() {
            return String::new();
        }

        let ratio = (track.elapsed / track.duration).clamp(0.0, 1.0);
        let filled = ((ratio * PROGRESS_BAR_CELLS as f64) as usize).min(PROGRESS_BAR_CELLS);
        format!(
            " [{}{}] {}/{}",
            "#".repeat(filled),
            "-".repeat(PROGRESS_BAR_CELLS - filled),
            format_clock(track.elapsed),
            format_clock(track.duration)
        )
    }
}

/// Longest prefix of `text` that fits in `max_bytes` without splitting a character.
pub fn truncate_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// `m:ss`, or `h:mm:ss` from one hour on. Negative input counts as zero.
pub fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str, artists: &str, elapsed: f64, duration: f64) -> TrackSnapshot {
        TrackSnapshot {
            identity: "id".into(),
            title: title.into(),
            artists: artists.into(),
            album: String::new(),
            cover_url: String::new(),
            elapsed,
            duration,
            paused: false,
            url: String::new(),
        }
    }

    fn formatter(budget: usize) -> StatusFormatter {
        StatusFormatter {
            budget,
            ..StatusFormatter::default()
        }
    }

    #[test]
    fn test_full_composition() {
        let status = formatter(63).format(&track("Numb", "Linkin Park", 93.0, 185.0));
        assert_eq!(status, "Numb - Linkin Park [#####-----] 1:33/3:05");
    }

    #[test]
    fn test_paused_marker() {
        let status = formatter(63).format(&track("Numb", "Linkin Park", 93.0, 185.0).with_paused(true));
        assert_eq!(status, "Numb - Linkin Park (Paused)");
    }

    #[test]
    fn test_no_progress_without_timeline() {
        let status = formatter(63).format(&track("Numb", "Linkin Park", 0.0, 0.0));
        assert_eq!(status, "Numb - Linkin Park");
    }

    #[test]
    fn test_artist_priority_drops_progress() {
        let status = formatter(30).format(&track("Numb", "Linkin Park", 93.0, 185.0));
        assert_eq!(status, "Numb - Linkin Park");
    }

    #[test]
    fn test_progress_priority_drops_artist() {
        let fmt = StatusFormatter {
            priority: OverflowPriority::Progress,
            ..formatter(30)
        };
        let status = fmt.format(&track("Numb", "Linkin Park", 93.0, 185.0));
        assert_eq!(status, "Numb [#####-----] 1:33/3:05");
    }

    #[test]
    fn test_truncates_at_char_boundary() {
        let fmt = StatusFormatter {
            show_artist: false,
            ..formatter(10)
        };
        // Each character is 3 bytes; 10 bytes fit three of them.
        let status = fmt.format(&track("夜に駆ける", "", 0.0, 0.0));
        assert_eq!(status, "夜に駆");
    }

    #[test]
    fn test_prefix_is_kept() {
        let fmt = StatusFormatter {
            prefix: "♪ ".into(),
            ..formatter(12)
        };
        let status = fmt.format(&track("Bohemian Rhapsody", "Queen", 0.0, 0.0));
        assert_eq!(status, "♪ Bohemian");
        assert!(status.len() <= 12);
    }

    #[test]
    fn test_prefix_alone_over_budget() {
        let fmt = StatusFormatter {
            prefix: "正在播放：".into(),
            ..formatter(7)
        };
        assert_eq!(fmt.format(&track("x", "", 0.0, 0.0)), "正在");
    }

    #[test]
    fn test_never_exceeds_budget() {
        let t = track("ありがとう、さよなら", "いきものがかり", 3700.0, 4000.0);
        for budget in 0..80 {
            let status = formatter(budget).format(&t);
            assert!(status.len() <= budget, "budget {} got {:?}", budget, status);
        }
    }

    #[test]
    fn test_progress_bar_bounds() {
        let fmt = formatter(63);
        assert!(fmt.format(&track("a", "", 0.0, 10.0)).contains("[----------]"));
        assert!(fmt.format(&track("a", "", 15.0, 10.0)).contains("[##########]"));
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(65.9), "1:05");
        assert_eq!(format_clock(3725.0), "1:02:05");
        assert_eq!(format_clock(-3.0), "0:00");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate_utf8("héllo", 2), "h");
        assert_eq!(truncate_utf8("héllo", 3), "hé");
        assert_eq!(truncate_utf8("abc", 10), "abc");
        assert_eq!(truncate_utf8("abc", 0), "");
    }
}
