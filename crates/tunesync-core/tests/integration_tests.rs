//! Integration tests for tunesync-core
//!
//! These tests drive the public API the way the CLI does: scripted players
//! through the orchestrator, and mock process images through the scanner.

use std::time::{Duration, Instant, SystemTime};

use tunesync_core::config::PollingConfig;
use tunesync_core::format::StatusFormatter;
use tunesync_core::orchestrator::Phase;
use tunesync_core::player::playlist::{PlaylistCache, PlaylistKind};
use tunesync_core::player::{LxMusic, PlayerKind, TrackSource};
use tunesync_core::process::{MockMemoryBuilder, ReadMemory, SsoLayout};
use tunesync_core::signature::{Signature, SignatureScanner};
use tunesync_core::testing::{RecordingSink, ScriptedDiscovery, SinkCall, snapshot};
use tunesync_core::{PollingOrchestrator, Publisher, TrackSnapshot};

fn at(start: Instant, secs: f64) -> Instant {
    start + Duration::from_secs_f64(secs)
}

/// Orchestrator scenarios with a synthetic clock
mod orchestrator_tests {
    use super::*;

    #[tokio::test]
    async fn test_track_switch_committed_once() {
        let discovery = ScriptedDiscovery::new();
        let sink = RecordingSink::new();
        let mut orchestrator = PollingOrchestrator::new(
            discovery.clone(),
            Publisher::new(sink.clone(), StatusFormatter::default()),
            PollingConfig::default(),
        );
        let start = Instant::now();
        discovery.set_running(PlayerKind::NetEase, Some(4242));

        discovery.set_track(PlayerKind::NetEase, Some(snapshot("1", "Track A", 10.0, 200.0)));
        orchestrator.tick(start).await;

        discovery.set_track(PlayerKind::NetEase, Some(snapshot("1", "Track A", 11.0, 200.0)));
        orchestrator.tick(at(start, 1.0)).await;
        assert!(sink.calls().is_empty());

        discovery.set_track(PlayerKind::NetEase, Some(snapshot("2", "Track B", 0.0, 200.0)));
        orchestrator.tick(at(start, 2.0)).await;
        assert!(sink.calls().is_empty());
        assert_eq!(orchestrator.statuses()[0].phase, Phase::Pending);

        discovery.set_track(PlayerKind::NetEase, Some(snapshot("2", "Track B", 1.0, 200.0)));
        orchestrator.tick(at(start, 3.0)).await;
        assert!(sink.calls().is_empty());

        discovery.set_track(PlayerKind::NetEase, Some(snapshot("2", "Track B", 1.5, 200.0)));
        orchestrator.tick(at(start, 3.5)).await;

        let expected = StatusFormatter::default().format(&snapshot("2", "Track B", 1.5, 200.0));
        assert_eq!(sink.calls(), vec![SinkCall::Set(expected)]);

        let (kind, track) = orchestrator.current().unwrap();
        assert_eq!(kind, PlayerKind::NetEase);
        assert_eq!(track.identity, "2");
    }

    #[tokio::test]
    async fn test_change_not_committed_early() {
        let discovery = ScriptedDiscovery::new();
        let sink = RecordingSink::new();
        let mut orchestrator = PollingOrchestrator::new(
            discovery.clone(),
            Publisher::new(sink.clone(), StatusFormatter::default()),
            PollingConfig::default(),
        );
        let start = Instant::now();
        discovery.set_running(PlayerKind::LxMusic, Some(1));
        discovery.set_track(PlayerKind::LxMusic, Some(snapshot("x", "晚安", 0.0, 0.0)));

        // Ticks at the default cadence up to just before the window closes.
        let mut t = 0.0;
        while t < 1.4 {
            orchestrator.tick(at(start, t)).await;
            t += 0.233;
        }
        assert!(sink.calls().is_empty());

        orchestrator.tick(at(start, 1.5)).await;
        orchestrator.tick(at(start, 1.733)).await;
        assert_eq!(sink.calls().len(), 1);
    }
}

/// Status formatting
mod format_tests {
    use super::*;

    fn track(title: &str, artists: &str) -> TrackSnapshot {
        TrackSnapshot {
            artists: artists.to_string(),
            ..snapshot("1", title, 0.0, 0.0)
        }
    }

    #[test]
    fn test_fits_budget_unmodified() {
        let formatter = StatusFormatter {
            budget: 20,
            ..StatusFormatter::default()
        };
        let name = formatter.format(&track("摇滚巨星", "X"));
        assert_eq!(name, "摇滚巨星 - X");
        assert_eq!(name.len(), 16);
    }

    #[test]
    fn test_never_exceeds_budget() {
        let long = track(
            "寿限無、寿限無、五劫の擦り切れ、海砂利水魚の水行末・雲来末・風来末",
            "落語家",
        );
        for budget in 1..80 {
            let formatter = StatusFormatter {
                budget,
                ..StatusFormatter::default()
            };
            let name = formatter.format(&long);
            assert!(name.len() <= budget, "budget {}: {}", budget, name);
        }
    }
}

/// Play queue caching
mod playlist_tests {
    use super::*;

    const QUEUE: &str = r#"{"queue":[
        {"id":1372188635,"name":"Mojito","artists":[{"name":"周杰伦"}],
         "album":{"name":"Mojito","picUrl":"https://p2.music.126.net/m.jpg"},
         "alg":"itembased","score":0.93,"duration":185000}
    ]}"#;

    #[test]
    fn test_fm_queue_lookup() {
        let mut cache = PlaylistCache::new(PlaylistKind::FmQueue, "unused");
        cache.ingest(SystemTime::UNIX_EPOCH, QUEUE.as_bytes());

        let track = cache.find("1372188635").unwrap();
        assert_eq!(track.title, "Mojito");
        assert_eq!(track.artists, "周杰伦");
        assert_eq!(track.cover_url, "https://p2.music.126.net/m.jpg");
        assert_eq!(track.duration, Some(185.0));
    }

    #[test]
    fn test_volatile_rewrite_not_reparsed() {
        let mut cache = PlaylistCache::new(PlaylistKind::FmQueue, "unused");
        cache.ingest(SystemTime::UNIX_EPOCH, QUEUE.as_bytes());

        let rescored = QUEUE.replace("0.93", "0.41").replace("itembased", "usercf");
        cache.ingest(
            SystemTime::UNIX_EPOCH + Duration::from_secs(60),
            rescored.as_bytes(),
        );
        assert_eq!(cache.deserializations(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_file_refresh_follows_mtime() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fmPlay"), QUEUE).unwrap();

        let mut cache = PlaylistCache::in_dir(PlaylistKind::FmQueue, dir.path());
        assert!(cache.lookup("1372188635").is_some());
        assert!(cache.lookup("1372188635").is_some());
        assert_eq!(cache.deserializations(), 1);

        std::fs::remove_file(dir.path().join("fmPlay")).unwrap();
        assert!(cache.lookup("1372188635").is_none());
    }
}

/// Signature scanning and string reads over mock process images
mod memory_tests {
    use super::*;

    #[test]
    fn test_scan_finds_first_wildcard_match() {
        let code = [0x90, 0x48, 0x8B, 0x05, 0x11, 0x22, 0x48, 0x8B, 0x05, 0x33, 0x44];
        let reader = MockMemoryBuilder::new()
            .with_code_section(0x300, &code)
            .build();
        let scanner = SignatureScanner::new(10, Duration::from_secs(300));
        let signature = Signature::parse("48 8B 05 ? ??").unwrap();

        let found = scanner.find(&reader, 1, reader.base(), &signature);
        assert_eq!(found, Some(reader.base() + 0x301));
        assert_eq!(scanner.cached_sections(), 1);
    }

    #[test]
    fn test_pid_change_empties_section_cache() {
        let exe = MockMemoryBuilder::new()
            .with_code_section(0x300, &[0xC3])
            .build();
        let dll = MockMemoryBuilder::new()
            .base(0x7FF8_0000)
            .with_code_section(0x300, &[0xC3])
            .build();
        let scanner = SignatureScanner::new(10, Duration::from_secs(300));
        let signature = Signature::parse("C3").unwrap();

        assert!(scanner.find(&exe, 1, exe.base(), &signature).is_some());
        assert!(scanner.find(&dll, 1, dll.base(), &signature).is_some());
        assert_eq!(scanner.cached_sections(), 2);

        assert!(scanner.find(&exe, 2, exe.base(), &signature).is_some());
        assert_eq!(scanner.cached_sections(), 1);
    }

    #[test]
    fn test_sso_forms() {
        let long = "https://y.qq.com/music/photo_new/T002R300x300M000003.jpg";
        let reader = MockMemoryBuilder::new()
            .write_sso(0x00, SsoLayout::X86, "稻香", None)
            .write_sso(0x18, SsoLayout::X86, long, Some(0x100))
            .write_sso(0x40, SsoLayout::X64, "1975806443_0", None)
            .build();
        let base = reader.base();

        assert_eq!(reader.read_remote_string(base, SsoLayout::X86).unwrap(), "稻香");
        assert_eq!(
            reader.read_remote_string(base + 0x18, SsoLayout::X86).unwrap(),
            long
        );
        assert_eq!(
            reader.read_remote_string(base + 0x40, SsoLayout::X64).unwrap(),
            "1975806443_0"
        );
    }
}

/// The local HTTP API player
mod lx_music_tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_missing_config_is_inert() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = LxMusic::from_config_file(
            &dir.path().join("config_v2.json"),
            reqwest::Client::new(),
        );
        assert_eq!(source.sample().await.unwrap(), None);
        assert_eq!(source.sample().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_status_through_api() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "playing",
                "name": "Lemon",
                "singer": "米津玄師",
                "progress": 12.0,
                "duration": 255.0
            })))
            .mount(&server)
            .await;

        let mut source = LxMusic::with_base_url(server.uri(), reqwest::Client::new());
        let track = source.sample().await.unwrap().unwrap();
        assert_eq!(track.title, "Lemon");
        assert_eq!(track.artists, "米津玄師");
        assert_eq!(track.album, "");
        assert_eq!(track.elapsed, 12.0);
        assert!(!track.paused);
    }
}
