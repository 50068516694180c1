//! Runtime configuration.
//!
//! Settings are read from a TOML file. Every key is optional; missing keys and a
//! missing file fall back to the values in [`defaults`].
//!
//! ```toml
//! [polling]
//! tick_interval_ms = 233
//! debounce_ms = 1500
//!
//! [format]
//! prefix = "♪ "
//! priority = "progress"
//!
//! [sink]
//! kind = "file"
//! path = "C:/obs/now-playing.txt"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::format::{OverflowPriority, StatusFormatter};

/// Built-in values for every setting.
pub mod defaults {
    use std::time::Duration;

    pub const TICK_INTERVAL: Duration = Duration::from_millis(233);

    /// A change must stay stable this long before it is published.
    pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(1500);

    /// Allowed gap between predicted and observed elapsed time before it counts as a seek.
    pub const JUMP_TOLERANCE_SECS: f64 = 0.4;

    pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

    /// How often a denied source may try to attach again.
    pub const DENIED_RETRY_INTERVAL: Duration = Duration::from_secs(5);

    /// Longest display name the presence service accepts.
    pub const STATUS_BUDGET_BYTES: usize = 63;

    /// Elapsed time frozen for longer than this reads as paused. Zero disables it.
    pub const STALL_THRESHOLD: Duration = Duration::from_secs(3);

    pub const GENERIC_WINDOW_TITLES: [&str; 2] = ["网易云音乐", "NetEase Cloud Music"];

    pub const SECTION_CACHE_ENTRIES: usize = 10;
    pub const SECTION_CACHE_TTL: Duration = Duration::from_secs(300);
    pub const MODULE_CACHE_ENTRIES: usize = 50;
    pub const MODULE_CACHE_TTL: Duration = Duration::from_secs(300);

    pub const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub polling: PollingConfig,
    pub format: FormatConfig,
    pub heuristics: HeuristicsConfig,
    pub cache: CacheConfig,
    pub players: PlayersConfig,
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub tick_interval_ms: u64,
    pub debounce_ms: u64,
    pub jump_tolerance_secs: f64,
    pub progress_interval_ms: u64,
    pub denied_retry_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    pub budget_bytes: usize,
    pub show_artist: bool,
    pub show_progress_bar: bool,
    pub priority: OverflowPriority,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    pub stall_threshold_ms: u64,
    /// Window titles that carry no track information.
    pub generic_window_titles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub section_entries: usize,
    pub section_ttl_secs: u64,
    pub module_entries: usize,
    pub module_ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayersConfig {
    pub netease: bool,
    pub tencent: bool,
    pub lx_music: bool,
    /// Overrides `%LOCALAPPDATA%/NetEase/CloudMusic/WebData/file`.
    pub netease_data_dir: Option<PathBuf>,
    /// Overrides `%APPDATA%/lx-music-desktop/LxDatas/config_v2.json`.
    pub lx_config_path: Option<PathBuf>,
    pub http_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Log,
    File,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub path: Option<PathBuf>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: defaults::TICK_INTERVAL.as_millis() as u64,
            debounce_ms: defaults::DEBOUNCE_WINDOW.as_millis() as u64,
            jump_tolerance_secs: defaults::JUMP_TOLERANCE_SECS,
            progress_interval_ms: defaults::PROGRESS_INTERVAL.as_millis() as u64,
            denied_retry_ms: defaults::DENIED_RETRY_INTERVAL.as_millis() as u64,
        }
    }
}

impl PollingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn denied_retry_interval(&self) -> Duration {
        Duration::from_millis(self.denied_retry_ms)
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            budget_bytes: defaults::STATUS_BUDGET_BYTES,
            show_artist: true,
            show_progress_bar: true,
            priority: OverflowPriority::default(),
            prefix: String::new(),
        }
    }
}

impl FormatConfig {
    pub fn formatter(&self) -> StatusFormatter {
        StatusFormatter {
            budget: self.budget_bytes,
            show_artist: self.show_artist,
            show_progress_bar: self.show_progress_bar,
            priority: self.priority,
            prefix: self.prefix.clone(),
        }
    }
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            stall_threshold_ms: defaults::STALL_THRESHOLD.as_millis() as u64,
            generic_window_titles: defaults::GENERIC_WINDOW_TITLES
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

impl HeuristicsConfig {
    /// `None` when the stall heuristic is disabled.
    pub fn stall_threshold(&self) -> Option<Duration> {
        (self.stall_threshold_ms > 0).then(|| Duration::from_millis(self.stall_threshold_ms))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            section_entries: defaults::SECTION_CACHE_ENTRIES,
            section_ttl_secs: defaults::SECTION_CACHE_TTL.as_secs(),
            module_entries: defaults::MODULE_CACHE_ENTRIES,
            module_ttl_secs: defaults::MODULE_CACHE_TTL.as_secs(),
        }
    }
}

impl CacheConfig {
    pub fn section_ttl(&self) -> Duration {
        Duration::from_secs(self.section_ttl_secs)
    }

    pub fn module_ttl(&self) -> Duration {
        Duration::from_secs(self.module_ttl_secs)
    }
}

impl Default for PlayersConfig {
    fn default() -> Self {
        Self {
            netease: true,
            tencent: true,
            lx_music: true,
            netease_data_dir: None,
            lx_config_path: None,
            http_timeout_ms: defaults::HTTP_TIMEOUT.as_millis() as u64,
        }
    }
}

impl PlayersConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn netease_data_dir(&self) -> Option<PathBuf> {
        self.netease_data_dir.clone().or_else(|| {
            dirs::data_local_dir().map(|d| {
                d.join("NetEase")
                    .join("CloudMusic")
                    .join("WebData")
                    .join("file")
            })
        })
    }

    pub fn lx_config_path(&self) -> Option<PathBuf> {
        self.lx_config_path.clone().or_else(|| {
            dirs::config_dir().map(|d| {
                d.join("lx-music-desktop")
                    .join("LxDatas")
                    .join("config_v2.json")
            })
        })
    }
}

impl Config {
    /// `<config dir>/tunesync/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tunesync").join("config.toml"))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::from_toml_str(&content)?;
                info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
