//! LX Music, through the local open API the desktop client can expose.
//!
//! The API is off by default. Whether it is on, and on which port, is read
//! once from the client's own settings file when the source is built.

use std::fs;
use std::path::Path;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::model::TrackSnapshot;
use crate::player::TrackSource;

const STATUS_PATH: &str = "/status?filter=status,name,singer,albumName,duration,progress,picUrl";

#[derive(Debug, Default, Deserialize)]
struct LxConfig {
    #[serde(default)]
    setting: LxSetting,
}

#[derive(Debug, Default, Deserialize)]
struct LxSetting {
    #[serde(rename = "openAPI.enable", default)]
    enable: bool,
    #[serde(rename = "openAPI.port")]
    port: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LxStatus {
    status: String,
    name: String,
    singer: String,
    album_name: String,
    duration: f64,
    progress: f64,
    pic_url: String,
}

#[derive(Debug)]
pub struct LxMusic {
    base_url: Option<String>,
    client: Client,
    last_title_artist: Option<(String, String)>,
    identity: String,
}

impl LxMusic {
    /// Read the open API settings from the client's `config_v2.json`.
    ///
    /// A missing or unreadable file, or a disabled API, yields an inert source.
    pub fn from_config_file(path: &Path, client: Client) -> Self {
        let base_url = match read_api_port(path) {
            Some(port) => {
                info!("LX Music open API on port {}", port);
                Some(format!("http://127.0.0.1:{}", port))
            }
            None => None,
        };
        Self::new(base_url, client)
    }

    /// Talk to the API at `base_url` directly.
    pub fn with_base_url(base_url: impl Into<String>, client: Client) -> Self {
        Self::new(Some(base_url.into()), client)
    }

    /// A source that never reports anything.
    pub fn disabled(client: Client) -> Self {
        Self::new(None, client)
    }

    fn new(base_url: Option<String>, client: Client) -> Self {
        Self {
            base_url,
            client,
            last_title_artist: None,
            identity: Uuid::new_v4().to_string(),
        }
    }

    /// Whether the source can ever report a track.
    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    pub async fn fetch(&mut self) -> Result<Option<TrackSnapshot>> {
        let Some(base_url) = &self.base_url else {
            return Ok(None);
        };

        let status: LxStatus = self
            .client
            .get(format!("{}{}", base_url, STATUS_PATH))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if status.name.is_empty() {
            return Ok(None);
        }
        let paused = match status.status.as_str() {
            "playing" => false,
            "paused" => true,
            _ => return Ok(None),
        };

        let changed = self
            .last_title_artist
            .as_ref()
            .is_none_or(|(title, artist)| *title != status.name || *artist != status.singer);
        if changed {
            self.identity = Uuid::new_v4().to_string();
            self.last_title_artist = Some((status.name.clone(), status.singer.clone()));
        }

        Ok(Some(TrackSnapshot {
            identity: self.identity.clone(),
            title: status.name,
            artists: status.singer,
            album: status.album_name,
            cover_url: status.pic_url,
            elapsed: status.progress.max(0.0),
            duration: status.duration.max(0.0),
            paused,
            url: String::new(),
        }))
    }
}

fn read_api_port(path: &Path) -> Option<String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!("LX Music config {} unavailable: {}", path.display(), e);
            return None;
        }
    };
    let config: LxConfig = match serde_json::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            debug!("LX Music config unreadable: {}", e);
            return None;
        }
    };

    match config.setting {
        LxSetting {
            enable: true,
            port: Some(port),
        } if !port.trim().is_empty() => Some(port.trim().to_string()),
        setting => {
            debug!(
                "LX Music open API disabled (enable={}, port={:?})",
                setting.enable, setting.port
            );
            None
        }
    }
}

impl TrackSource for LxMusic {
    async fn sample(&mut self) -> Result<Option<TrackSnapshot>> {
        self.fetch().await
    }
}
