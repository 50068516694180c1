//! Player backends and how they are found.

pub mod layout;
pub mod lx_music;
pub mod netease;
pub mod playlist;
pub mod stall;
pub mod tencent;

pub use lx_music::LxMusic;
pub use netease::{NetEase, NetEaseOptions};
pub use tencent::Tencent;

use std::future::Future;
use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;
use strum::{Display, EnumIter};
use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::model::TrackSnapshot;
use crate::process::{
    MemoryReader, ModuleAddressCache, ProcessHandle, RemoteAddress, find_process_id,
    find_window_pid,
};
use crate::signature::{AnchorSignature, SignatureScanner};

const NETEASE_WINDOW_CLASS: &str = "OrpheusBrowserHost";
const TENCENT_WINDOW_CLASS: &str = "QQMusic_Daemon_Wnd";
const LX_EXECUTABLE: &str = "lx-music-desktop.exe";

/// Supported players. Declaration order is publishing priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize)]
pub enum PlayerKind {
    #[strum(serialize = "NetEase Cloud Music")]
    NetEase,
    #[strum(serialize = "QQ Music")]
    Tencent,
    #[strum(serialize = "LX Music")]
    LxMusic,
}

impl PlayerKind {
    /// Module the memory backends read from.
    pub fn module(self) -> Option<&'static str> {
        match self {
            PlayerKind::NetEase => Some(layout::netease::MODULE),
            PlayerKind::Tencent => Some(layout::tencent::MODULE),
            PlayerKind::LxMusic => None,
        }
    }

    /// Code anchors resolved when attaching.
    pub fn anchors(self) -> &'static [AnchorSignature] {
        match self {
            PlayerKind::NetEase => &netease::ANCHORS,
            PlayerKind::Tencent => &[tencent::CURRENT_SONG_ANCHOR],
            PlayerKind::LxMusic => &[],
        }
    }
}

/// Anything that can report the track a player is on.
///
/// Expected absence (nothing loaded, player idle) is `Ok(None)`; errors are
/// reserved for failures of the underlying access.
pub trait TrackSource {
    fn sample(&mut self) -> impl Future<Output = Result<Option<TrackSnapshot>>> + Send;
}

/// A live backend for one running player.
pub enum PlayerSource {
    NetEase(NetEase<MemoryReader>),
    Tencent(Tencent<MemoryReader>),
    LxMusic(LxMusic),
}

impl PlayerSource {
    pub fn kind(&self) -> PlayerKind {
        match self {
            PlayerSource::NetEase(_) => PlayerKind::NetEase,
            PlayerSource::Tencent(_) => PlayerKind::Tencent,
            PlayerSource::LxMusic(_) => PlayerKind::LxMusic,
        }
    }
}

impl TrackSource for PlayerSource {
    async fn sample(&mut self) -> Result<Option<TrackSnapshot>> {
        match self {
            PlayerSource::NetEase(source) => source.sample().await,
            PlayerSource::Tencent(source) => source.sample().await,
            PlayerSource::LxMusic(source) => source.sample().await,
        }
    }
}

/// Finds running players and builds their backends.
pub trait PlayerDiscovery {
    type Source: TrackSource;

    /// PID of the running player of `kind`, if any.
    fn locate(&self, kind: PlayerKind) -> Option<u32>;

    fn connect(&self, kind: PlayerKind, pid: u32) -> Result<Self::Source>;
}

/// Discovery against the real desktop.
pub struct SystemDiscovery {
    config: Config,
    scanner: Arc<SignatureScanner>,
    modules: Arc<ModuleAddressCache>,
    http: Client,
}

impl SystemDiscovery {
    pub fn new(config: Config) -> Result<Self> {
        let scanner = Arc::new(SignatureScanner::new(
            config.cache.section_entries,
            config.cache.section_ttl(),
        ));
        let modules = Arc::new(ModuleAddressCache::new(
            config.cache.module_entries,
            config.cache.module_ttl(),
        ));
        Self::with_caches(config, scanner, modules)
    }

    /// Build with caches shared with other users.
    pub fn with_caches(
        config: Config,
        scanner: Arc<SignatureScanner>,
        modules: Arc<ModuleAddressCache>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.players.http_timeout())
            .build()?;
        Ok(Self {
            config,
            scanner,
            modules,
            http,
        })
    }

    pub fn is_enabled(&self, kind: PlayerKind) -> bool {
        let players = &self.config.players;
        match kind {
            PlayerKind::NetEase => players.netease,
            PlayerKind::Tencent => players.tencent,
            PlayerKind::LxMusic => players.lx_music,
        }
    }

    /// Resolve every anchor of `kind` in `pid` without building a backend.
    pub fn scan(
        &self,
        kind: PlayerKind,
        pid: u32,
    ) -> Result<Vec<(&'static str, RemoteAddress)>> {
        let Some(module) = kind.module() else {
            return Ok(Vec::new());
        };
        let (reader, base) = self.open_module(pid, module)?;
        kind.anchors()
            .iter()
            .map(|anchor| {
                anchor
                    .resolve(&self.scanner, &reader, pid, base)
                    .map(|address| (anchor.name, address))
            })
            .collect()
    }

    fn open_module(&self, pid: u32, module: &str) -> Result<(MemoryReader, u64)> {
        let process = ProcessHandle::open(pid)?;
        let base = self
            .modules
            .resolve(pid, module, || process.module_base(module))?;
        debug!("{} in pid {} at {:#x}", module, pid, base);
        Ok((MemoryReader::new(process), base))
    }
}

impl PlayerDiscovery for SystemDiscovery {
    type Source = PlayerSource;

    fn locate(&self, kind: PlayerKind) -> Option<u32> {
        if !self.is_enabled(kind) {
            return None;
        }
        match kind {
            PlayerKind::NetEase => find_window_pid(NETEASE_WINDOW_CLASS),
            PlayerKind::Tencent => find_window_pid(TENCENT_WINDOW_CLASS),
            PlayerKind::LxMusic => find_process_id(LX_EXECUTABLE).ok(),
        }
    }

    fn connect(&self, kind: PlayerKind, pid: u32) -> Result<PlayerSource> {
        match kind {
            PlayerKind::NetEase => {
                let (reader, base) = self.open_module(pid, layout::netease::MODULE)?;
                let options =
                    NetEaseOptions::from_config(&self.config.players, &self.config.heuristics);
                NetEase::attach(reader, pid, base, &self.scanner, options).map(PlayerSource::NetEase)
            }
            PlayerKind::Tencent => {
                let (reader, base) = self.open_module(pid, layout::tencent::MODULE)?;
                Tencent::attach(reader, pid, base, &self.scanner).map(PlayerSource::Tencent)
            }
            PlayerKind::LxMusic => {
                let source = match self.config.players.lx_config_path() {
                    Some(path) => LxMusic::from_config_file(&path, self.http.clone()),
                    None => LxMusic::disabled(self.http.clone()),
                };
                Ok(PlayerSource::LxMusic(source))
            }
        }
    }
}
