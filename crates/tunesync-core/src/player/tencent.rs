//! QQ Music.
//!
//! The 32-bit client keeps everything about the current track in one static
//! struct, so a single anchor is enough. There is no fallback: if the anchor is
//! missing the client build is unsupported.

use tracing::info;

use crate::error::{Error, Result};
use crate::model::TrackSnapshot;
use crate::player::TrackSource;
use crate::player::layout::tencent as layout;
use crate::process::{ReadMemory, RemoteAddress, SsoLayout};
use crate::signature::{AnchorSignature, Operand, SignatureScanner};

pub const CURRENT_SONG_ANCHOR: AnchorSignature = AnchorSignature {
    name: "tencent.current_song",
    pattern: "A2 ? ? ? ? A3 ? ? ? ? C7 05 ? ? ? ? ? ? ? ? A2 ? ? ? ? A3 ? ? ? ? \
              C7 05 ? ? ? ? ? ? ? ? A2 ? ? ? ? A3",
    operand: Operand::Absolute32 { offset: 1 },
};

const SONG_URL: &str = "https://y.qq.com/n/ryqq/songDetail/";

pub struct Tencent<R> {
    reader: R,
    pid: u32,
    song: RemoteAddress,
}

impl<R: ReadMemory> Tencent<R> {
    pub fn attach(
        reader: R,
        pid: u32,
        module_base: u64,
        scanner: &SignatureScanner,
    ) -> Result<Self> {
        let song = CURRENT_SONG_ANCHOR.resolve(scanner, &reader, pid, module_base)?;
        if !song.is_resolved() {
            return Err(Error::SignatureUnresolved(CURRENT_SONG_ANCHOR.name.to_string()));
        }
        info!("QQ Music (pid {}): current song at {}", pid, song);
        Ok(Self { reader, pid, song })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn sample_now(&self) -> Result<Option<TrackSnapshot>> {
        let id = self.reader.read_u32(self.song.offset(layout::ID))?;
        if id == 0 {
            return Ok(None);
        }

        let text = |offset| {
            self.reader
                .read_remote_string(self.song.offset(offset), SsoLayout::X86)
        };
        let title = text(layout::TITLE)?;
        let artists = text(layout::ARTIST)?;
        let album = text(layout::ALBUM)?;
        let cover_url = text(layout::COVER_URL)?;

        let duration_ms = self.reader.read_i32(self.song.offset(layout::DURATION_MS))?;
        let elapsed_ms = self.reader.read_i32(self.song.offset(layout::ELAPSED_MS))?;
        let status = self.reader.read_i32(self.song.offset(layout::STATUS))?;

        Ok(Some(TrackSnapshot {
            identity: id.to_string(),
            title,
            artists,
            album,
            cover_url,
            elapsed: f64::from(elapsed_ms.max(0)) / 1000.0,
            duration: f64::from(duration_ms.max(0)) / 1000.0,
            paused: layout::is_paused_status(status),
            url: format!("{}{}", SONG_URL, id),
        }))
    }
}

impl<R: ReadMemory + Send> TrackSource for Tencent<R> {
    async fn sample(&mut self) -> Result<Option<TrackSnapshot>> {
        self.sample_now()
    }
}
