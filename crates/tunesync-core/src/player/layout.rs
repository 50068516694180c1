//! Field offsets of the player structures read from remote memory.
//!
//! Offsets are relative to the address an anchor signature resolves to. They
//! hold for the client builds the signatures match; a build that moves a field
//! usually also breaks the signature, which is how drift is noticed.

/// NetEase Cloud Music (`cloudmusic.dll`, 64-bit).
///
/// ```text
/// AudioPlayer
/// Offset   Field          Size    Description
/// ──────────────────────────────────────────────────────
/// 0x50     PlayInfo*      8       Current play-info object, 0 when idle
/// 0x60     Status         4       0 waiting, 1 playing, 2 paused
/// 0x64     Volume         4       f32 configured volume
/// 0x68     CurrentVolume  4       f32 effective volume
/// 0xA8     Duration       8       f64 seconds
///
/// PlayInfo
/// 0x10     Id             0x20    std::string "<id>_<suffix>"
/// ```
///
/// Elapsed seconds live in a separate f64 found by its own signature.
pub mod netease {
    pub const MODULE: &str = "cloudmusic.dll";

    pub const PLAY_INFO: u64 = 0x50;
    pub const STATUS: u64 = 0x60;
    pub const VOLUME: u64 = 0x64;
    pub const CURRENT_VOLUME: u64 = 0x68;
    pub const DURATION: u64 = 0xA8;

    pub const PLAY_INFO_ID: u64 = 0x10;

    pub const STATUS_WAITING: i32 = 0;
    pub const STATUS_PAUSED: i32 = 2;

    /// Builds without the anchors (2.10.13 and later) keep a pointer chain to
    /// the current title at this module offset.
    pub const LEGACY_TITLE: u64 = 0xB2B124;
    pub const LEGACY_TITLE_BYTES: usize = 256;
}

/// QQ Music (`QQMusic.dll`, 32-bit).
///
/// ```text
/// Offset   Field          Size    Description
/// ──────────────────────────────────────────────────────
/// 0x00     Title          0x18    std::string
/// 0x18     Artist         0x18    std::string
/// 0x30     Album          0x18    std::string
/// 0x48     CoverUrl       0x18    std::string
/// 0x60     Id             4       0 when nothing is loaded
/// 0x68     Duration       4       milliseconds
/// 0x6C     Elapsed        4       milliseconds
/// 0x70     Status         4       0 or 2 paused
/// ```
pub mod tencent {
    pub const MODULE: &str = "QQMusic.dll";

    /// Size of one x86 `std::string`.
    pub const STRING: u64 = 0x18;

    pub const TITLE: u64 = 0;
    pub const ARTIST: u64 = STRING;
    pub const ALBUM: u64 = STRING * 2;
    pub const COVER_URL: u64 = STRING * 3;
    pub const ID: u64 = 0x60;
    pub const DURATION_MS: u64 = 0x68;
    pub const ELAPSED_MS: u64 = 0x6C;
    pub const STATUS: u64 = 0x70;

    pub fn is_paused_status(status: i32) -> bool {
        matches!(status, 0 | 2)
    }
}
