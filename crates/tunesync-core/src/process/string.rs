//! Remote `std::string` decoding.
//!
//! Players built with MSVC keep their strings in the small-string-optimised layout:
//!
//! | Offset | Field                                      |
//! |--------|--------------------------------------------|
//! | +0x00  | inline bytes (len <= 15) or heap pointer  |
//! | +0x10  | length in bytes                            |
//! | +0x10 + word | capacity                             |
//!
//! The word size follows the target's bitness, so a 32-bit process uses
//! a 0x18-byte object and a 64-bit process a 0x20-byte one.

use encoding_rs::UTF_16LE;

/// Length field offset inside the string object.
pub const SSO_LENGTH_OFFSET: u64 = 0x10;

/// Longest string stored inline.
pub const SSO_INLINE_CAPACITY: u64 = 15;

/// Upper bound on a believable string length; anything larger is layout drift.
pub const MAX_REMOTE_STRING: u64 = 64 * 1024;

/// Pointer width of the process that owns the string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsoLayout {
    X86,
    X64,
}

impl SsoLayout {
    /// Size of the word used for the length and the heap pointer.
    pub const fn word_size(self) -> usize {
        match self {
            SsoLayout::X86 => 4,
            SsoLayout::X64 => 8,
        }
    }

    /// Total size of one string object.
    pub const fn object_size(self) -> u64 {
        match self {
            SsoLayout::X86 => 0x18,
            SsoLayout::X64 => 0x20,
        }
    }
}

/// Decode string bytes read from a player.
///
/// UTF-8 is tried first. Invalid UTF-8, or text containing control characters,
/// is re-read as UTF-16LE when the byte count allows it. Trailing NULs are dropped.
pub fn decode_remote_text(bytes: &[u8]) -> String {
    let narrow = trim_trailing_nul(bytes);

    if let Ok(text) = std::str::from_utf8(narrow) {
        if !has_unexpected_controls(text) {
            return text.to_string();
        }
    }

    let wide = &bytes[..bytes.len() & !1];
    if !wide.is_empty() {
        let (text, had_errors) = UTF_16LE.decode_without_bom_handling(wide);
        if !had_errors {
            return text.trim_end_matches('\0').to_string();
        }
    }

    String::from_utf8_lossy(narrow).into_owned()
}

/// Decode a NUL-terminated UTF-16LE buffer, stopping at the first NUL code unit.
pub fn decode_wide_text(bytes: &[u8]) -> String {
    let end = bytes
        .chunks_exact(2)
        .position(|unit| unit == [0, 0])
        .map_or(bytes.len() & !1, |i| i * 2);
    UTF_16LE
        .decode_without_bom_handling(&bytes[..end])
        .0
        .into_owned()
}

fn trim_trailing_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

fn has_unexpected_controls(text: &str) -> bool {
    text.chars()
        .any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r'))
}
