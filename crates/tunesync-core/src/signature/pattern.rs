//! Byte patterns with wildcards.
//!
//! Patterns are written as whitespace-separated hex bytes, with `?` or `??`
//! standing for any byte:
//!
//! ```
//! use tunesync_core::signature::Signature;
//!
//! let sig: Signature = "48 8D 0D ? ? ? ? E8".parse().unwrap();
//! let code = [0x90, 0x48, 0x8D, 0x0D, 1, 2, 3, 4, 0xE8];
//! assert_eq!(sig.find_first(&code), Some(1));
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: Vec<Option<u8>>,
}

impl Signature {
    pub fn parse(pattern: &str) -> Result<Self> {
        let bytes = pattern
            .split_whitespace()
            .map(|token| match token {
                "?" | "??" => Ok(None),
                _ => u8::from_str_radix(token, 16).map(Some).map_err(|e| {
                    Error::InvalidPattern(format!("Invalid token '{}': {}", token, e))
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        if bytes.is_empty() {
            return Err(Error::InvalidPattern("Pattern is empty".to_string()));
        }
        Ok(Self { bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset of the first match in `haystack`.
    ///
    /// When the pattern starts with a concrete byte, candidate positions are found by
    /// scanning for that byte alone before the full comparison runs.
    pub fn find_first(&self, haystack: &[u8]) -> Option<usize> {
        let len = self.bytes.len();
        if len == 0 || len > haystack.len() {
            return None;
        }
        let last_start = haystack.len() - len;

        match self.bytes[0] {
            Some(first) => {
                let mut start = 0;
                while start <= last_start {
                    let hit = start + haystack[start..=last_start]
                        .iter()
                        .position(|&b| b == first)?;
                    if self.matches_at(haystack, hit) {
                        return Some(hit);
                    }
                    start = hit + 1;
                }
                None
            }
            None => (0..=last_start).find(|&i| self.matches_at(haystack, i)),
        }
    }

    fn matches_at(&self, haystack: &[u8], at: usize) -> bool {
        self.bytes
            .iter()
            .zip(&haystack[at..at + self.bytes.len()])
            .all(|(expected, &actual)| expected.is_none_or(|b| b == actual))
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.bytes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match byte {
                Some(value) => write!(f, "{:02X}", value)?,
                None => f.write_str("??")?,
            }
        }
        Ok(())
    }
}
