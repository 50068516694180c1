use std::fmt;

/// An absolute address inside another process.
///
/// `UNRESOLVED` is an ordinary value: it tells the caller to pick a degraded
/// extraction strategy instead of reading through this address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemoteAddress(u64);

impl RemoteAddress {
    pub const UNRESOLVED: RemoteAddress = RemoteAddress(0);

    pub const fn new(address: u64) -> Self {
        Self(address)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_resolved(self) -> bool {
        self.0 != 0
    }

    /// The resolved address as an `Option`, for `?`-style chaining.
    pub fn resolved(self) -> Option<u64> {
        self.is_resolved().then_some(self.0)
    }

    /// Field address `offset` bytes past this one.
    pub const fn offset(self, offset: u64) -> u64 {
        self.0.wrapping_add(offset)
    }
}

impl fmt::Display for RemoteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_resolved() {
            write!(f, "{:#x}", self.0)
        } else {
            f.write_str("<unresolved>")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved() {
        assert!(!RemoteAddress::UNRESOLVED.is_resolved());
        assert_eq!(RemoteAddress::UNRESOLVED.resolved(), None);
        assert_eq!(RemoteAddress::UNRESOLVED.to_string(), "<unresolved>");
    }

    #[test]
    fn test_offset_and_display() {
        let addr = RemoteAddress::new(0x7FF6_0000_1000);
        assert_eq!(addr.offset(0x60), 0x7FF6_0000_1060);
        assert_eq!(addr.resolved(), Some(0x7FF6_0000_1000));
        assert_eq!(addr.to_string(), "0x7ff600001000");
    }
}
