//! In-memory stand-in for a player process.
//!
//! `MockMemoryBuilder` lays out bytes the way a real player would hold them:
//! plain integers and floats, MSVC strings in either storage form, and a
//! minimal PE image so signature scanning can be exercised without Windows.

use crate::error::{Error, Result};
use crate::process::ReadMemory;
use crate::process::string::{SSO_INLINE_CAPACITY, SSO_LENGTH_OFFSET, SsoLayout};

pub const DEFAULT_MOCK_BASE: u64 = 0x1000;

/// Offset of the NT headers in images produced by `with_code_section`.
const MOCK_NT_OFFSET: usize = 0x80;
const MOCK_OPTIONAL_HEADER_SIZE: u16 = 0xF0;

#[derive(Debug, Clone)]
pub struct MockMemoryReader {
    data: Vec<u8>,
    base: u64,
}

impl MockMemoryReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            base: DEFAULT_MOCK_BASE,
        }
    }

    pub fn with_base(data: Vec<u8>, base: u64) -> Self {
        Self { data, base }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ReadMemory for MockMemoryReader {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let start = address
            .checked_sub(self.base)
            .ok_or_else(|| Error::remote(address, format!("Below mapped base {:#x}", self.base)))?
            as usize;
        start
            .checked_add(size)
            .and_then(|end| self.data.get(start..end))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                Error::remote(
                    address,
                    format!("Unmapped: offset={}, size={}, len={}", start, size, self.data.len()),
                )
            })
    }
}

/// Fluent builder for `MockMemoryReader`. Offsets are relative to the base.
#[derive(Debug, Clone)]
pub struct MockMemoryBuilder {
    data: Vec<u8>,
    base: u64,
}

impl Default for MockMemoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMemoryBuilder {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            base: DEFAULT_MOCK_BASE,
        }
    }

    pub fn base(mut self, base: u64) -> Self {
        self.base = base;
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.ensure_size(size);
        self
    }

    pub fn write_bytes(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.put(offset, bytes);
        self
    }

    pub fn write_i32(self, offset: usize, value: i32) -> Self {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn write_u32(self, offset: usize, value: u32) -> Self {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn write_i64(self, offset: usize, value: i64) -> Self {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn write_u64(self, offset: usize, value: u64) -> Self {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn write_f32(self, offset: usize, value: f32) -> Self {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn write_f64(self, offset: usize, value: f64) -> Self {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    /// Write a pointer-sized word holding the absolute address of `target_offset`.
    pub fn write_pointer(self, offset: usize, layout: SsoLayout, target_offset: usize) -> Self {
        let address = self.base + target_offset as u64;
        self.write_word(offset, layout, address)
    }

    /// Write an MSVC string object at `offset`.
    ///
    /// Strings longer than 15 bytes need `heap_offset`, where the character data is
    /// placed and pointed to. Shorter strings are stored inline when it is `None`.
    pub fn write_sso(
        self,
        offset: usize,
        layout: SsoLayout,
        text: &str,
        heap_offset: Option<usize>,
    ) -> Self {
        let bytes = text.as_bytes();
        let len = bytes.len() as u64;
        let capacity = len.max(SSO_INLINE_CAPACITY);
        let length_at = offset + SSO_LENGTH_OFFSET as usize;
        let builder = self
            .write_word(length_at, layout, len)
            .write_word(length_at + layout.word_size(), layout, capacity);

        match heap_offset {
            Some(heap) => builder
                .write_pointer(offset, layout, heap)
                .write_bytes(heap, bytes),
            None => {
                assert!(
                    len <= SSO_INLINE_CAPACITY,
                    "'{}' is too long to store inline",
                    text
                );
                builder.write_bytes(offset, bytes)
            }
        }
    }

    /// Lay out a minimal PE image at offset 0 whose `.text` section starts at
    /// `text_offset` and contains `code`.
    pub fn with_code_section(self, text_offset: usize, code: &[u8]) -> Self {
        let section_header = MOCK_NT_OFFSET + 24 + MOCK_OPTIONAL_HEADER_SIZE as usize;
        assert!(
            text_offset >= section_header + 40,
            "code section overlaps the headers"
        );
        self.write_bytes(0, b"MZ")
            .write_u32(0x3C, MOCK_NT_OFFSET as u32)
            .write_bytes(MOCK_NT_OFFSET, b"PE\0\0")
            .write_bytes(MOCK_NT_OFFSET + 6, &1u16.to_le_bytes())
            .write_bytes(MOCK_NT_OFFSET + 20, &MOCK_OPTIONAL_HEADER_SIZE.to_le_bytes())
            .write_bytes(section_header, b".text\0\0\0")
            .write_u32(section_header + 8, code.len() as u32)
            .write_u32(section_header + 12, text_offset as u32)
            .write_bytes(text_offset, code)
    }

    pub fn build(self) -> MockMemoryReader {
        MockMemoryReader {
            data: self.data,
            base: self.base,
        }
    }

    fn write_word(self, offset: usize, layout: SsoLayout, value: u64) -> Self {
        match layout {
            SsoLayout::X86 => self.write_u32(offset, value as u32),
            SsoLayout::X64 => self.write_u64(offset, value),
        }
    }

    fn put(&mut self, offset: usize, bytes: &[u8]) {
        self.ensure_size(offset + bytes.len());
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn ensure_size(&mut self, required: usize) {
        if self.data.len() < required {
            self.data.resize(required, 0);
        }
    }
}
