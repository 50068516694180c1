//! Locating the `.text` section of a module loaded in another process.
//!
//! Header fields used (offsets relative to the module base / NT headers):
//!
//! | Field                  | Location          |
//! |------------------------|-------------------|
//! | `e_magic` ("MZ")       | base + 0x00       |
//! | `e_lfanew`             | base + 0x3C       |
//! | `Signature` ("PE\0\0") | nt + 0x00         |
//! | `NumberOfSections`     | nt + 0x06         |
//! | `SizeOfOptionalHeader` | nt + 0x14         |
//! | section table          | nt + 0x18 + opt   |
//!
//! Each section header is 40 bytes with `VirtualSize` at +8 and `VirtualAddress` at +12.

use tracing::debug;

use crate::process::ReadMemory;

const DOS_MAGIC: &[u8; 2] = b"MZ";
const NT_MAGIC: &[u8; 4] = b"PE\0\0";
const E_LFANEW_OFFSET: u64 = 0x3C;
const FILE_HEADER_SIZE: u64 = 0x18;
const SECTION_HEADER_SIZE: usize = 40;
const CODE_SECTION_NAME: &[u8; 8] = b".text\0\0\0";

/// PE/COFF caps the section count at 96.
const MAX_SECTIONS: u16 = 96;
const MAX_CODE_SECTION_SIZE: u32 = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeSection {
    /// Absolute address of the first byte of the section.
    pub address: u64,
    pub size: usize,
}

/// Find the `.text` section of the module mapped at `module_base`.
///
/// Returns `None` for unreadable or malformed headers.
pub fn locate_code_section<R: ReadMemory + ?Sized>(
    reader: &R,
    module_base: u64,
) -> Option<CodeSection> {
    let dos_magic = reader.read_bytes(module_base, 2).ok()?;
    if dos_magic != DOS_MAGIC {
        debug!("No DOS header at {:#x}", module_base);
        return None;
    }

    let e_lfanew = reader.read_u32(module_base + E_LFANEW_OFFSET).ok()?;
    let nt = module_base + u64::from(e_lfanew);
    if reader.read_bytes(nt, 4).ok()? != NT_MAGIC {
        debug!("No NT header at {:#x}", nt);
        return None;
    }

    let [lo, hi] = reader.read_array::<2>(nt + 6).ok()?;
    let section_count = u16::from_le_bytes([lo, hi]).min(MAX_SECTIONS);
    let [lo, hi] = reader.read_array::<2>(nt + 20).ok()?;
    let optional_header_size = u16::from_le_bytes([lo, hi]);
    let table = nt + FILE_HEADER_SIZE + u64::from(optional_header_size);

    let headers = reader
        .read_bytes(table, SECTION_HEADER_SIZE * section_count as usize)
        .ok()?;
    let section = headers
        .chunks_exact(SECTION_HEADER_SIZE)
        .find(|header| &header[..8] == CODE_SECTION_NAME)?;

    let virtual_size = u32::from_le_bytes([section[8], section[9], section[10], section[11]]);
    let virtual_address = u32::from_le_bytes([section[12], section[13], section[14], section[15]]);
    if virtual_size == 0 || virtual_size > MAX_CODE_SECTION_SIZE {
        debug!("Implausible .text size {:#x}", virtual_size);
        return None;
    }

    Some(CodeSection {
        address: module_base + u64::from(virtual_address),
        size: virtual_size as usize,
    })
}
