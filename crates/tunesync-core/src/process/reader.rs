#![cfg_attr(not(target_os = "windows"), allow(dead_code, unused_variables))]

use crate::error::{Error, Result};
use crate::process::ProcessHandle;
use crate::process::string::{
    MAX_REMOTE_STRING, SSO_INLINE_CAPACITY, SSO_LENGTH_OFFSET, SsoLayout, decode_remote_text,
};

#[cfg(target_os = "windows")]
use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;

/// Typed reads from another process's address space.
///
/// Only `read_bytes` touches the target; every other read is built on it.
/// Implementations must fail instead of returning partial or zeroed data.
pub trait ReadMemory {
    /// Read exactly `size` bytes at `address`.
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    fn read_array<const N: usize>(&self, address: u64) -> Result<[u8; N]> {
        let bytes = self.read_bytes(address, N)?;
        bytes
            .try_into()
            .map_err(|_| Error::remote(address, format!("Expected {} bytes", N)))
    }

    fn read_i16(&self, address: u64) -> Result<i16> {
        self.read_array(address).map(i16::from_le_bytes)
    }

    fn read_i32(&self, address: u64) -> Result<i32> {
        self.read_array(address).map(i32::from_le_bytes)
    }

    fn read_u32(&self, address: u64) -> Result<u32> {
        self.read_array(address).map(u32::from_le_bytes)
    }

    fn read_i64(&self, address: u64) -> Result<i64> {
        self.read_array(address).map(i64::from_le_bytes)
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        self.read_array(address).map(u64::from_le_bytes)
    }

    fn read_f32(&self, address: u64) -> Result<f32> {
        self.read_array(address).map(f32::from_le_bytes)
    }

    fn read_f64(&self, address: u64) -> Result<f64> {
        self.read_array(address).map(f64::from_le_bytes)
    }

    /// Read a pointer-sized word for the given layout.
    fn read_word(&self, address: u64, layout: SsoLayout) -> Result<u64> {
        match layout {
            SsoLayout::X86 => self.read_u32(address).map(u64::from),
            SsoLayout::X64 => self.read_u64(address),
        }
    }

    /// Read an MSVC `std::string` object located at `address`.
    fn read_remote_string(&self, address: u64, layout: SsoLayout) -> Result<String> {
        let len = self.read_word(address + SSO_LENGTH_OFFSET, layout)?;
        if len == 0 {
            return Ok(String::new());
        }
        if len > MAX_REMOTE_STRING {
            return Err(Error::remote(
                address,
                format!("Implausible string length {}", len),
            ));
        }

        let data = if len <= SSO_INLINE_CAPACITY {
            address
        } else {
            self.read_word(address, layout)?
        };
        let bytes = self.read_bytes(data, len as usize)?;
        Ok(decode_remote_text(&bytes))
    }
}

/// Reads memory of a live process through `ReadProcessMemory`.
#[derive(Debug)]
pub struct MemoryReader {
    process: ProcessHandle,
}

impl MemoryReader {
    pub fn new(process: ProcessHandle) -> Self {
        Self { process }
    }

    pub fn process(&self) -> &ProcessHandle {
        &self.process
    }

    #[cfg(target_os = "windows")]
    fn read_bytes_impl(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        let mut bytes_read = 0;

        // SAFETY: the handle was opened with PROCESS_VM_READ and stays open for the lifetime
        // of self. The destination buffer is exactly `size` bytes long. An invalid source
        // address makes the call fail, which is reported through the Result.
        unsafe {
            ReadProcessMemory(
                self.process.raw(),
                address as *const _,
                buffer.as_mut_ptr() as *mut _,
                size,
                Some(&mut bytes_read),
            )
            .map_err(|e| Error::remote(address, e.to_string()))?;
        }

        if bytes_read != size {
            return Err(Error::remote(
                address,
                format!("Expected {} bytes, read {}", size, bytes_read),
            ));
        }

        Ok(buffer)
    }

    #[cfg(not(target_os = "windows"))]
    fn read_bytes_impl(&self, address: u64, _size: usize) -> Result<Vec<u8>> {
        Err(Error::remote(
            address,
            "Windows only: memory reading not supported on this platform",
        ))
    }
}

impl ReadMemory for MemoryReader {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        self.read_bytes_impl(address, size)
    }
}
