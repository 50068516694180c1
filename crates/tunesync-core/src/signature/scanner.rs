use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::debug;

use crate::process::ReadMemory;
use crate::signature::Signature;
use crate::signature::pe::locate_code_section;

/// A copy of a module's `.text` section taken from a live process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSectionSnapshot {
    /// Absolute address of `bytes[0]` in the target process.
    pub address: u64,
    pub bytes: Vec<u8>,
}

impl CodeSectionSnapshot {
    /// Absolute address of the first match of `signature`.
    pub fn find(&self, signature: &Signature) -> Option<u64> {
        signature
            .find_first(&self.bytes)
            .map(|offset| self.address + offset as u64)
    }
}

/// Finds signatures in a module's code, reading each `.text` section at most once
/// while it stays cached.
///
/// Snapshots are keyed by (pid, module base). A lookup for a different pid than the
/// previous one drops every cached snapshot.
#[derive(Debug)]
pub struct SignatureScanner {
    sections: Cache<(u32, u64), Arc<CodeSectionSnapshot>>,
    last_pid: Mutex<Option<u32>>,
}

impl SignatureScanner {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            sections: Cache::builder()
                .max_capacity(max_entries.max(1) as u64)
                .time_to_live(ttl)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
            last_pid: Mutex::new(None),
        }
    }

    /// Absolute address of the first match of `signature` in the module at `module_base`.
    ///
    /// `None` covers both "pattern absent" and "module unreadable"; neither is an error.
    pub fn find<R: ReadMemory + ?Sized>(
        &self,
        reader: &R,
        pid: u32,
        module_base: u64,
        signature: &Signature,
    ) -> Option<u64> {
        let snapshot = self.snapshot(reader, pid, module_base)?;
        let found = snapshot.find(signature);
        if found.is_none() {
            debug!("Signature not found in PID {} module {:#x}", pid, module_base);
        }
        found
    }

    /// The cached `.text` snapshot for (pid, module base), reading it if needed.
    pub fn snapshot<R: ReadMemory + ?Sized>(
        &self,
        reader: &R,
        pid: u32,
        module_base: u64,
    ) -> Option<Arc<CodeSectionSnapshot>> {
        {
            let mut last_pid = self.last_pid.lock().unwrap_or_else(PoisonError::into_inner);
            if last_pid.is_some_and(|last| last != pid) {
                debug!("Target PID changed to {}, dropping code section cache", pid);
                for (key, _) in self.sections.iter() {
                    if key.0 != pid {
                        self.sections.invalidate(&*key);
                    }
                }
            }
            *last_pid = Some(pid);
        }

        let key = (pid, module_base);
        if let Some(snapshot) = self.sections.get(&key) {
            return Some(snapshot);
        }

        let section = locate_code_section(reader, module_base)?;
        let bytes = match reader.read_bytes(section.address, section.size) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Failed to read code section: {}", e);
                return None;
            }
        };
        debug!(
            "Cached {:#x} bytes of code at {:#x} for PID {}",
            section.size, section.address, pid
        );

        let snapshot = Arc::new(CodeSectionSnapshot {
            address: section.address,
            bytes,
        });
        self.sections.insert(key, Arc::clone(&snapshot));
        Some(snapshot)
    }

    pub fn cached_sections(&self) -> usize {
        self.sections.run_pending_tasks();
        self.sections.entry_count() as usize
    }
}
