use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::debug;

use crate::error::Result;

/// Remembers where a module is loaded in a process, keyed by (pid, module name).
///
/// Only successful lookups are cached, so a module that is still loading is
/// looked up again on the next attempt. Entries for exited processes age out.
#[derive(Debug)]
pub struct ModuleAddressCache {
    bases: Cache<(u32, String), u64>,
}

impl ModuleAddressCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            bases: Cache::builder()
                .max_capacity(max_entries.max(1) as u64)
                .time_to_live(ttl)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
        }
    }

    /// Return the cached base of `module` in `pid`, or run `lookup` and cache its result.
    pub fn resolve(
        &self,
        pid: u32,
        module: &str,
        lookup: impl FnOnce() -> Result<u64>,
    ) -> Result<u64> {
        let key = (pid, module.to_ascii_lowercase());
        if let Some(base) = self.bases.get(&key) {
            return Ok(base);
        }

        let base = lookup()?;
        debug!("{} loaded at {:#x} in PID {}", module, base, pid);
        self.bases.insert(key, base);
        Ok(base)
    }

    pub fn len(&self) -> usize {
        self.bases.run_pending_tasks();
        self.bases.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
