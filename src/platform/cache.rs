//! Initialize-once capability cache
//!
//! The cache is written exactly once and read concurrently afterwards.
//! `OnceCell` gives lock-free reads after population.

use super::capability::PlatformCapability;
use crate::error::{config_err, TilingResult};
use once_cell::sync::OnceCell;
use std::collections::HashMap;

static GLOBAL_CAPABILITY: CapabilityCache = CapabilityCache::new();

/// Process-wide capability cache
pub fn global() -> &'static CapabilityCache {
    &GLOBAL_CAPABILITY
}

/// Holds the platform capability for the lifetime of a compiled program
#[derive(Debug, Default)]
pub struct CapabilityCache {
    cell: OnceCell<PlatformCapability>,
}

impl CapabilityCache {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Parse and store a JSON platform description.
    ///
    /// A malformed description always fails. Once populated, the first
    /// capability wins; a later description that differs is logged and ignored.
    pub fn load(&self, description: &str) -> TilingResult<&PlatformCapability> {
        let parsed = PlatformCapability::from_json_str(description)?;
        Ok(self.store(parsed))
    }

    /// Same as [`load`](Self::load) for a key/value description
    pub fn load_map(&self, entries: &HashMap<String, String>) -> TilingResult<&PlatformCapability> {
        let parsed = PlatformCapability::from_map(entries)?;
        Ok(self.store(parsed))
    }

    /// Store an already parsed capability
    pub fn store(&self, capability: PlatformCapability) -> &PlatformCapability {
        let stored = self.cell.get_or_init(|| capability.clone());
        if stored != &capability {
            tracing::warn!(
                cached_cores = stored.core_count_primary,
                cached_ub = stored.fast_tier_bytes,
                ignored_cores = capability.core_count_primary,
                ignored_ub = capability.fast_tier_bytes,
                "platform capability already loaded, ignoring different description"
            );
        }
        stored
    }

    /// Cached capability; `Config` error before the first load
    pub fn get(&self) -> TilingResult<&PlatformCapability> {
        self.cell
            .get()
            .ok_or_else(|| config_err("platform capability", "loaded before planning", "not loaded"))
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}
