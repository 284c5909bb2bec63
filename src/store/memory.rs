//! In-memory storage implementation
//!
//! Best-effort retention: the cache is bounded by entry count and, when
//! configured, by time since the last write. Entries dropped by either bound
//! simply stop appearing in `get` and `get_all_keys`.

use std::time::Duration;

use moka::sync::Cache;

use super::{Keys, Store};
use crate::config::CacheConfig;
use crate::value::StoredValue;

/// Volatile store over a concurrent `moka` cache.
///
/// Values are kept live, never serialized. `get` hands back a clone, so a
/// caller mutating a fetched context does not touch the cached one until it
/// is `put` again.
#[derive(Clone)]
pub struct MemoryStore {
    cache: Cache<String, StoredValue>,
}

impl MemoryStore {
    /// Store with the default bounds
    pub fn new() -> Self {
        Self::with_config(&CacheConfig::default())
    }

    pub fn with_config(config: &CacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);
        if let Some(secs) = config.expire_after_write_secs {
            builder = builder.time_to_live(Duration::from_secs(secs));
        }
        tracing::debug!(
            component = "Cache",
            max_capacity = config.max_capacity,
            ttl_secs = ?config.expire_after_write_secs,
            "Building in-memory store"
        );
        Self {
            cache: builder.build(),
        }
    }

    /// Approximate number of live entries
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<StoredValue> {
        self.cache.get(key)
    }

    fn put(&self, key: &str, value: StoredValue) {
        super::warn_on_key_mismatch("Cache", key, &value);
        self.cache.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.cache.invalidate(key);
    }

    fn clear(&self) {
        // Per-key invalidation is immediate; `invalidate_all` is applied lazily.
        for (key, _) in self.cache.iter() {
            self.cache.invalidate(key.as_str());
        }
        self.cache.run_pending_tasks();
    }

    fn get_all_keys(&self) -> Keys {
        let keys: Vec<String> = self.cache.iter().map(|(key, _)| key.to_string()).collect();
        Box::new(keys.into_iter())
    }
}
