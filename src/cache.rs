//! A thread-safe in-memory map with time-to-live and an approximate capacity bound, backed by
//! `moka`. Shared by the experiment cache and the trigger dedup cache.
use std::{hash::Hash, time::Duration};

/// TTL and capacity of an in-memory cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Entries older than this are invisible to readers.
    pub ttl: Duration,
    /// Maximum number of entries. The bound may be briefly exceeded under concurrent writes.
    pub max_entries: usize,
}

impl CacheConfig {
    /// Default value for [`CacheConfig::ttl`]: one day.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(1440 * 60);
    /// Default value for [`CacheConfig::max_entries`].
    pub const DEFAULT_MAX_ENTRIES: usize = 4096;

    /// Build a config from loosely-typed inputs (e.g., values read from a config file). Negative
    /// values are clamped to zero, which disables caching.
    pub fn from_minutes(ttl_minutes: i64, max_entries: i64) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(ttl_minutes.max(0).unsigned_abs() * 60),
            max_entries: usize::try_from(max_entries.max(0)).unwrap_or(usize::MAX),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> CacheConfig {
        CacheConfig {
            ttl: CacheConfig::DEFAULT_TTL,
            max_entries: CacheConfig::DEFAULT_MAX_ENTRIES,
        }
    }
}

/// `BoundedCache` allows concurrent readers and writers. Reads never observe an expired entry.
/// Capacity is enforced by `moka`'s admission and eviction policy, so the bound is approximate
/// until pending maintenance runs.
pub(crate) struct BoundedCache<K, V> {
    entries: Option<moka::sync::Cache<K, V>>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        // A zero bound disables caching entirely.
        let entries = (config.max_entries > 0 && !config.ttl.is_zero()).then(|| {
            moka::sync::Cache::builder()
                .max_capacity(u64::try_from(config.max_entries).unwrap_or(u64::MAX))
                .time_to_live(config.ttl)
                .build()
        });
        BoundedCache { entries }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.as_ref()?.get(key)
    }

    pub fn put(&self, key: K, value: V) {
        if let Some(entries) = &self.entries {
            entries.insert(key, value);
        }
    }

    /// Number of live entries, after applying pending evictions.
    pub fn len(&self) -> usize {
        let Some(entries) = &self.entries else {
            return 0;
        };
        entries.run_pending_tasks();
        usize::try_from(entries.entry_count()).unwrap_or(usize::MAX)
    }

    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.invalidate_all();
            entries.run_pending_tasks();
        }
    }

    /// Copy of all live entries.
    pub fn snapshot(&self) -> Vec<(K, V)> {
        let Some(entries) = &self.entries else {
            return Vec::new();
        };
        entries
            .iter()
            .map(|(k, v)| (K::clone(&k), v))
            .collect()
    }
}
