//! Per-identity cache of assignment payloads.
use std::sync::Arc;

use crate::{
    cache::{BoundedCache, CacheConfig},
    experiment::Snapshot,
    ExperimentValue, UserIdentity,
};

/// `ExperimentCache` stores the latest [`Snapshot`] per identity. It is safe to share between
/// threads.
pub struct ExperimentCache {
    cache: BoundedCache<String, Arc<Snapshot>>,
}

impl ExperimentCache {
    pub fn new(config: CacheConfig) -> ExperimentCache {
        ExperimentCache {
            cache: BoundedCache::new(config),
        }
    }

    /// Cached snapshot for `identity`, if any. Never touches the network.
    pub fn get_or_nil(&self, identity: &UserIdentity) -> Option<Arc<Snapshot>> {
        self.cache.get(&identity.cache_key())
    }

    /// Cached snapshot for `identity`, but only if it holds a group exposing `variable_name` with
    /// a type acceptable for `default`.
    pub fn lookup(
        &self,
        identity: &UserIdentity,
        variable_name: &str,
        default: &ExperimentValue,
    ) -> Option<Arc<Snapshot>> {
        self.get_or_nil(identity)
            .filter(|snapshot| snapshot.find_group(variable_name, default).is_some())
    }

    /// Store `snapshot` for `identity`, replacing any previous one.
    pub fn put(&self, identity: &UserIdentity, snapshot: Arc<Snapshot>) {
        let key = identity.cache_key();
        if snapshot.identity_key != key {
            log::warn!(target: "abtest",
                       distinct_id = identity.distinct_id.as_str();
                       "internal: refusing to cache a snapshot fetched for another identity");
            return;
        }
        log::debug!(target: "abtest",
                    distinct_id = identity.distinct_id.as_str();
                    "caching experiments");
        self.cache.put(key, snapshot);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cache.clear()
    }

    /// All live entries keyed by identity cache key.
    pub fn snapshot(&self) -> Vec<(String, Arc<Snapshot>)> {
        self.cache.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::ExperimentCache;
    use crate::{
        cache::CacheConfig,
        experiment::{test_support::group, Snapshot},
        value::ValueType,
        ExperimentValue, UserIdentity,
    };

    fn snapshot_for(identity: &UserIdentity) -> Arc<Snapshot> {
        Arc::new(Snapshot {
            identity_key: identity.cache_key(),
            groups: vec![group("2", "1", "int_experiment", ValueType::Integer, "123")],
            outs: vec![],
        })
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = ExperimentCache::new(CacheConfig::default());
        let identity = UserIdentity::new("user-a", true);
        let snapshot = snapshot_for(&identity);

        assert!(cache.get_or_nil(&identity).is_none());
        cache.put(&identity, snapshot.clone());
        assert_eq!(cache.get_or_nil(&identity), Some(snapshot));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn identities_do_not_leak_into_each_other() {
        let cache = ExperimentCache::new(CacheConfig::default());
        let plain = UserIdentity::new("user-a", true);
        let bound = UserIdentity::new("user-a", true)
            .with_custom_ids([("household".to_owned(), "h1".to_owned())].into());

        cache.put(&plain, snapshot_for(&plain));
        assert!(cache.get_or_nil(&bound).is_none());
        assert!(cache.get_or_nil(&UserIdentity::new("user-a", false)).is_none());
    }

    #[test]
    fn refuses_snapshot_of_another_identity() {
        let cache = ExperimentCache::new(CacheConfig::default());
        let a = UserIdentity::new("a", false);
        let b = UserIdentity::new("b", false);

        cache.put(&a, snapshot_for(&b));
        assert!(cache.is_empty());
    }

    #[test]
    fn lookup_requires_compatible_variable() {
        let cache = ExperimentCache::new(CacheConfig::default());
        let identity = UserIdentity::new("user-a", true);
        cache.put(&identity, snapshot_for(&identity));

        assert!(cache
            .lookup(&identity, "int_experiment", &ExperimentValue::Int(-1))
            .is_some());
        assert!(cache
            .lookup(&identity, "int_experiment", &ExperimentValue::from("x"))
            .is_none());
        assert!(cache
            .lookup(&identity, "other", &ExperimentValue::Int(-1))
            .is_none());
    }

    #[test]
    fn zero_ttl_disables_cache() {
        let cache = ExperimentCache::new(CacheConfig {
            ttl: Duration::ZERO,
            max_entries: 10,
        });
        let identity = UserIdentity::new("user-a", true);
        cache.put(&identity, snapshot_for(&identity));
        assert!(cache.get_or_nil(&identity).is_none());
    }
}
