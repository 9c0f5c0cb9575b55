//! Remembers the last group a trigger event was sent for, per identity and experiment.
use crate::{
    cache::{BoundedCache, CacheConfig},
    UserIdentity,
};

/// `EventDedupCache` suppresses repeated trigger events for unchanged assignments. It is safe to
/// share between threads.
///
/// Keys include the identity's custom ids, so the same distinct id bound to different custom ids
/// is tracked separately.
pub struct EventDedupCache {
    cache: BoundedCache<(String, String), String>,
}

impl EventDedupCache {
    pub fn new(config: CacheConfig) -> EventDedupCache {
        EventDedupCache {
            cache: BoundedCache::new(config),
        }
    }

    fn key(identity: &UserIdentity, experiment_id: &str) -> (String, String) {
        (identity.cache_key(), experiment_id.to_owned())
    }

    /// Returns `true` if the last event for `(identity, experiment_id)` was sent for `group_id`.
    pub fn was_already_triggered(
        &self,
        identity: &UserIdentity,
        experiment_id: &str,
        group_id: &str,
    ) -> bool {
        self.last_group(identity, experiment_id)
            .is_some_and(|last| last == group_id)
    }

    pub fn remember(&self, identity: &UserIdentity, experiment_id: &str, group_id: &str) {
        self.cache
            .put(Self::key(identity, experiment_id), group_id.to_owned());
    }

    /// The group the last event for `(identity, experiment_id)` was sent for.
    pub fn last_group(&self, identity: &UserIdentity, experiment_id: &str) -> Option<String> {
        self.cache.get(&Self::key(identity, experiment_id))
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
}
