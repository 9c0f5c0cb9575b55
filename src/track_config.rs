//! Server-controlled policy for trigger events, and a thread-safe holder for the active policy.
//! Whenever the policy changes it is replaced completely; readers receive a snapshot that is not
//! affected by further writes.
use std::{
    collections::BTreeSet,
    sync::{Arc, RwLock},
};

/// What a trigger event contains and whether it is sent at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackConfig {
    /// Item reporting. Carried for the analytics side; trigger events are unaffected.
    pub item_enabled: bool,
    /// When `false`, no trigger events are emitted.
    pub trigger_enabled: bool,
    /// When `true`, trigger events carry the `abtest_result` list property.
    pub property_set_enabled: bool,
    /// Payload fields copied into trigger events, prefixed with `$`.
    pub extension_fields: BTreeSet<String>,
}

impl Default for TrackConfig {
    fn default() -> TrackConfig {
        TrackConfig {
            item_enabled: false,
            trigger_enabled: true,
            property_set_enabled: false,
            extension_fields: [
                "abtest_experiment_result_id".to_owned(),
                "abtest_experiment_version".to_owned(),
            ]
            .into(),
        }
    }
}

/// Holds the [`TrackConfig`] in force. Shared by the assignment client, which updates it from
/// responses, and the trigger service, which reads it for every event.
#[derive(Debug)]
pub struct ConfigService {
    current: RwLock<Arc<TrackConfig>>,
}

impl Default for ConfigService {
    fn default() -> ConfigService {
        ConfigService::new(TrackConfig::default())
    }
}

impl ConfigService {
    pub fn new(initial: TrackConfig) -> ConfigService {
        ConfigService {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Get currently-active policy.
    pub fn current(&self) -> Arc<TrackConfig> {
        // The lock only guards a pointer copy. A poisoned lock still holds a complete policy, so
        // recover it instead of crashing.
        let current = self.current.read().unwrap_or_else(|err| err.into_inner());
        current.clone()
    }

    /// Replace the active policy with `candidate` if it differs from it. Returns `true` if the
    /// policy was replaced.
    pub fn update_from(&self, candidate: TrackConfig) -> bool {
        if *self.current() == candidate {
            return false;
        }

        // Allocate and log outside the lock so the write section is a single pointer store.
        let new_value = Arc::new(candidate);
        log::info!(target: "abtest",
                   trigger_enabled = new_value.trigger_enabled,
                   property_set_enabled = new_value.property_set_enabled,
                   item_enabled = new_value.item_enabled;
                   "track config updated");
        *self.current.write().unwrap_or_else(|err| err.into_inner()) = new_value;
        true
    }
}
