//! Builds and emits `$ABTestTrigger` events for resolved experiments.
use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate};
use serde_json::Value;

use crate::{
    dedup_cache::EventDedupCache,
    event_sink::{EventSink, Properties, TRIGGER_EVENT_NAME},
    experiment::{SubjectName, TrackRecord, INVALID_ID},
    track_config::ConfigService,
    UserIdentity,
};

pub(crate) const EXPERIMENT_ID_PROPERTY: &str = "$abtest_experiment_id";
pub(crate) const GROUP_ID_PROPERTY: &str = "$abtest_experiment_group_id";
pub(crate) const ANONYMOUS_ID_PROPERTY: &str = "anonymous_id";
pub(crate) const LIB_PLUGIN_VERSION_PROPERTY: &str = "$lib_plugin_version";
pub(crate) const RESULT_PROPERTY: &str = "abtest_result";

/// Outcome of tracking a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// An event was sent.
    Triggered,
    /// The same group was already reported for this identity and experiment.
    Suppressed,
    /// Nothing to report (white-listed, no experiment id, or triggering disabled).
    Skipped,
}

/// `TriggerService` turns hit and out records into trigger events.
///
/// The only state owned by a service instance is the day the library-version property was last
/// attached; independent instances do not share it.
pub struct TriggerService {
    sink: Arc<dyn EventSink + Send + Sync>,
    dedup_cache: EventDedupCache,
    config_service: Arc<ConfigService>,
    last_trigger_day: Mutex<Option<NaiveDate>>,
}

impl TriggerService {
    pub fn new(
        sink: Arc<dyn EventSink + Send + Sync>,
        dedup_cache: EventDedupCache,
        config_service: Arc<ConfigService>,
    ) -> TriggerService {
        TriggerService {
            sink,
            dedup_cache,
            config_service,
            last_trigger_day: Mutex::new(None),
        }
    }

    pub fn dedup_cache(&self) -> &EventDedupCache {
        &self.dedup_cache
    }

    /// Track every record for `identity`, merging `extra_properties` into each event.
    ///
    /// With property sets enabled, every event carries the result ids of all records in the batch.
    pub fn track_all(
        &self,
        identity: &UserIdentity,
        records: &[TrackRecord],
        extra_properties: Option<&Properties>,
    ) -> Vec<TriggerOutcome> {
        let today = Local::now().date_naive();
        let result_ids = valid_result_ids(records);
        records
            .iter()
            .map(|record| self.track_on(identity, record, &result_ids, extra_properties, today))
            .collect()
    }

    pub fn track(
        &self,
        identity: &UserIdentity,
        record: &TrackRecord,
        extra_properties: Option<&Properties>,
    ) -> TriggerOutcome {
        self.track_all(identity, std::slice::from_ref(record), extra_properties)
            .pop()
            .unwrap_or(TriggerOutcome::Skipped)
    }

    fn track_on(
        &self,
        identity: &UserIdentity,
        record: &TrackRecord,
        result_ids: &[&str],
        extra_properties: Option<&Properties>,
        today: NaiveDate,
    ) -> TriggerOutcome {
        let group = record.group();
        let experiment_id = match group.experiment_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => return TriggerOutcome::Skipped,
        };
        if group.is_white_list {
            return TriggerOutcome::Skipped;
        }

        let track_config = self.config_service.current();
        if !track_config.trigger_enabled {
            return TriggerOutcome::Skipped;
        }

        let group_id = group.group_id.as_deref().unwrap_or(INVALID_ID);
        if group.cacheable
            && self
                .dedup_cache
                .was_already_triggered(identity, experiment_id, group_id)
        {
            log::trace!(target: "abtest",
                        distinct_id = identity.distinct_id.as_str(),
                        experiment_id,
                        group_id;
                        "trigger event suppressed");
            return TriggerOutcome::Suppressed;
        }

        let mut properties = extra_properties.cloned().unwrap_or_default();
        properties.insert(EXPERIMENT_ID_PROPERTY.to_owned(), experiment_id.into());
        if !record.is_out() {
            if let Some(group_id) = group.group_id.as_deref() {
                properties.insert(GROUP_ID_PROPERTY.to_owned(), group_id.into());
            }
        }
        for (name, value) in &identity.custom_ids {
            properties.insert(name.clone(), value.as_str().into());
        }
        if group.subject_name == SubjectName::Device {
            if let Some(subject_id) = group.subject_id.as_deref() {
                properties.insert(ANONYMOUS_ID_PROPERTY.to_owned(), subject_id.into());
            } else if !identity.is_login_id {
                properties.insert(
                    ANONYMOUS_ID_PROPERTY.to_owned(),
                    identity.distinct_id.as_str().into(),
                );
            }
        }

        for field in &track_config.extension_fields {
            if let Some(value) = group.source.get(field) {
                properties.insert(format!("${field}"), value.clone());
            }
        }

        if self.claim_first_of_day(today) {
            properties.insert(
                LIB_PLUGIN_VERSION_PROPERTY.to_owned(),
                Value::Array(vec![format!(
                    "rust_abtesting:{}",
                    env!("CARGO_PKG_VERSION")
                )
                .into()]),
            );
        }

        if track_config.property_set_enabled && has_valid_result_id(record) {
            properties.insert(
                RESULT_PROPERTY.to_owned(),
                result_ids.iter().map(|id| Value::from(*id)).collect(),
            );
        }

        log::trace!(target: "abtest",
                    distinct_id = identity.distinct_id.as_str(),
                    experiment_id,
                    group_id;
                    "sending trigger event");
        self.sink.track(
            &identity.distinct_id,
            identity.is_login_id,
            TRIGGER_EVENT_NAME,
            &properties,
        );

        if group.cacheable {
            self.dedup_cache.remember(identity, experiment_id, group_id);
        }
        TriggerOutcome::Triggered
    }

    /// Returns `true` exactly once per calendar day and advances the remembered day.
    fn claim_first_of_day(&self, today: NaiveDate) -> bool {
        let mut last_day = self
            .last_trigger_day
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        if *last_day == Some(today) {
            return false;
        }
        *last_day = Some(today);
        true
    }
}

fn has_valid_result_id(record: &TrackRecord) -> bool {
    record
        .group()
        .result_id
        .as_deref()
        .is_some_and(|id| id != INVALID_ID)
}

/// Result ids of every record in a batch, skipping left experiments and white-listed groups.
fn valid_result_ids(records: &[TrackRecord]) -> Vec<&str> {
    let mut ids: Vec<&str> = Vec::new();
    for record in records {
        if record.group().is_white_list || !has_valid_result_id(record) {
            continue;
        }
        if let Some(id) = record.group().result_id.as_deref() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}
