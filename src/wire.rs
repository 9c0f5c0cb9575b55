//! Request and response bodies exchanged with the assignment service.
use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    experiment::{ExperimentGroup, Snapshot, SubjectName, Variable},
    track_config::TrackConfig,
    validation::CustomProperties,
    value::ValueType,
    Error, Result,
};

pub(crate) const SUCCESS_STATUS: &str = "SUCCESS";

#[derive(Debug, Serialize)]
pub(crate) struct AssignmentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymous_id: Option<&'a str>,
    pub platform: &'a str,
    pub abtest_lib_version: &'a str,
    pub properties: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub custom_ids: &'a HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_properties: Option<&'a CustomProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param_name: Option<&'a str>,
}

/// `TryParse` allows a subfield to fail parsing without failing the parsing of the whole
/// response.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum TryParse<T> {
    Parsed(T),
    ParseFailed(serde_json::Value),
}

impl<T> From<TryParse<T>> for Option<T> {
    fn from(value: TryParse<T>) -> Self {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssignmentResponse {
    #[serde(default)]
    pub status: Option<String>,
    /// Kept as raw values so each entry can be decoded on its own and its source fragment
    /// preserved.
    #[serde(default)]
    pub results: Option<Vec<serde_json::Value>>,
    #[serde(default, alias = "out_list")]
    pub out: Vec<serde_json::Value>,
    #[serde(default)]
    pub track_config: Option<TryParse<TrackConfigWire>>,
}

/// Server ids come as either strings or numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdWire {
    String(String),
    Number(serde_json::Number),
}

impl From<IdWire> for String {
    fn from(value: IdWire) -> String {
        match value {
            IdWire::String(s) => s,
            IdWire::Number(n) => n.to_string(),
        }
    }
}

fn default_cacheable() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ResultWire {
    #[serde(default)]
    abtest_experiment_id: Option<IdWire>,
    #[serde(default)]
    abtest_experiment_group_id: Option<IdWire>,
    #[serde(default)]
    abtest_experiment_result_id: Option<IdWire>,
    #[serde(default)]
    abtest_experiment_version: Option<IdWire>,
    #[serde(default)]
    is_control_group: bool,
    #[serde(default)]
    is_white_list: bool,
    #[serde(default = "default_cacheable")]
    cacheable: bool,
    #[serde(default)]
    subject_name: Option<SubjectName>,
    #[serde(default)]
    subject_id: Option<IdWire>,
    #[serde(default)]
    variables: Vec<TryParse<VariableWire>>,
}

#[derive(Debug, Deserialize)]
struct VariableWire {
    name: String,
    #[serde(rename = "type")]
    value_type: ValueType,
    value: String,
}

#[derive(Debug, Deserialize, PartialEq)]
pub(crate) struct TrackConfigWire {
    #[serde(default)]
    item_switch: bool,
    #[serde(default = "default_trigger_switch")]
    trigger_switch: bool,
    #[serde(default)]
    property_set_switch: bool,
    #[serde(default)]
    trigger_content_ext: Option<Vec<String>>,
}

fn default_trigger_switch() -> bool {
    true
}

impl From<TrackConfigWire> for TrackConfig {
    fn from(wire: TrackConfigWire) -> TrackConfig {
        let defaults = TrackConfig::default();
        TrackConfig {
            item_enabled: wire.item_switch,
            trigger_enabled: wire.trigger_switch,
            property_set_enabled: wire.property_set_switch,
            extension_fields: wire
                .trigger_content_ext
                .map(|fields| fields.into_iter().collect())
                .unwrap_or(defaults.extension_fields),
        }
    }
}

impl AssignmentResponse {
    /// Convert into a snapshot for the identity identified by `identity_key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsuccessfulResponse`] unless status is `SUCCESS` and a results list is
    /// present.
    pub fn into_snapshot(self, identity_key: &str) -> Result<(Snapshot, Option<TrackConfig>)> {
        let status = self.status.unwrap_or_default();
        let results = match self.results {
            Some(results) if status == SUCCESS_STATUS => results,
            _ => return Err(Error::UnsuccessfulResponse(status)),
        };

        let snapshot = Snapshot {
            identity_key: identity_key.to_owned(),
            groups: results.into_iter().filter_map(decode_group).collect(),
            outs: self.out.into_iter().filter_map(decode_group).collect(),
        };

        let track_config = self.track_config.and_then(|track_config| {
            let parsed: Option<TrackConfigWire> = track_config.into();
            if parsed.is_none() {
                log::warn!(target: "abtest", "ignoring malformed track_config");
            }
            parsed.map(TrackConfig::from)
        });

        Ok((snapshot, track_config))
    }
}

fn decode_group(source: serde_json::Value) -> Option<ExperimentGroup> {
    let serde_json::Value::Object(source) = source else {
        log::warn!(target: "abtest", "ignoring non-object experiment entry");
        return None;
    };

    let wire: ResultWire =
        match serde_json::from_value(serde_json::Value::Object(source.clone())) {
            Ok(wire) => wire,
            Err(err) => {
                log::warn!(target: "abtest", "ignoring malformed experiment entry: {:?}", err);
                return None;
            }
        };

    let variables = wire
        .variables
        .into_iter()
        .filter_map(Option::<VariableWire>::from)
        .map(|v| {
            (
                v.name.clone(),
                Variable {
                    name: v.name,
                    value_type: v.value_type,
                    value: v.value,
                },
            )
        })
        .collect();

    Some(ExperimentGroup {
        experiment_id: wire.abtest_experiment_id.map(String::from),
        group_id: wire.abtest_experiment_group_id.map(String::from),
        result_id: wire.abtest_experiment_result_id.map(String::from),
        version: wire.abtest_experiment_version.map(String::from),
        is_control_group: wire.is_control_group,
        is_white_list: wire.is_white_list,
        cacheable: wire.cacheable,
        subject_name: wire.subject_name.unwrap_or_default(),
        subject_id: wire.subject_id.map(String::from),
        variables,
        source: Arc::new(source),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::{AssignmentRequest, AssignmentResponse};
    use crate::{experiment::SubjectName, value::ValueType, Error, TrackConfig};

    fn parse(value: serde_json::Value) -> AssignmentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn decodes_successful_response() {
        let response = parse(json!({
            "status": "SUCCESS",
            "results": [{
                "abtest_experiment_id": "2",
                "abtest_experiment_group_id": 1,
                "abtest_experiment_result_id": "55",
                "abtest_experiment_version": "3",
                "is_control_group": true,
                "subject_name": "DEVICE",
                "subject_id": "dev-1",
                "variables": [{"name": "int_experiment", "type": "INTEGER", "value": "123"}]
            }]
        }));

        let (snapshot, track_config) = response.into_snapshot("key").unwrap();
        assert!(track_config.is_none());
        assert_eq!(snapshot.identity_key, "key");
        assert_eq!(snapshot.groups.len(), 1);

        let group = &snapshot.groups[0];
        assert_eq!(group.experiment_id.as_deref(), Some("2"));
        assert_eq!(group.group_id.as_deref(), Some("1"));
        assert_eq!(group.result_id.as_deref(), Some("55"));
        assert_eq!(group.version.as_deref(), Some("3"));
        assert!(group.is_control_group);
        assert!(!group.is_white_list);
        assert!(group.cacheable);
        assert_eq!(group.subject_name, SubjectName::Device);
        assert_eq!(group.subject_id.as_deref(), Some("dev-1"));
        let variable = &group.variables["int_experiment"];
        assert_eq!(variable.value_type, ValueType::Integer);
        assert_eq!(variable.value, "123");
        assert_eq!(group.source["abtest_experiment_version"], json!("3"));
    }

    #[test]
    fn rejects_non_success_status_and_missing_results() {
        let failed = parse(json!({"status": "FAILED", "results": []}));
        assert!(matches!(
            failed.into_snapshot("key"),
            Err(Error::UnsuccessfulResponse(status)) if status == "FAILED"
        ));

        let no_results = parse(json!({"status": "SUCCESS"}));
        assert!(matches!(
            no_results.into_snapshot("key"),
            Err(Error::UnsuccessfulResponse(_))
        ));
    }

    #[test]
    fn skips_malformed_entries_and_variables() {
        let response = parse(json!({
            "status": "SUCCESS",
            "results": [
                "not an object",
                {"abtest_experiment_id": {"nested": true}},
                {
                    "abtest_experiment_id": "7",
                    "variables": [
                        {"name": "a", "type": "DATETIME", "value": "x"},
                        {"name": "b", "type": "BOOLEAN", "value": "true"}
                    ]
                }
            ],
            "out_list": [{"abtest_experiment_id": "8", "variables": []}]
        }));

        let (snapshot, _) = response.into_snapshot("key").unwrap();
        assert_eq!(snapshot.groups.len(), 1);
        let variables: Vec<_> = snapshot.groups[0].variables.keys().collect();
        assert_eq!(variables, vec!["b"]);
        assert_eq!(snapshot.outs.len(), 1);
        assert_eq!(snapshot.outs[0].experiment_id.as_deref(), Some("8"));
    }

    #[test]
    fn unknown_or_null_subject_name_is_user() {
        let response = parse(json!({
            "status": "SUCCESS",
            "results": [
                {"abtest_experiment_id": "1", "subject_name": "HOUSEHOLD"},
                {"abtest_experiment_id": "2", "subject_name": null},
                {"abtest_experiment_id": "3", "subject_name": "DEVICE"}
            ]
        }));

        let (snapshot, _) = response.into_snapshot("key").unwrap();
        let subjects: Vec<_> = snapshot.groups.iter().map(|g| g.subject_name).collect();
        assert_eq!(
            subjects,
            vec![SubjectName::User, SubjectName::User, SubjectName::Device]
        );
    }

    #[test]
    fn decodes_track_config() {
        let response = parse(json!({
            "status": "SUCCESS",
            "results": [],
            "track_config": {
                "item_switch": true,
                "trigger_switch": false,
                "property_set_switch": true,
                "trigger_content_ext": ["abtest_experiment_version"]
            }
        }));

        let (_, track_config) = response.into_snapshot("key").unwrap();
        let track_config = track_config.unwrap();
        assert!(track_config.item_enabled);
        assert!(!track_config.trigger_enabled);
        assert!(track_config.property_set_enabled);
        assert_eq!(
            track_config.extension_fields.into_iter().collect::<Vec<_>>(),
            vec!["abtest_experiment_version".to_owned()]
        );
    }

    #[test]
    fn malformed_track_config_is_ignored() {
        let response = parse(json!({
            "status": "SUCCESS",
            "results": [],
            "track_config": {"trigger_switch": "maybe"}
        }));
        let (_, track_config) = response.into_snapshot("key").unwrap();
        assert!(track_config.is_none());
    }

    #[test]
    fn missing_extension_list_keeps_defaults() {
        let response = parse(json!({
            "status": "SUCCESS",
            "results": [],
            "track_config": {"trigger_switch": true}
        }));
        let (_, track_config) = response.into_snapshot("key").unwrap();
        assert_eq!(track_config, Some(TrackConfig::default()));
    }

    #[test]
    fn request_omits_empty_optional_fields() {
        let custom_ids = HashMap::new();
        let request = AssignmentRequest {
            login_id: None,
            anonymous_id: Some("anon"),
            platform: "Rust",
            abtest_lib_version: "0.1.0",
            properties: serde_json::Map::new(),
            custom_ids: &custom_ids,
            custom_properties: None,
            param_name: None,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "anonymous_id": "anon",
                "platform": "Rust",
                "abtest_lib_version": "0.1.0",
                "properties": {}
            })
        );
    }
}
