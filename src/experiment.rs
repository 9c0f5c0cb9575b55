//! Experiment assignment model: what the server says an identity is (or was) assigned to.
use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::value::{ExperimentValue, ValueType};

/// Group and result id carried by records of experiments the identity has left.
pub const INVALID_ID: &str = "-1";

pub(crate) const GROUP_ID_FIELD: &str = "abtest_experiment_group_id";
pub(crate) const RESULT_ID_FIELD: &str = "abtest_experiment_result_id";

/// Entity type an experiment targets.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectName {
    /// Experiment is bucketed by device.
    Device,
    /// Experiment is bucketed by user. Unknown subject names fall back to this.
    #[default]
    #[serde(other)]
    User,
}

/// A named, typed value exposed by a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Variable name.
    pub name: String,
    /// Type declared by the server.
    pub value_type: ValueType,
    /// Raw value, not yet converted to `value_type`.
    pub value: String,
}

/// One variant of an experiment together with the server flags attached to the assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentGroup {
    pub experiment_id: Option<String>,
    pub group_id: Option<String>,
    pub result_id: Option<String>,
    pub version: Option<String>,
    pub is_control_group: bool,
    pub is_white_list: bool,
    /// Whether repeated trigger events for this assignment may be suppressed.
    pub cacheable: bool,
    pub subject_name: SubjectName,
    pub subject_id: Option<String>,
    pub variables: HashMap<String, Variable>,
    /// The untouched payload entry, used to copy extension fields into trigger events.
    pub source: Arc<serde_json::Map<String, serde_json::Value>>,
}

impl ExperimentGroup {
    /// Return the variable named `name` if a caller holding `default` may use it.
    pub fn compatible_variable(&self, name: &str, default: &ExperimentValue) -> Option<&Variable> {
        self.variables
            .get(name)
            .filter(|variable| default.accepts(variable.value_type))
    }
}

/// The full assignment payload resolved for one identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// [`UserIdentity::cache_key`](crate::UserIdentity::cache_key) of the identity this payload
    /// was fetched for.
    pub identity_key: String,
    /// Groups the identity is currently assigned to, in payload order.
    pub groups: Vec<ExperimentGroup>,
    /// Groups the identity has left.
    pub outs: Vec<ExperimentGroup>,
}

impl Snapshot {
    /// First group (in payload order) exposing `variable_name` with a type acceptable for
    /// `default`.
    pub fn find_group(
        &self,
        variable_name: &str,
        default: &ExperimentValue,
    ) -> Option<&ExperimentGroup> {
        self.groups
            .iter()
            .find(|group| group.compatible_variable(variable_name, default).is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// A group the identity is currently assigned to, with the resolved value.
#[derive(Debug, Clone, PartialEq)]
pub struct HitRecord {
    pub group: ExperimentGroup,
    pub value: ExperimentValue,
}

/// A group the identity was previously assigned to but has left.
#[derive(Debug, Clone, PartialEq)]
pub struct OutRecord {
    group: ExperimentGroup,
}

impl OutRecord {
    /// Group and result ids are replaced with [`INVALID_ID`], in the source fragment as well so
    /// extension fields copied from it carry the same ids.
    pub fn new(mut group: ExperimentGroup) -> OutRecord {
        group.group_id = Some(INVALID_ID.to_owned());
        group.result_id = Some(INVALID_ID.to_owned());

        let source = Arc::make_mut(&mut group.source);
        for field in [GROUP_ID_FIELD, RESULT_ID_FIELD] {
            if source.contains_key(field) {
                source.insert(field.to_owned(), INVALID_ID.into());
            }
        }
        OutRecord { group }
    }

    pub fn group(&self) -> &ExperimentGroup {
        &self.group
    }
}

/// Anything that may produce a trigger event.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackRecord {
    Hit(HitRecord),
    Out(OutRecord),
}

impl TrackRecord {
    pub fn group(&self) -> &ExperimentGroup {
        match self {
            TrackRecord::Hit(hit) => &hit.group,
            TrackRecord::Out(out) => out.group(),
        }
    }

    pub fn is_out(&self) -> bool {
        matches!(self, TrackRecord::Out(_))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::{collections::HashMap, sync::Arc};

    use super::{ExperimentGroup, SubjectName, Variable};
    use crate::value::ValueType;

    /// A group with a single variable.
    pub fn group(
        experiment_id: &str,
        group_id: &str,
        variable: &str,
        value_type: ValueType,
        value: &str,
    ) -> ExperimentGroup {
        let source = serde_json::json!({
            "abtest_experiment_id": experiment_id,
            "abtest_experiment_group_id": group_id,
            "abtest_experiment_result_id": format!("r{experiment_id}-{group_id}"),
            "abtest_experiment_version": "1",
        });
        ExperimentGroup {
            experiment_id: Some(experiment_id.to_owned()),
            group_id: Some(group_id.to_owned()),
            result_id: Some(format!("r{experiment_id}-{group_id}")),
            version: Some("1".to_owned()),
            is_control_group: false,
            is_white_list: false,
            cacheable: true,
            subject_name: SubjectName::User,
            subject_id: None,
            variables: HashMap::from([(
                variable.to_owned(),
                Variable {
                    name: variable.to_owned(),
                    value_type,
                    value: value.to_owned(),
                },
            )]),
            source: Arc::new(source.as_object().cloned().unwrap_or_default()),
        }
    }
}
