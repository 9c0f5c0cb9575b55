//! Maps an assignment payload to the value of one requested variable.
//!
//! Resolution is a pure function of the snapshot, the variable name, and the caller's default
//! value. It does not log events; it returns the records the trigger service needs.
use crate::{
    error::ValueParseError,
    experiment::{ExperimentGroup, HitRecord, OutRecord, Snapshot},
    ExperimentValue,
};

/// Result of resolving a variable against a snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolution {
    /// The first group exposing the variable with a compatible, parseable value.
    pub hit: Option<HitRecord>,
    /// Left experiments that exposed the variable.
    pub outs: Vec<OutRecord>,
}

/// Resolve `variable_name` against `snapshot` for a caller whose default is `default`.
///
/// Groups whose variable has an incompatible type, or whose value fails to parse, are not hits.
pub fn resolve(snapshot: &Snapshot, variable_name: &str, default: &ExperimentValue) -> Resolution {
    let hit = snapshot.groups.iter().find_map(|group| {
        resolve_group(group, variable_name, default)
            .map(|value| HitRecord {
                group: group.clone(),
                value,
            })
    });

    let outs = snapshot
        .outs
        .iter()
        .filter(|group| resolve_group(group, variable_name, default).is_some())
        .map(|group| OutRecord::new(group.clone()))
        .collect();

    log::trace!(target: "abtest",
                variable_name,
                experiment_id = hit.as_ref().and_then(|hit| hit.group.experiment_id.as_deref());
                "resolved variable");

    Resolution { hit, outs }
}

fn resolve_group(
    group: &ExperimentGroup,
    variable_name: &str,
    default: &ExperimentValue,
) -> Option<ExperimentValue> {
    try_resolve_group(group, variable_name, default)
        .inspect_err(|err| {
            log::warn!(target: "abtest",
                       experiment_id = group.experiment_id.as_deref();
                       "ignoring experiment group: {}", err);
        })
        .ok()
        .flatten()
}

/// Convert the value of `variable_name` in `group`.
///
/// Returns `Ok(None)` if the group does not expose the variable or its type is incompatible with
/// `default`.
///
/// # Errors
///
/// Returns [`ValueParseError`] if the types are compatible but the raw value is malformed.
pub fn try_resolve_group(
    group: &ExperimentGroup,
    variable_name: &str,
    default: &ExperimentValue,
) -> Result<Option<ExperimentValue>, ValueParseError> {
    match group.variables.get(variable_name) {
        Some(variable) => default.convert(&variable.name, variable.value_type, &variable.value),
        None => Ok(None),
    }
}
