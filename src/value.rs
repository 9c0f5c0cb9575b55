use derive_more::From;
use serde::{Deserialize, Serialize};

use crate::error::ValueParseError;

/// Type of an experiment variable as declared by the server.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum ValueType {
    String,
    Integer,
    Boolean,
    Json,
}

/// A default value supplied by the caller, or a resolved experiment value.
///
/// The variant of the default value selects which variable types are acceptable:
///
/// | default | accepted variable type |
/// |---|---|
/// | `Str` | `STRING`, and `JSON` if the text starts with `{` and ends with `}` |
/// | `Json` | `JSON` |
/// | `Int` | `INTEGER` |
/// | `Bool` | `BOOLEAN` |
///
/// JSON values are carried as raw text and never structurally decoded.
///
/// ```
/// # use abtest::ExperimentValue;
/// let int_default = ExperimentValue::Int(-1);
/// let bool_default: ExperimentValue = false.into();
/// let str_default: ExperimentValue = "control".into();
/// let json_default = ExperimentValue::Json("{}".to_owned());
/// # let _ = (int_default, bool_default, str_default, json_default);
/// ```
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, From)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExperimentValue {
    /// An integer value.
    #[serde(rename = "INTEGER")]
    Int(i64),
    /// A string value.
    #[serde(rename = "STRING")]
    Str(String),
    /// A boolean value.
    #[serde(rename = "BOOLEAN")]
    Bool(bool),
    /// Raw JSON object text.
    #[from(ignore)]
    Json(String),
}

impl From<&str> for ExperimentValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<i32> for ExperimentValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl ExperimentValue {
    /// Returns `true` if a variable declared as `variable_type` may be surfaced in place of this
    /// default value.
    pub fn accepts(&self, variable_type: ValueType) -> bool {
        match (self, variable_type) {
            (ExperimentValue::Str(_), ValueType::String) => true,
            (ExperimentValue::Str(s), ValueType::Json) => looks_like_json_object(s),
            (ExperimentValue::Json(_), ValueType::Json) => true,
            (ExperimentValue::Int(_), ValueType::Integer) => true,
            (ExperimentValue::Bool(_), ValueType::Boolean) => true,
            _ => false,
        }
    }

    /// Convert `raw` (declared as `variable_type`) into a value of the same shape as `self`.
    ///
    /// Returns `Ok(None)` when the types are incompatible and `Err` when they are compatible but
    /// `raw` is not a valid literal of the declared type.
    pub(crate) fn convert(
        &self,
        variable: &str,
        variable_type: ValueType,
        raw: &str,
    ) -> Result<Option<ExperimentValue>, ValueParseError> {
        if !self.accepts(variable_type) {
            return Ok(None);
        }

        let value = match variable_type {
            ValueType::String => ExperimentValue::Str(raw.to_owned()),
            ValueType::Json => match self {
                // A string default stays a string even when it carries JSON.
                ExperimentValue::Str(_) => ExperimentValue::Str(raw.to_owned()),
                _ => ExperimentValue::Json(raw.to_owned()),
            },
            ValueType::Integer => {
                let i = raw.parse::<i64>().map_err(|_| ValueParseError {
                    variable: variable.to_owned(),
                    declared: variable_type,
                    raw: raw.to_owned(),
                })?;
                ExperimentValue::Int(i)
            }
            // Anything other than "true" (case-insensitively) is false.
            ValueType::Boolean => ExperimentValue::Bool(raw.eq_ignore_ascii_case("true")),
        };

        Ok(Some(value))
    }

    /// Returns the value as an integer if it is of type Int.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ExperimentValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a string slice if it is of type Str.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExperimentValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a boolean if it is of type Bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ExperimentValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Raw JSON text. Returns `None` for non-JSON values.
    pub fn as_json(&self) -> Option<&str> {
        match self {
            ExperimentValue::Json(s) => Some(s),
            _ => None,
        }
    }
}

fn looks_like_json_object(s: &str) -> bool {
    s.starts_with('{') && s.ends_with('}')
}
