//! Validation of caller-supplied custom properties and custom ids.
use std::{collections::HashMap, sync::OnceLock};

use chrono::{DateTime, Utc};
use derive_more::From;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::ValidationError;

/// Maximum length of a property or custom id name.
pub const MAX_NAME_LENGTH: usize = 100;
/// Maximum length of a string property value.
pub const MAX_STRING_VALUE_LENGTH: usize = 8192;
/// Maximum length of a custom id value.
pub const MAX_CUSTOM_ID_LENGTH: usize = 1024;

const RESERVED_NAMES: &[&str] = &[
    "distinct_id",
    "original_id",
    "time",
    "properties",
    "id",
    "first_id",
    "second_id",
    "users",
    "events",
    "event",
    "user_id",
    "date",
    "datetime",
];
const RESERVED_PREFIXES: &[&str] = &["user_tag", "user_group"];

/// Custom properties sent along with an assignment request.
pub type CustomProperties = HashMap<String, PropertyValue>;

/// A custom property value. The set of variants is the set of types the assignment service
/// accepts.
///
/// ```
/// # use abtest::PropertyValue;
/// let number: PropertyValue = 42.0.into();
/// let flag: PropertyValue = true.into();
/// let text: PropertyValue = "premium".into();
/// let list: PropertyValue = vec!["a".to_owned(), "b".to_owned()].into();
/// # let _ = (number, flag, text, list);
/// ```
#[derive(Debug, Clone, PartialEq, From)]
pub enum PropertyValue {
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Boolean(bool),
    StringList(Vec<String>),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl Serialize for PropertyValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            PropertyValue::Number(n) => serializer.serialize_f64(*n),
            PropertyValue::String(s) => serializer.serialize_str(s),
            PropertyValue::Date(d) => serializer
                .collect_str(&d.format("%Y-%m-%d %H:%M:%S%.3f")),
            PropertyValue::Boolean(b) => serializer.serialize_bool(*b),
            PropertyValue::StringList(list) => list.serialize(serializer),
        }
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z_$][a-zA-Z0-9_$]{0,99}$").expect("name pattern should compile")
    })
}

fn is_valid_name(name: &str) -> bool {
    if !name_pattern().is_match(name) {
        return false;
    }
    let lower = name.to_ascii_lowercase();
    !RESERVED_NAMES.contains(&lower.as_str())
        && !RESERVED_PREFIXES
            .iter()
            .any(|prefix| lower.starts_with(prefix))
}

/// Check names, lengths, and values of custom properties.
pub fn validate_custom_properties(properties: &CustomProperties) -> Result<(), ValidationError> {
    for (name, value) in properties {
        if !is_valid_name(name) {
            return Err(ValidationError::InvalidPropertyName(name.clone()));
        }

        match value {
            PropertyValue::Number(n) if !n.is_finite() => {
                return Err(ValidationError::InvalidPropertyValue(name.clone()));
            }
            PropertyValue::String(s) if s.chars().count() > MAX_STRING_VALUE_LENGTH => {
                return Err(ValidationError::PropertyValueTooLong {
                    name: name.clone(),
                    max: MAX_STRING_VALUE_LENGTH,
                });
            }
            PropertyValue::StringList(list)
                if list
                    .iter()
                    .any(|s| s.chars().count() > MAX_STRING_VALUE_LENGTH) =>
            {
                return Err(ValidationError::PropertyValueTooLong {
                    name: name.clone(),
                    max: MAX_STRING_VALUE_LENGTH,
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// Check names and values of custom ids.
pub fn validate_custom_ids(custom_ids: &HashMap<String, String>) -> Result<(), ValidationError> {
    for (name, value) in custom_ids {
        if !is_valid_name(name) {
            return Err(ValidationError::InvalidCustomIdName(name.clone()));
        }
        let length = value.chars().count();
        if length == 0 || length > MAX_CUSTOM_ID_LENGTH {
            return Err(ValidationError::InvalidCustomIdValue(name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{TimeZone, Utc};

    use super::{
        validate_custom_ids, validate_custom_properties, CustomProperties, PropertyValue,
        MAX_CUSTOM_ID_LENGTH, MAX_STRING_VALUE_LENGTH,
    };
    use crate::error::ValidationError;

    fn props(name: &str, value: PropertyValue) -> CustomProperties {
        [(name.to_owned(), value)].into_iter().collect()
    }

    #[test]
    fn accepts_supported_values() {
        let properties: CustomProperties = [
            ("age".to_owned(), 30.0.into()),
            ("$city".to_owned(), "Paris".into()),
            ("is_vip".to_owned(), true.into()),
            ("tags".to_owned(), vec!["a".to_owned()].into()),
            (
                "signup".to_owned(),
                Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap().into(),
            ),
        ]
        .into_iter()
        .collect();

        assert_eq!(validate_custom_properties(&properties), Ok(()));
    }

    #[test]
    fn rejects_bad_names() {
        for name in ["", "1abc", "has space", "time", "Distinct_Id", "user_tag_x", "a-b"] {
            assert_eq!(
                validate_custom_properties(&props(name, true.into())),
                Err(ValidationError::InvalidPropertyName(name.to_owned())),
                "{name:?} should be rejected"
            );
        }

        let long_name = "a".repeat(101);
        assert!(validate_custom_properties(&props(&long_name, true.into())).is_err());
        let max_name = "a".repeat(100);
        assert!(validate_custom_properties(&props(&max_name, true.into())).is_ok());
    }

    #[test]
    fn rejects_long_strings() {
        let ok = "x".repeat(MAX_STRING_VALUE_LENGTH);
        assert!(validate_custom_properties(&props("s", ok.clone().into())).is_ok());

        let too_long = "x".repeat(MAX_STRING_VALUE_LENGTH + 1);
        assert!(matches!(
            validate_custom_properties(&props("s", too_long.clone().into())),
            Err(ValidationError::PropertyValueTooLong { .. })
        ));
        assert!(matches!(
            validate_custom_properties(&props("l", vec![ok, too_long].into())),
            Err(ValidationError::PropertyValueTooLong { .. })
        ));
    }

    #[test]
    fn rejects_non_finite_numbers() {
        assert_eq!(
            validate_custom_properties(&props("n", f64::NAN.into())),
            Err(ValidationError::InvalidPropertyValue("n".to_owned()))
        );
    }

    #[test]
    fn validates_custom_ids() {
        let ok: HashMap<_, _> = [("household".to_owned(), "h1".to_owned())].into();
        assert_eq!(validate_custom_ids(&ok), Ok(()));

        let bad_name: HashMap<_, _> = [("bad name".to_owned(), "h1".to_owned())].into();
        assert!(matches!(
            validate_custom_ids(&bad_name),
            Err(ValidationError::InvalidCustomIdName(_))
        ));

        let empty: HashMap<_, _> = [("household".to_owned(), String::new())].into();
        assert!(matches!(
            validate_custom_ids(&empty),
            Err(ValidationError::InvalidCustomIdValue(_))
        ));

        let long: HashMap<_, _> =
            [("household".to_owned(), "h".repeat(MAX_CUSTOM_ID_LENGTH + 1))].into();
        assert!(validate_custom_ids(&long).is_err());
    }

    #[test]
    fn serializes_dates_in_service_format() {
        let date = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            serde_json::to_value(PropertyValue::Date(date)).unwrap(),
            serde_json::json!("2024-01-02 03:04:05.000")
        );
        assert_eq!(
            serde_json::to_value(PropertyValue::StringList(vec!["a".into()])).unwrap(),
            serde_json::json!(["a"])
        );
    }
}
