use std::sync::Arc;

use crate::value::ValueType;

/// Represents a result type for operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur while resolving experiments.
///
/// Only [`Error::Configuration`] is ever returned from [`Engine`](crate::Engine) methods. Every
/// other kind is absorbed by the engine, logged, and turned into "no hit" so the caller receives
/// its default value.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The engine cannot be constructed from the provided configuration.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Caller-supplied custom properties or custom ids are invalid.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Network error.
    #[error(transparent)]
    Network(Arc<reqwest::Error>),

    /// The request did not complete within the per-call timeout.
    #[error("request timed out")]
    Timeout,

    /// Response body could not be decoded.
    #[error("error decoding response body")]
    Decode(#[source] Arc<serde_json::Error>),

    /// Server answered with a status other than `SUCCESS`, or without a results list.
    #[error("unusable response (status: {0:?})")]
    UnsuccessfulResponse(String),

    /// A variable value does not parse as its declared type.
    #[error(transparent)]
    ValueParse(#[from] ValueParseError),
}

impl Error {
    /// Return `true` if the error must be surfaced to the caller.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(Arc::new(value.without_url()))
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Decode(Arc::new(value))
    }
}

/// Fatal, construction-time errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// `server_url` is empty.
    #[error("server_url is missing")]
    MissingServerUrl,

    /// `server_url` is not a valid URL.
    #[error("invalid server_url configuration")]
    InvalidServerUrl(#[source] url::ParseError),

    /// No [`EventSink`](crate::EventSink) was provided.
    #[error("event sink is not configured")]
    MissingEventSink,
}

/// Invalid custom property or custom id. Short-circuits the request before any network call.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum ValidationError {
    #[error("invalid property name {0:?}")]
    InvalidPropertyName(String),

    #[error("value of property {name:?} is longer than {max} characters")]
    PropertyValueTooLong { name: String, max: usize },

    #[error("invalid value for property {0:?}")]
    InvalidPropertyValue(String),

    #[error("invalid custom id name {0:?}")]
    InvalidCustomIdName(String),

    #[error("invalid value for custom id {0:?}")]
    InvalidCustomIdValue(String),
}

/// A variable's raw value cannot be parsed as its declared type even though the type matches the
/// caller's default value.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("cannot parse value {raw:?} of variable {variable:?} as {declared:?}")]
pub struct ValueParseError {
    /// Variable name.
    pub variable: String,
    /// Type declared by the server for the variable.
    pub declared: ValueType,
    /// Raw text that failed to parse.
    pub raw: String,
}
