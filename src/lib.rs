//! An A/B testing client that resolves experiment variables for users and reports exposures.
//!
//! # Overview
//!
//! The crate revolves around an [`Engine`] that resolves a named experiment *variable* for a
//! [`UserIdentity`]. The remote assignment service is the source of truth; the engine keeps the
//! latest assignment payload per identity in an [`ExperimentCache`] to avoid redundant requests.
//! Resolution results in an [`ExperimentResult`] carrying either the experiment's value or the
//! caller's default.
//!
//! # Typed values
//!
//! The caller selects the expected type by the variant of the default [`ExperimentValue`]. A
//! variable whose server-declared type does not match is never surfaced; the default is returned
//! instead.
//!
//! # Trigger events
//!
//! Every resolution that hits an experiment emits a `$ABTestTrigger` event through the configured
//! [`EventSink`], unless the same group was already reported for the same identity and experiment
//! (see [`EventDedupCache`]). What events contain is controlled by the server through
//! [`TrackConfig`].
//!
//! ```
//! # use abtest::{EngineConfig, Properties};
//! let config = EngineConfig::new(
//!     "https://abtest.example.com/api/v2/abtest/online/results?project-key=KEY",
//!     |distinct_id: &str, is_login_id: bool, event: &str, properties: &Properties| {
//!         println!("{event} {distinct_id} {is_login_id} {properties:?}");
//!     },
//! );
//! ```
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum. Only configuration errors are returned to the
//! caller; everything else (invalid custom properties, network failures, malformed responses) is
//! logged and results in the default value.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging
//! messages under the `abtest` target. Consider integrating a `log`-compatible logger
//! implementation for better visibility into engine operations.

#![warn(rustdoc::missing_crate_level_docs)]

mod assignment_client;
mod cache;
mod config;
mod dedup_cache;
mod engine;
mod error;
mod event_sink;
mod experiment;
mod experiment_cache;
mod identity;
mod resolver;
mod track_config;
mod transport;
mod trigger;
mod validation;
mod value;
mod wire;

pub use assignment_client::AssignmentClient;
pub use cache::CacheConfig;
pub use config::{EngineConfig, ResolveOptions};
pub use dedup_cache::EventDedupCache;
pub use engine::{Engine, ExperimentResult};
pub use error::{ConfigurationError, Error, Result, ValidationError, ValueParseError};
pub use event_sink::{EventSink, Properties, TRIGGER_EVENT_NAME};
pub use experiment::{
    ExperimentGroup, HitRecord, OutRecord, Snapshot, SubjectName, TrackRecord, Variable,
    INVALID_ID,
};
pub use experiment_cache::ExperimentCache;
pub use identity::UserIdentity;
pub use resolver::{resolve, try_resolve_group, Resolution};
pub use track_config::{ConfigService, TrackConfig};
pub use transport::{HttpTransport, Transport};
pub use trigger::{TriggerOutcome, TriggerService};
pub use validation::{
    validate_custom_ids, validate_custom_properties, CustomProperties, PropertyValue,
};
pub use value::{ExperimentValue, ValueType};
