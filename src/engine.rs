use std::{collections::HashMap, sync::Arc};

use reqwest::Url;
use serde::Serialize;

use crate::{
    assignment_client::AssignmentClient,
    dedup_cache::EventDedupCache,
    error::ConfigurationError,
    experiment::{Snapshot, TrackRecord},
    experiment_cache::ExperimentCache,
    resolver::{self, Resolution},
    track_config::ConfigService,
    transport::{HttpTransport, Transport},
    trigger::TriggerService,
    validation::validate_custom_ids,
    EngineConfig, ExperimentValue, Properties, ResolveOptions, Result, UserIdentity,
};

/// Resolves experiment variables for identities and reports exposures.
///
/// An engine owns its caches. Create one per process and share it between threads.
///
/// # Examples
/// ```no_run
/// # use abtest::{EngineConfig, ExperimentValue, Properties, ResolveOptions, UserIdentity};
/// let engine = EngineConfig::new(
///     "https://abtest.example.com/api/v2/abtest/online/results?project-key=KEY",
///     |_: &str, _: bool, _: &str, _: &Properties| {},
/// )
/// .to_engine()
/// .unwrap();
///
/// let result = engine.resolve(
///     &UserIdentity::new("user-1", true),
///     "button_color",
///     ExperimentValue::from("grey"),
///     &ResolveOptions::default(),
/// );
/// println!("{:?}", result.value);
/// ```
pub struct Engine {
    assignment_client: AssignmentClient,
    experiment_cache: ExperimentCache,
    trigger_service: TriggerService,
    config_service: Arc<ConfigService>,
    config: EngineConfig,
}

/// Outcome of [`Engine::resolve`].
///
/// Experiment fields are `None` when the caller's default value is returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentResult {
    pub distinct_id: String,
    pub is_login_id: bool,
    pub experiment_id: Option<String>,
    pub group_id: Option<String>,
    pub is_control_group: Option<bool>,
    pub is_white_list: Option<bool>,
    pub result_id: Option<String>,
    pub version: Option<String>,
    /// Resolved value, or the caller's default.
    pub value: ExperimentValue,
    /// Records to report if the caller triggers manually.
    #[serde(skip)]
    pub(crate) records: Vec<TrackRecord>,
}

impl ExperimentResult {
    fn fallback(identity: &UserIdentity, default: ExperimentValue) -> ExperimentResult {
        ExperimentResult {
            distinct_id: identity.distinct_id.clone(),
            is_login_id: identity.is_login_id,
            experiment_id: None,
            group_id: None,
            is_control_group: None,
            is_white_list: None,
            result_id: None,
            version: None,
            value: default,
            records: Vec::new(),
        }
    }

    fn from_resolution(
        identity: &UserIdentity,
        default: ExperimentValue,
        resolution: Resolution,
    ) -> ExperimentResult {
        let Resolution { hit, outs } = resolution;
        let mut result = ExperimentResult::fallback(identity, default);

        if let Some(hit) = &hit {
            let group = &hit.group;
            result.experiment_id = group.experiment_id.clone();
            result.group_id = group.group_id.clone();
            result.is_control_group = Some(group.is_control_group);
            result.is_white_list = Some(group.is_white_list);
            result.result_id = group.result_id.clone();
            result.version = group.version.clone();
            result.value = hit.value.clone();
        }

        result.records = hit
            .into_iter()
            .map(TrackRecord::Hit)
            .chain(outs.into_iter().map(TrackRecord::Out))
            .collect();
        result
    }

    /// Returns `true` if the value came from an experiment rather than the caller's default.
    pub fn is_hit(&self) -> bool {
        self.experiment_id.is_some()
    }
}

impl Engine {
    /// Create a new `Engine` using the specified configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`](crate::Error::Configuration) if the server URL is
    /// missing or invalid, or if no event sink is configured.
    pub fn new(config: EngineConfig) -> Result<Engine> {
        let url = parse_server_url(&config.server_url)?;
        Engine::with_transport(config, Arc::new(HttpTransport::new(url)))
    }

    /// Create an `Engine` that sends assignment requests through `transport`.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::new`].
    pub fn with_transport(config: EngineConfig, transport: Arc<dyn Transport>) -> Result<Engine> {
        parse_server_url(&config.server_url)?;
        let sink = config
            .event_sink
            .clone()
            .ok_or(ConfigurationError::MissingEventSink)?;

        let config_service = Arc::new(ConfigService::default());
        Ok(Engine {
            assignment_client: AssignmentClient::new(
                transport,
                config_service.clone(),
                config.platform.clone(),
            ),
            experiment_cache: ExperimentCache::new(config.experiment_cache),
            trigger_service: TriggerService::new(
                sink,
                EventDedupCache::new(config.event_cache),
                config_service.clone(),
            ),
            config_service,
            config,
        })
    }

    /// Resolve `variable_name` for `identity`.
    ///
    /// Never fails: on invalid input, network or decoding errors, or when no experiment exposes
    /// the variable with a type matching `default`, the returned result carries `default` and no
    /// experiment fields.
    pub fn resolve(
        &self,
        identity: &UserIdentity,
        variable_name: &str,
        default: ExperimentValue,
        options: &ResolveOptions,
    ) -> ExperimentResult {
        if let Err(err) = validate_custom_ids(&identity.custom_ids) {
            log::warn!(target: "abtest",
                       distinct_id = identity.distinct_id.as_str(),
                       variable_name;
                       "returning default value: {}", err);
            return ExperimentResult::fallback(identity, default);
        }

        // Assignments that depend on custom properties are not reusable.
        let cacheable = options.properties.is_empty();

        let mut resolution = None;
        if options.use_cache && cacheable {
            if let Some(snapshot) = self.experiment_cache.lookup(identity, variable_name, &default) {
                let cached = resolver::resolve(&snapshot, variable_name, &default);
                if cached.hit.is_some() {
                    log::trace!(target: "abtest",
                                distinct_id = identity.distinct_id.as_str(),
                                variable_name;
                                "serving experiment from cache");
                    resolution = Some(cached);
                }
            }
        }

        let resolution = match resolution {
            Some(resolution) => resolution,
            None => match self.fetch(identity, variable_name, options, cacheable) {
                Some(snapshot) => resolver::resolve(&snapshot, variable_name, &default),
                None => Resolution::default(),
            },
        };

        let result = ExperimentResult::from_resolution(identity, default, resolution);
        if options.auto_trigger {
            self.trigger_service
                .track_all(identity, &result.records, None);
        }
        result
    }

    fn fetch(
        &self,
        identity: &UserIdentity,
        variable_name: &str,
        options: &ResolveOptions,
        cacheable: bool,
    ) -> Option<Arc<Snapshot>> {
        let timeout = options.timeout.unwrap_or(self.config.request_timeout);
        let snapshot = Arc::new(self.assignment_client.fetch(
            identity,
            variable_name,
            &options.properties,
            timeout,
        )?);

        if cacheable && !snapshot.is_empty() {
            self.experiment_cache.put(identity, snapshot.clone());
        }
        Some(snapshot)
    }

    /// Report exposure for a result obtained with `auto_trigger` disabled.
    ///
    /// `custom_ids` must be the custom ids the result was resolved with.
    pub fn manual_trigger(
        &self,
        result: &ExperimentResult,
        extra_properties: Option<&Properties>,
        custom_ids: Option<&HashMap<String, String>>,
    ) {
        let identity = UserIdentity {
            distinct_id: result.distinct_id.clone(),
            is_login_id: result.is_login_id,
            custom_ids: custom_ids.cloned().unwrap_or_default(),
        };
        if let Err(err) = validate_custom_ids(&identity.custom_ids) {
            log::warn!(target: "abtest",
                       distinct_id = identity.distinct_id.as_str();
                       "skipping manual trigger: {}", err);
            return;
        }

        self.trigger_service
            .track_all(&identity, &result.records, extra_properties);
    }

    /// Per-identity assignment cache.
    pub fn experiment_cache(&self) -> &ExperimentCache {
        &self.experiment_cache
    }

    /// Trigger dedup cache.
    pub fn event_dedup_cache(&self) -> &EventDedupCache {
        self.trigger_service.dedup_cache()
    }

    /// Holder of the active trigger policy.
    pub fn config_service(&self) -> &ConfigService {
        &self.config_service
    }
}

fn parse_server_url(server_url: &str) -> Result<Url> {
    if server_url.trim().is_empty() {
        return Err(ConfigurationError::MissingServerUrl.into());
    }
    Ok(Url::parse(server_url).map_err(ConfigurationError::InvalidServerUrl)?)
}
