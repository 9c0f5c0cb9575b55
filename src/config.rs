use std::{fmt, sync::Arc, time::Duration};

use crate::{cache::CacheConfig, validation::CustomProperties, Engine, EventSink, Result};

/// Configuration for [`Engine`].
///
/// All fields are public; [`EngineConfig::new`] fills in defaults and individual fields may be
/// overwritten afterwards.
///
/// # Examples
/// ```
/// # use std::time::Duration;
/// # use abtest::{EngineConfig, Properties};
/// let mut config = EngineConfig::new(
///     "https://abtest.example.com/api/v2/abtest/online/results?project-key=KEY",
///     |distinct_id: &str, _is_login_id: bool, event: &str, _properties: &Properties| {
///         println!("{event} for {distinct_id}");
///     },
/// );
/// config.request_timeout = Duration::from_millis(500);
/// let engine = config.to_engine().unwrap();
/// ```
#[derive(Clone)]
pub struct EngineConfig {
    /// Full URL of the assignment endpoint.
    pub server_url: String,
    /// Destination of trigger events. Required.
    pub event_sink: Option<Arc<dyn EventSink + Send + Sync>>,
    /// Default timeout of an assignment request. Overridable per call with
    /// [`ResolveOptions::timeout`].
    pub request_timeout: Duration,
    /// Bounds of the per-identity assignment cache.
    pub experiment_cache: CacheConfig,
    /// Bounds of the trigger dedup cache.
    pub event_cache: CacheConfig,
    /// Value of the `platform` request field.
    pub platform: String,
}

impl EngineConfig {
    /// Default value for [`EngineConfig::request_timeout`].
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(3000);
    /// Default value for [`EngineConfig::platform`].
    pub const DEFAULT_PLATFORM: &'static str = "Rust";

    /// Create a configuration with default settings.
    pub fn new(
        server_url: impl Into<String>,
        event_sink: impl EventSink + Send + Sync + 'static,
    ) -> EngineConfig {
        EngineConfig {
            event_sink: Some(Arc::new(event_sink)),
            ..EngineConfig::without_sink(server_url)
        }
    }

    /// Create a configuration with no event sink. [`Engine::new`] rejects it until
    /// [`EngineConfig::event_sink`] is set.
    pub fn without_sink(server_url: impl Into<String>) -> EngineConfig {
        EngineConfig {
            server_url: server_url.into(),
            event_sink: None,
            request_timeout: EngineConfig::DEFAULT_REQUEST_TIMEOUT,
            experiment_cache: CacheConfig::default(),
            event_cache: CacheConfig::default(),
            platform: EngineConfig::DEFAULT_PLATFORM.to_owned(),
        }
    }

    /// Create a new [`Engine`] using this configuration.
    ///
    /// # Errors
    ///
    /// See [`Engine::new`].
    pub fn to_engine(self) -> Result<Engine> {
        Engine::new(self)
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("server_url", &self.server_url)
            .field("event_sink", &self.event_sink.as_ref().map(|_| "EventSink"))
            .field("request_timeout", &self.request_timeout)
            .field("experiment_cache", &self.experiment_cache)
            .field("event_cache", &self.event_cache)
            .field("platform", &self.platform)
            .finish()
    }
}

/// Per-call options of [`Engine::resolve`].
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Serve from the assignment cache when possible. Defaults to `true`.
    pub use_cache: bool,
    /// Request timeout. Defaults to [`EngineConfig::request_timeout`].
    pub timeout: Option<Duration>,
    /// Emit trigger events for the resolution. Defaults to `true`.
    pub auto_trigger: bool,
    /// Custom properties sent to the server. Requests carrying them bypass the cache.
    pub properties: CustomProperties,
}

impl Default for ResolveOptions {
    fn default() -> ResolveOptions {
        ResolveOptions {
            use_cache: true,
            timeout: None,
            auto_trigger: true,
            properties: CustomProperties::new(),
        }
    }
}
