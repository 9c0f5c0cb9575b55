//! A synchronous client that fetches an identity's experiment assignments from the server.
use std::{sync::Arc, time::Duration};

use crate::{
    experiment::Snapshot,
    track_config::ConfigService,
    transport::Transport,
    validation::{validate_custom_properties, CustomProperties},
    wire::{AssignmentRequest, AssignmentResponse},
    Result, UserIdentity,
};

/// Fetches [`Snapshot`]s. Makes exactly one request per call; never retries.
pub struct AssignmentClient {
    transport: Arc<dyn Transport>,
    config_service: Arc<ConfigService>,
    platform: String,
}

impl AssignmentClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        config_service: Arc<ConfigService>,
        platform: impl Into<String>,
    ) -> AssignmentClient {
        AssignmentClient {
            transport,
            config_service,
            platform: platform.into(),
        }
    }

    /// Fetch the assignment payload for `identity`, returning `None` on any failure. Failures are
    /// logged.
    pub fn fetch(
        &self,
        identity: &UserIdentity,
        variable_name: &str,
        custom_properties: &CustomProperties,
        timeout: Duration,
    ) -> Option<Snapshot> {
        self.try_fetch(identity, variable_name, custom_properties, timeout)
            .inspect_err(|err| {
                log::warn!(target: "abtest",
                           distinct_id = identity.distinct_id.as_str(),
                           variable_name;
                           "failed to fetch experiments: {}", err);
            })
            .ok()
    }

    /// Same as [`AssignmentClient::fetch`] but reports why the fetch failed.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`](crate::Error::Validation) if custom properties are invalid. No
    ///   request is made in this case.
    /// - [`Error::Network`](crate::Error::Network) or [`Error::Timeout`](crate::Error::Timeout)
    ///   if the request failed.
    /// - [`Error::Decode`](crate::Error::Decode) or
    ///   [`Error::UnsuccessfulResponse`](crate::Error::UnsuccessfulResponse) if the response is
    ///   not usable.
    pub fn try_fetch(
        &self,
        identity: &UserIdentity,
        variable_name: &str,
        custom_properties: &CustomProperties,
        timeout: Duration,
    ) -> Result<Snapshot> {
        let with_properties = !custom_properties.is_empty();
        if with_properties {
            validate_custom_properties(custom_properties)?;
        }

        let (login_id, anonymous_id) = if identity.is_login_id {
            (Some(identity.distinct_id.as_str()), None)
        } else {
            (None, Some(identity.distinct_id.as_str()))
        };

        let request = AssignmentRequest {
            login_id,
            anonymous_id,
            platform: &self.platform,
            abtest_lib_version: env!("CARGO_PKG_VERSION"),
            properties: serde_json::Map::new(),
            custom_ids: &identity.custom_ids,
            custom_properties: with_properties.then_some(custom_properties),
            param_name: with_properties.then_some(variable_name),
        };
        let body = serde_json::to_string(&request)?;

        log::debug!(target: "abtest",
                    distinct_id = identity.distinct_id.as_str(),
                    variable_name;
                    "fetching experiments");
        let raw = self.transport.send(body, timeout)?;

        let response: AssignmentResponse = serde_json::from_str(&raw)?;
        let (snapshot, track_config) = response.into_snapshot(&identity.cache_key())?;

        if let Some(track_config) = track_config {
            self.config_service.update_from(track_config);
        }

        log::debug!(target: "abtest",
                    distinct_id = identity.distinct_id.as_str(),
                    groups = snapshot.groups.len(),
                    outs = snapshot.outs.len();
                    "successfully fetched experiments");
        Ok(snapshot)
    }
}
