//! Delivery of assignment requests to the remote service.
use std::time::Duration;

use reqwest::{header::CONTENT_TYPE, Url};

use crate::Result;

/// Sends a serialized request body to the assignment service and returns the raw response body.
///
/// Implementations must block until the response arrives, an error occurs, or `timeout` elapses.
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// Returns [`Error::Timeout`](crate::Error::Timeout) if `timeout` elapsed, and
    /// [`Error::Network`](crate::Error::Network) for any other delivery failure or non-2xx status.
    fn send(&self, body: String, timeout: Duration) -> Result<String>;
}

/// [`Transport`] over HTTP `POST`.
pub struct HttpTransport {
    // One client per transport; assignment requests share its keep-alive connections.
    client: reqwest::blocking::Client,
    url: Url,
}

impl HttpTransport {
    pub fn new(url: Url) -> HttpTransport {
        HttpTransport {
            client: reqwest::blocking::Client::new(),
            url,
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, body: String, timeout: Duration) -> Result<String> {
        log::debug!(target: "abtest", "sending assignment request");
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .body(body)
            .send()?;

        let response = response.error_for_status().map_err(|err| {
            log::warn!(target: "abtest", "received non-2xx response from assignment service: {:?}", err.status());
            err
        })?;

        Ok(response.text()?)
    }
}
