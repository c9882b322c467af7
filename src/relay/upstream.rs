//! HTTP client for the upstream streaming completion API.

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::relay::prompt::build_request;

/// Issues one streamed completion request per suggestion.
///
/// Holds no per-request state; a single instance is shared by all handlers.
/// Carries the bearer credential, so it does not implement `Debug`.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
}

impl UpstreamClient {
    /// Create a client from upstream settings and the bearer credential.
    pub fn new(config: &UpstreamConfig, api_key: impl Into<String>) -> Result<Self, reqwest::Error> {
        // No total request timeout: the response body is a long-lived stream.
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self {
            http,
            url: config.responses_url(),
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send the streamed request and return as soon as response headers arrive.
    ///
    /// The body is left unread; dropping the response closes the upstream
    /// connection.
    pub async fn open_stream(&self, context: &str) -> Result<reqwest::Response, reqwest::Error> {
        let body = build_request(&self.model, context);
        debug!(url = %self.url, model = %self.model, "Opening upstream stream");

        self.http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(&body)
            .send()
            .await
    }
}
