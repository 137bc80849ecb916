//! Per-identifier secondary-code lookup over HTTP.

use din_match_core::enrich::{CodeLookup, LookupError, LookupResult};
use serde_json::Value;
use tracing::debug;

use crate::config::{FeedConfig, SourceConfigError, SourceConfigResult};

/// One GET per identifier against the configured lookup template.
pub struct SecondaryCodeClient {
    http_client: reqwest::blocking::Client,
    config: FeedConfig,
}

impl SecondaryCodeClient {
    /// Fails when the template has no identifier placeholder.
    pub fn new(config: FeedConfig) -> SourceConfigResult<Self> {
        config.lookup_url("")?;

        let http_client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()
            .map_err(|e| SourceConfigError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }
}

impl CodeLookup for SecondaryCodeClient {
    fn lookup(&self, identifier: &str) -> LookupResult<Value> {
        let url = self
            .config
            .lookup_url(identifier)
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        debug!(identifier, "secondary code lookup");

        let response = self
            .http_client
            .get(&url)
            .send()
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| LookupError::Malformed(e.to_string()))
    }
}
