//! Full-dump client for the three drug product registry feeds.

use din_match_core::models::{IngredientRecord, ProductRecord, StatusRecord};
use din_match_core::registry::{parse_feed, Feed, RegistryError, RegistryResult, RegistrySource};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::{FeedConfig, SourceConfigError, SourceConfigResult};

/// Blocking HTTP client for the products, statuses and active-ingredients feeds.
pub struct DpdFeedClient {
    http_client: reqwest::blocking::Client,
    config: FeedConfig,
}

impl DpdFeedClient {
    pub fn new(config: FeedConfig) -> SourceConfigResult<Self> {
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

    fn url(&self, feed: Feed) -> &str {
        match feed {
            Feed::Products => &self.config.products_url,
            Feed::Statuses => &self.config.statuses_url,
            Feed::ActiveIngredients => &self.config.ingredients_url,
        }
    }

    /// Fetch a feed body. Any transport failure or non-success status is
    /// `Unavailable`.
    fn fetch_body(&self, feed: Feed) -> RegistryResult<String> {
        let url = self.url(feed);
        debug!(%feed, url, "fetching registry feed");

        let unavailable = |reason: String| RegistryError::Unavailable { feed, reason };

        let response = self
            .http_client
            .get(url)
            .send()
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {}", status.as_u16())));
        }

        let body = response.text().map_err(|e| unavailable(e.to_string()))?;
        info!(%feed, bytes = body.len(), "fetched registry feed");
        Ok(body)
    }

    fn fetch<T: DeserializeOwned>(&self, feed: Feed) -> RegistryResult<Vec<T>> {
        let body = self.fetch_body(feed)?;
        parse_feed(feed, &body)
    }
}

impl RegistrySource for DpdFeedClient {
    fn products(&self) -> RegistryResult<Vec<ProductRecord>> {
        self.fetch(Feed::Products)
    }

    fn statuses(&self) -> RegistryResult<Vec<StatusRecord>> {
        self.fetch(Feed::Statuses)
    }

    fn active_ingredients(&self) -> RegistryResult<Vec<IngredientRecord>> {
        self.fetch(Feed::ActiveIngredients)
    }
}
