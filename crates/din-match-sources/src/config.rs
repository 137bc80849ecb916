//! Endpoint settings for the registry feeds and the secondary lookup.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder replaced by the identifier in [`FeedConfig::lookup_url_template`].
pub const IDENTIFIER_PLACEHOLDER: &str = "{identifier}";

#[derive(Error, Debug)]
pub enum SourceConfigError {
    #[error("Failed to read source config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid source config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Lookup URL template must contain {placeholder}: {template:?}")]
    MissingPlaceholder {
        template: String,
        placeholder: &'static str,
    },

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

pub type SourceConfigResult<T> = Result<T, SourceConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Full dump of product records
    pub products_url: String,
    /// Full dump of status records
    pub statuses_url: String,
    /// Full dump of active-ingredient records
    pub ingredients_url: String,
    /// Secondary lookup endpoint, e.g. `https://codes.example/api/{identifier}`
    pub lookup_url_template: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            products_url: "https://health-products.canada.ca/api/drug/drugproduct/?lang=en&type=json"
                .to_string(),
            statuses_url: "https://health-products.canada.ca/api/drug/status/?lang=en&type=json"
                .to_string(),
            ingredients_url:
                "https://health-products.canada.ca/api/drug/activeingredient/?lang=en&type=json"
                    .to_string(),
            lookup_url_template: String::new(),
            timeout_secs: 120,
            user_agent: concat!("din-match/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FeedConfig {
    pub fn load(path: impl AsRef<Path>) -> SourceConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SourceConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> SourceConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Lookup URL for one identifier.
    pub fn lookup_url(&self, identifier: &str) -> SourceConfigResult<String> {
        if !self.lookup_url_template.contains(IDENTIFIER_PLACEHOLDER) {
            return Err(SourceConfigError::MissingPlaceholder {
                template: self.lookup_url_template.clone(),
                placeholder: IDENTIFIER_PLACEHOLDER,
            });
        }
        Ok(self
            .lookup_url_template
            .replace(IDENTIFIER_PLACEHOLDER, identifier.trim()))
    }
}
