//! Settings loaded from TOML.
//!
//! Every field has a default, so a partial file (or none at all) is valid:
//!
//! ```toml
//! [cache]
//! ttl_secs = 3600
//!
//! [matching.columns]
//! result = "Identifier"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheSettings,
    pub enrichment: EnrichmentSettings,
    pub matching: MatchingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    /// Hard per-entry limit of the backing store
    pub max_entry_bytes: usize,
    /// Share of `max_entry_bytes` a fragment may use
    pub fragment_ratio: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 6 * 60 * 60,
            max_entry_bytes: 100_000,
            fragment_ratio: 0.9,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentSettings {
    /// Wall-clock budget of one invocation
    pub budget_secs: u64,
    /// Delay before a suspended run is re-invoked
    pub resume_delay_secs: u64,
    pub cursor_key: String,
    pub identifier_column: String,
    pub output_column: String,
    /// Rows between progress notifications
    pub progress_interval: usize,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            budget_secs: 270,
            resume_delay_secs: 60,
            cursor_key: "enrichment_cursor".to_string(),
            identifier_column: "DIN".to_string(),
            output_column: "Secondary Code".to_string(),
            progress_interval: 100,
        }
    }
}

impl EnrichmentSettings {
    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs)
    }

    pub fn resume_delay(&self) -> Duration {
        Duration::from_secs(self.resume_delay_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingSettings {
    /// Rows between progress notifications
    pub progress_interval: usize,
    /// Registry country; rows for other countries are skipped
    pub country_code: String,
    /// Re-resolve rows that already carry an identifier
    pub overwrite_existing: bool,
    pub columns: ColumnNames,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            progress_interval: 100,
            country_code: "CA".to_string(),
            overwrite_existing: false,
            columns: ColumnNames::default(),
        }
    }
}

/// Header names of the target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub kind: String,
    pub name: String,
    pub ingredients: String,
    pub strength: String,
    pub form: String,
    pub country: String,
    pub result: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            kind: "Type".to_string(),
            name: "Name".to_string(),
            ingredients: "Ingredients".to_string(),
            strength: "Strength".to_string(),
            form: "Form".to_string(),
            country: "Country".to_string(),
            result: "DIN".to_string(),
        }
    }
}

impl Settings {
    /// Load and validate settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Settings from `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let ratio = self.cache.fragment_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "cache.fragment_ratio",
                reason: format!("{} is outside (0, 1]", ratio),
            });
        }
        if self.cache.max_entry_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "cache.max_entry_bytes",
                reason: "must be positive".to_string(),
            });
        }
        if self.enrichment.cursor_key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "enrichment.cursor_key",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
