//! Raw record shapes of the three registry feeds.
//!
//! All three feeds are keyed by `drug_code`. The upstream API publishes some
//! numeric fields as JSON numbers and others as strings, so key and strength
//! fields accept either.

use serde::{Deserialize, Deserializer, Serialize};

/// Product feed row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub drug_code: String,
    #[serde(deserialize_with = "string_or_number")]
    pub drug_identification_number: String,
    #[serde(default)]
    pub brand_name: String,
}

/// Status feed row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub drug_code: String,
    #[serde(default)]
    pub status: String,
}

/// Active ingredient feed row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngredientRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub drug_code: String,
    #[serde(default)]
    pub ingredient_name: String,
    #[serde(default, alias = "strength_value", deserialize_with = "string_or_number")]
    pub strength: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub strength_unit: String,
}

impl IngredientRecord {
    /// Strength text as stored on the registry entry ("200 MG").
    pub fn strength_raw(&self) -> String {
        let value = self.strength.trim();
        let unit = self.strength_unit.trim();
        if unit.is_empty() {
            value.to_string()
        } else {
            format!("{} {}", value, unit)
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(D::Error::custom(format!(
            "expected string or number, found {}",
            other
        ))),
    }
}
