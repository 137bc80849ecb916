//! Target records: the rows to resolve against the registry.

use serde::{Deserialize, Serialize};

/// Which resolution path a row takes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DrugKind {
    /// Matched by product name, disambiguated by strength
    Brand,
    /// Matched by ingredient list and strength
    Generic,
}

impl DrugKind {
    /// Parse the type column ("Brand", "generic", ...). Unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        match lower.as_str() {
            "brand" | "b" => Some(DrugKind::Brand),
            "generic" | "g" => Some(DrugKind::Generic),
            _ => None,
        }
    }
}

/// One row to resolve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetRecord {
    pub kind: DrugKind,
    /// Product name as entered (may carry ® or a parenthesized note)
    pub name: String,
    /// Free-text strength (e.g., "5mg/160mg")
    pub strength_text: String,
    /// Semicolon-delimited ingredient list
    pub ingredients_text: String,
    /// Dosage form as entered; carried through, not used for matching
    pub dosage_form: String,
    pub country_code: String,
    /// Identifier already present on the row
    pub identifier: Option<String>,
}

impl TargetRecord {
    /// Create a record with only the fields the match engine reads.
    pub fn new(kind: DrugKind, name: &str, strength_text: &str, ingredients_text: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            strength_text: strength_text.to_string(),
            ingredients_text: ingredients_text.to_string(),
            dosage_form: String::new(),
            country_code: String::new(),
            identifier: None,
        }
    }
}
