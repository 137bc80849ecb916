//! Registry models: the assembled, read-only match target.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Market status of a registry entry. Only `Marketed` entries are matchable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum MarketStatus {
    Marketed,
    Other,
    #[default]
    Unknown,
}

impl MarketStatus {
    /// Map a raw status string from the status feed.
    pub fn from_feed(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            MarketStatus::Unknown
        } else if trimmed.eq_ignore_ascii_case("marketed") {
            MarketStatus::Marketed
        } else {
            MarketStatus::Other
        }
    }
}

/// One active ingredient of a registry entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingredient {
    /// Ingredient name as published (e.g., "IBUPROFEN")
    pub name: String,
    /// Free-text strength as published (e.g., "200 MG")
    pub strength_raw: String,
}

/// A single canonical drug record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryEntry {
    /// Canonical identifier returned by resolution (the DIN)
    pub id: String,
    /// Source join key shared by the three feeds
    pub drug_code: String,
    /// Brand / canonical product name
    pub canonical_name: String,
    pub market_status: MarketStatus,
    /// Ingredients in feed order; empty when the ingredient feed had no row for this code
    pub ingredients: Vec<Ingredient>,
}

impl RegistryEntry {
    /// Create an entry with unknown status and no ingredients.
    pub fn new(id: String, drug_code: String, canonical_name: String) -> Self {
        Self {
            id,
            drug_code,
            canonical_name,
            market_status: MarketStatus::Unknown,
            ingredients: Vec::new(),
        }
    }

    pub fn is_marketed(&self) -> bool {
        self.market_status == MarketStatus::Marketed
    }
}

/// Insertion-ordered mapping from id to entry.
///
/// Iteration follows insertion order (product feed order), which makes
/// "first match" deterministic for a given snapshot. Serialized as a plain
/// list of entries; the id index is rebuilt on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<RegistryEntry>", into = "Vec<RegistryEntry>")]
pub struct Registry {
    entries: Vec<RegistryEntry>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. Returns `false` (and keeps the existing entry) when the id is taken.
    pub fn insert(&mut self, entry: RegistryEntry) -> bool {
        if self.index.contains_key(&entry.id) {
            return false;
        }
        self.index.insert(entry.id.clone(), self.entries.len());
        self.entries.push(entry);
        true
    }

    pub fn get(&self, id: &str) -> Option<&RegistryEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    /// Entries eligible for matching, in insertion order.
    pub fn marketed(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter().filter(|e| e.is_marketed())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<RegistryEntry>> for Registry {
    fn from(entries: Vec<RegistryEntry>) -> Self {
        let mut registry = Registry::new();
        for entry in entries {
            registry.insert(entry);
        }
        registry
    }
}

impl From<Registry> for Vec<RegistryEntry> {
    fn from(registry: Registry) -> Self {
        registry.entries
    }
}
