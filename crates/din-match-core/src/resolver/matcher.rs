//! Brand and generic resolution against a registry snapshot.
//!
//! Brand path:
//! 1. Exact stage: name equal, or name followed by a space/hyphen (e.g. "Tylenol ER")
//! 2. Fuzzy stage: dosage-form suffix stripped on both sides, stripped names
//!    equal, optionally filtered by ingredient tokens
//! 3. Several candidates: strength fingerprints pick one, else the first
//!
//! Generic path: every ingredient token covered (vacuously true for an
//! empty list) and strength fingerprints agree; first hit in registry order.

use tracing::debug;

use crate::models::{DrugKind, Registry, RegistryEntry, TargetRecord};

use super::normalizer::{
    ingredient_tokens, normalize_strength, search_key, strip_dosage_suffix, tokens_covered,
};

/// A marketed entry with its comparison keys computed once per snapshot.
struct PreparedEntry<'a> {
    entry: &'a RegistryEntry,
    name_key: String,
    stripped_name_key: String,
    ingredient_keys: Vec<String>,
    /// Per-ingredient strength fingerprints, in ingredient order
    fingerprints: Vec<String>,
}

impl<'a> PreparedEntry<'a> {
    fn new(entry: &'a RegistryEntry) -> Self {
        let name_key = search_key(&entry.canonical_name);
        Self {
            entry,
            stripped_name_key: strip_dosage_suffix(&name_key),
            name_key,
            ingredient_keys: entry.ingredients.iter().map(|i| search_key(&i.name)).collect(),
            fingerprints: entry
                .ingredients
                .iter()
                .map(|i| normalize_strength(&i.strength_raw))
                .collect(),
        }
    }

    /// Sorted fingerprints joined without a separator.
    fn joined_fingerprint(&self) -> String {
        let mut sorted = self.fingerprints.clone();
        sorted.sort();
        sorted.concat()
    }

    /// Strength acceptance used to break ties between brand candidates.
    fn brand_strength_accepts(&self, target: &str) -> bool {
        self.joined_fingerprint() == target
            || (self.fingerprints.len() > 1
                && self.fingerprints.iter().all(|fp| target.contains(fp.as_str())))
            || self.fingerprints.iter().any(|fp| fp == target)
    }

    /// Strength condition of the generic path.
    fn generic_strength_accepts(&self, target: &str) -> bool {
        match self.fingerprints.as_slice() {
            [] => false,
            [single] => single == target,
            many => many.iter().all(|fp| target.contains(fp.as_str())),
        }
    }
}

/// Exact-stage name test: equal, or followed by a space or hyphen.
fn name_matches(candidate: &str, query: &str) -> bool {
    match candidate.strip_prefix(query) {
        Some("") => true,
        Some(rest) => rest.starts_with(' ') || rest.starts_with('-'),
        None => false,
    }
}

/// Resolves target records against one immutable registry snapshot.
pub struct MatchEngine<'a> {
    eligible: Vec<PreparedEntry<'a>>,
}

impl<'a> MatchEngine<'a> {
    /// Prepare the marketed entries of `registry` for matching.
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            eligible: registry.marketed().map(PreparedEntry::new).collect(),
        }
    }

    /// Number of entries eligible for matching.
    pub fn eligible_count(&self) -> usize {
        self.eligible.len()
    }

    /// Resolve a record to a registry id.
    pub fn resolve(&self, record: &TargetRecord) -> Option<&'a str> {
        let resolved = match record.kind {
            DrugKind::Brand => self.resolve_brand(record),
            DrugKind::Generic => self.resolve_generic(record),
        };
        debug!(
            kind = ?record.kind,
            name = %record.name,
            ingredients = %record.ingredients_text,
            strength = %record.strength_text,
            resolved = resolved.map(|e| e.id.as_str()).unwrap_or("-"),
            "resolved target record"
        );
        resolved.map(|e| e.id.as_str())
    }

    fn resolve_brand(&self, record: &TargetRecord) -> Option<&'a RegistryEntry> {
        if self.eligible.is_empty() {
            return None;
        }

        let brand = search_key(&record.name);
        if brand.is_empty() {
            return None;
        }
        let tokens = ingredient_tokens(&record.ingredients_text);

        let mut candidates: Vec<&PreparedEntry<'a>> = self
            .eligible
            .iter()
            .filter(|p| name_matches(&p.name_key, &brand))
            .collect();

        if candidates.is_empty() {
            let stripped = strip_dosage_suffix(&brand);
            if stripped != brand {
                candidates = self
                    .eligible
                    .iter()
                    .filter(|p| p.stripped_name_key == stripped)
                    .filter(|p| tokens.is_empty() || tokens_covered(&tokens, &p.ingredient_keys))
                    .collect();
            }
        }

        match candidates.as_slice() {
            [] => None,
            [only] => Some(only.entry),
            [first, ..] => {
                let target = normalize_strength(&record.strength_text);
                let chosen = candidates
                    .iter()
                    .find(|p| p.brand_strength_accepts(&target))
                    .unwrap_or(first);
                Some(chosen.entry)
            }
        }
    }

    fn resolve_generic(&self, record: &TargetRecord) -> Option<&'a RegistryEntry> {
        // An empty token list covers every entry; strength alone decides
        let tokens = ingredient_tokens(&record.ingredients_text);
        let target = normalize_strength(&record.strength_text);

        self.eligible
            .iter()
            .find(|p| {
                tokens_covered(&tokens, &p.ingredient_keys) && p.generic_strength_accepts(&target)
            })
            .map(|p| p.entry)
    }
}

/// Resolve one record against `registry`.
///
/// Builds a [`MatchEngine`] per call; prefer reusing an engine for batches.
pub fn resolve<'a>(record: &TargetRecord, registry: &'a Registry) -> Option<&'a str> {
    MatchEngine::new(registry).resolve(record)
}
