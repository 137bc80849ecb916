//! Registry assembly: fetch three feeds, join on drug code, cache the result.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::{CacheLookup, ChunkedCache};
use crate::models::{
    Ingredient, IngredientRecord, MarketStatus, ProductRecord, Registry, RegistryEntry,
    StatusRecord,
};

/// Cache name of the assembled registry.
pub const REGISTRY_CACHE_NAME: &str = "registry";

/// The three upstream collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Products,
    Statuses,
    ActiveIngredients,
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feed::Products => "products",
            Feed::Statuses => "statuses",
            Feed::ActiveIngredients => "active ingredients",
        };
        f.write_str(name)
    }
}

/// Registry errors. Any of these aborts assembly; there is no partial registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Registry feed {feed} unavailable: {reason}")]
    Unavailable { feed: Feed, reason: String },

    #[error("Registry feed {feed} returned a malformed body: {source}")]
    Malformed {
        feed: Feed,
        #[source]
        source: serde_json::Error,
    },
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Full-dump access to the three registry feeds.
pub trait RegistrySource {
    fn products(&self) -> RegistryResult<Vec<ProductRecord>>;
    fn statuses(&self) -> RegistryResult<Vec<StatusRecord>>;
    fn active_ingredients(&self) -> RegistryResult<Vec<IngredientRecord>>;
}

/// Parse a feed body (a JSON array of records).
pub fn parse_feed<T: DeserializeOwned>(feed: Feed, body: &str) -> RegistryResult<Vec<T>> {
    serde_json::from_str(body).map_err(|source| RegistryError::Malformed { feed, source })
}

/// Join the three feeds into a registry.
///
/// One entry per product (keyed by DIN, first product wins on duplicates),
/// status overlaid by drug code (later rows overwrite earlier ones; codes
/// without a status stay `Unknown`), ingredients appended by drug code in
/// feed order.
pub fn assemble(
    products: Vec<ProductRecord>,
    statuses: Vec<StatusRecord>,
    ingredients: Vec<IngredientRecord>,
) -> Registry {
    let mut entries: Vec<RegistryEntry> = Vec::with_capacity(products.len());
    let mut by_code: HashMap<String, usize> = HashMap::with_capacity(products.len());
    let mut seen_ids: HashSet<String> = HashSet::with_capacity(products.len());

    for product in products {
        let id = product.drug_identification_number.trim().to_string();
        if !seen_ids.insert(id.clone()) {
            warn!(din = %id, drug_code = %product.drug_code, "duplicate DIN in product feed");
            continue;
        }
        by_code.entry(product.drug_code.clone()).or_insert(entries.len());
        entries.push(RegistryEntry::new(id, product.drug_code, product.brand_name));
    }

    for status in statuses {
        if let Some(&i) = by_code.get(&status.drug_code) {
            entries[i].market_status = MarketStatus::from_feed(&status.status);
        }
    }

    for ingredient in ingredients {
        if let Some(&i) = by_code.get(&ingredient.drug_code) {
            let strength_raw = ingredient.strength_raw();
            entries[i].ingredients.push(Ingredient {
                name: ingredient.ingredient_name,
                strength_raw,
            });
        }
    }

    entries.into()
}

/// Loads the registry from cache, or assembles and caches it.
pub struct RegistryAssembler<'a> {
    source: &'a dyn RegistrySource,
    cache: &'a ChunkedCache<'a>,
    ttl: Duration,
}

impl<'a> RegistryAssembler<'a> {
    pub fn new(source: &'a dyn RegistrySource, cache: &'a ChunkedCache<'a>, ttl: Duration) -> Self {
        Self { source, cache, ttl }
    }

    /// Return a fresh registry. Feed failures propagate; cache failures do not.
    pub fn load(&self) -> RegistryResult<Registry> {
        if let CacheLookup::Hit(registry) = self.cache.load::<Registry>(REGISTRY_CACHE_NAME, self.ttl) {
            info!(entries = registry.len(), "registry loaded from cache");
            return Ok(registry);
        }

        let products = self.source.products()?;
        let statuses = self.source.statuses()?;
        let ingredients = self.source.active_ingredients()?;
        info!(
            products = products.len(),
            statuses = statuses.len(),
            ingredients = ingredients.len(),
            "fetched registry feeds"
        );

        let registry = assemble(products, statuses, ingredients);
        info!(
            entries = registry.len(),
            marketed = registry.marketed().count(),
            "assembled registry"
        );

        if let Err(e) = self.cache.store(REGISTRY_CACHE_NAME, &registry, self.ttl) {
            warn!(error = %e, "registry not cached, continuing without cache");
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KvStore, MemoryStore};
    use std::cell::Cell;

    const TTL: Duration = Duration::from_secs(6 * 3600);

    fn product(code: &str, din: &str, name: &str) -> ProductRecord {
        ProductRecord {
            drug_code: code.into(),
            drug_identification_number: din.into(),
            brand_name: name.into(),
        }
    }

    fn status(code: &str, status: &str) -> StatusRecord {
        StatusRecord {
            drug_code: code.into(),
            status: status.into(),
        }
    }

    fn ingredient(code: &str, name: &str, strength: &str, unit: &str) -> IngredientRecord {
        IngredientRecord {
            drug_code: code.into(),
            ingredient_name: name.into(),
            strength: strength.into(),
            strength_unit: unit.into(),
        }
    }

    struct FixedSource {
        calls: Cell<usize>,
        fail_statuses: bool,
    }

    impl FixedSource {
        fn new() -> Self {
            Self {
                calls: Cell::new(0),
                fail_statuses: false,
            }
        }
    }

    impl RegistrySource for FixedSource {
        fn products(&self) -> RegistryResult<Vec<ProductRecord>> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![product("1", "00000001", "ADVIL"), product("2", "00000002", "MOTRIN")])
        }

        fn statuses(&self) -> RegistryResult<Vec<StatusRecord>> {
            if self.fail_statuses {
                return Err(RegistryError::Unavailable {
                    feed: Feed::Statuses,
                    reason: "HTTP 503".into(),
                });
            }
            Ok(vec![status("1", "MARKETED")])
        }

        fn active_ingredients(&self) -> RegistryResult<Vec<IngredientRecord>> {
            Ok(vec![ingredient("1", "IBUPROFEN", "200", "MG")])
        }
    }

    #[test]
    fn test_assemble_join() {
        let registry = assemble(
            vec![
                product("1", "00000001", "ADVIL"),
                product("2", "00000002", "MOTRIN"),
                product("3", "00000003", "EXFORGE"),
            ],
            vec![status("1", "MARKETED"), status("3", "DORMANT"), status("9", "MARKETED")],
            vec![
                ingredient("3", "AMLODIPINE", "5", "MG"),
                ingredient("1", "IBUPROFEN", "200", "MG"),
                ingredient("3", "VALSARTAN", "160", "MG"),
            ],
        );

        assert_eq!(registry.len(), 3);

        let advil = registry.get("00000001").unwrap();
        assert_eq!(advil.market_status, MarketStatus::Marketed);
        assert_eq!(advil.ingredients.len(), 1);
        assert_eq!(advil.ingredients[0].strength_raw, "200 MG");

        // Product-only code
        let motrin = registry.get("00000002").unwrap();
        assert_eq!(motrin.market_status, MarketStatus::Unknown);
        assert!(motrin.ingredients.is_empty());

        let exforge = registry.get("00000003").unwrap();
        assert_eq!(exforge.market_status, MarketStatus::Other);
        let names: Vec<_> = exforge.ingredients.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["AMLODIPINE", "VALSARTAN"]);

        // Product feed order is preserved
        let ids: Vec<_> = registry.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["00000001", "00000002", "00000003"]);
    }

    #[test]
    fn test_assemble_duplicate_din_keeps_first() {
        let registry = assemble(
            vec![product("1", "00000001", "FIRST"), product("2", "00000001", "SECOND")],
            vec![],
            vec![],
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("00000001").unwrap().canonical_name, "FIRST");
    }

    #[test]
    fn test_parse_feed_malformed() {
        let result = parse_feed::<StatusRecord>(Feed::Statuses, "<html>busy</html>");
        assert!(matches!(
            result,
            Err(RegistryError::Malformed { feed: Feed::Statuses, .. })
        ));

        let ok = parse_feed::<StatusRecord>(Feed::Statuses, r#"[{"drug_code": 1, "status": "MARKETED"}]"#).unwrap();
        assert_eq!(ok.len(), 1);
    }

    #[test]
    fn test_load_caches_registry() {
        let store = MemoryStore::new();
        let cache = ChunkedCache::new(&store, 200, 0.9);
        let source = FixedSource::new();
        let assembler = RegistryAssembler::new(&source, &cache, TTL);

        let first = assembler.load().unwrap();
        let second = assembler.load().unwrap();

        assert_eq!(first, second);
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_load_refetches_after_fragment_loss() {
        let store = MemoryStore::new();
        let cache = ChunkedCache::new(&store, 100, 0.9);
        let source = FixedSource::new();
        let assembler = RegistryAssembler::new(&source, &cache, TTL);

        assembler.load().unwrap();
        store
            .remove_many(&[crate::cache::fragment_key(REGISTRY_CACHE_NAME, 0)])
            .unwrap();
        assembler.load().unwrap();

        assert_eq!(source.calls.get(), 2);
    }

    #[test]
    fn test_load_survives_cache_write_failure() {
        let store = MemoryStore::with_entry_limit(8);
        let cache = ChunkedCache::new(&store, 100, 0.9);
        let source = FixedSource::new();
        let assembler = RegistryAssembler::new(&source, &cache, TTL);

        let registry = assembler.load().unwrap();
        assert_eq!(registry.len(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_propagates_feed_failure() {
        let store = MemoryStore::new();
        let cache = ChunkedCache::new(&store, 100, 0.9);
        let source = FixedSource {
            calls: Cell::new(0),
            fail_statuses: true,
        };
        let assembler = RegistryAssembler::new(&source, &cache, TTL);

        assert!(matches!(
            assembler.load(),
            Err(RegistryError::Unavailable { feed: Feed::Statuses, .. })
        ));
        assert!(store.is_empty());
    }
}
