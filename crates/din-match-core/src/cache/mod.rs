//! Chunked, TTL-bounded cache for payloads larger than one store entry.
//!
//! A blob named `name` occupies these keys, all written in one batch with
//! the same expiry:
//!
//! ```text
//! {name}:fragment:0 .. {name}:fragment:{n-1}   payload slices
//! {name}:digest                                 sha256 of the full payload
//! {name}:count                                  n
//! {name}:timestamp                              creation time, unix millis
//! ```
//!
//! A read succeeds only if every fragment is present and the reassembled
//! payload matches the digest. Anything less is a miss.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::store::{KvStore, StoreError};

/// Cache write errors. Reads never fail; see [`CacheLookup`].
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Why a load produced nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheMiss {
    NotFound,
    Expired,
    MissingFragment(usize),
    /// Metadata or payload could not be read back
    Corrupt(String),
}

/// Result of a cache load: the payload, or why there is none.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss(CacheMiss),
}

impl<T> CacheLookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            CacheLookup::Hit(value) => Some(value),
            CacheLookup::Miss(_) => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }
}

/// Smallest fragment ceiling; one UTF-8 scalar is at most four bytes.
const MIN_FRAGMENT_BYTES: usize = 4;

/// Cache over a size-bounded [`KvStore`].
pub struct ChunkedCache<'a> {
    store: &'a dyn KvStore,
    fragment_bytes: usize,
}

impl<'a> ChunkedCache<'a> {
    /// Create a cache whose fragments stay under `fragment_ratio` of the
    /// store's hard per-entry limit.
    pub fn new(store: &'a dyn KvStore, max_entry_bytes: usize, fragment_ratio: f64) -> Self {
        let ceiling = (max_entry_bytes as f64 * fragment_ratio).floor() as usize;
        Self {
            store,
            fragment_bytes: ceiling.max(MIN_FRAGMENT_BYTES),
        }
    }

    pub fn fragment_bytes(&self) -> usize {
        self.fragment_bytes
    }

    /// Serialize and store `payload` under `name`. Returns the fragment count.
    pub fn store<T: Serialize + ?Sized>(
        &self,
        name: &str,
        payload: &T,
        ttl: Duration,
    ) -> CacheResult<usize> {
        let serialized = serde_json::to_string(payload).map_err(|e| {
            warn!(cache = name, error = %e, "cache serialization failed");
            CacheError::from(e)
        })?;

        let fragments = split_fragments(&serialized, self.fragment_bytes);
        let count = fragments.len();
        let previous_count = self.read_count(name);

        let mut entries: Vec<(String, String)> = fragments
            .into_iter()
            .enumerate()
            .map(|(i, fragment)| (fragment_key(name, i), fragment.to_string()))
            .collect();
        entries.push((digest_key(name), payload_digest(&serialized)));
        entries.push((count_key(name), count.to_string()));
        entries.push((
            timestamp_key(name),
            chrono::Utc::now().timestamp_millis().to_string(),
        ));

        self.store.put_many(&entries, ttl).map_err(|e| {
            warn!(cache = name, error = %e, "cache write failed");
            CacheError::from(e)
        })?;

        // Fragments beyond the new count belong to an older generation
        if let Some(previous) = previous_count.filter(|&p| p > count) {
            let stale: Vec<String> = (count..previous).map(|i| fragment_key(name, i)).collect();
            if let Err(e) = self.store.remove_many(&stale) {
                warn!(cache = name, error = %e, "failed to remove stale fragments");
            }
        }

        info!(
            cache = name,
            bytes = serialized.len(),
            fragments = count,
            "stored cache blob"
        );
        Ok(count)
    }

    /// Load `name` if it is complete and no older than `max_age`.
    pub fn load<T: DeserializeOwned>(&self, name: &str, max_age: Duration) -> CacheLookup<T> {
        let lookup = self.load_inner(name, max_age);
        if let CacheLookup::Miss(reason) = &lookup {
            debug!(cache = name, ?reason, "cache miss");
        }
        lookup
    }

    fn load_inner<T: DeserializeOwned>(&self, name: &str, max_age: Duration) -> CacheLookup<T> {
        let timestamp = match self.read(&timestamp_key(name)) {
            Some(raw) => match raw.parse::<i64>() {
                Ok(ts) => ts,
                Err(_) => return CacheLookup::Miss(CacheMiss::Corrupt("timestamp".into())),
            },
            None => return CacheLookup::Miss(CacheMiss::NotFound),
        };

        let age_ms = chrono::Utc::now().timestamp_millis() - timestamp;
        if age_ms > 0 && age_ms as u128 > max_age.as_millis() {
            return CacheLookup::Miss(CacheMiss::Expired);
        }

        let count = match self.read(&count_key(name)).map(|raw| raw.parse::<usize>()) {
            Some(Ok(count)) => count,
            _ => return CacheLookup::Miss(CacheMiss::Corrupt("fragment count".into())),
        };

        let mut payload = String::new();
        for i in 0..count {
            match self.read(&fragment_key(name, i)) {
                Some(fragment) => payload.push_str(&fragment),
                None => return CacheLookup::Miss(CacheMiss::MissingFragment(i)),
            }
        }

        match self.read(&digest_key(name)) {
            Some(digest) if digest == payload_digest(&payload) => {}
            _ => {
                warn!(cache = name, "cache digest mismatch");
                return CacheLookup::Miss(CacheMiss::Corrupt("digest".into()));
            }
        }

        match serde_json::from_str(&payload) {
            Ok(value) => CacheLookup::Hit(value),
            Err(e) => {
                warn!(cache = name, error = %e, "cached payload did not deserialize");
                CacheLookup::Miss(CacheMiss::Corrupt(e.to_string()))
            }
        }
    }

    /// Remove every key belonging to `name`. Returns the number of keys removed.
    pub fn clear(&self, name: &str) -> CacheResult<usize> {
        let removed = self.store.remove_prefix(&format!("{}:", name))?;
        info!(cache = name, removed, "cleared cache blob");
        Ok(removed)
    }

    fn read_count(&self, name: &str) -> Option<usize> {
        self.read(&count_key(name))?.parse().ok()
    }

    /// Store read errors count as absent entries.
    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "cache read failed");
                None
            }
        }
    }
}

pub fn fragment_key(name: &str, index: usize) -> String {
    format!("{}:fragment:{}", name, index)
}

fn count_key(name: &str) -> String {
    format!("{}:count", name)
}

fn timestamp_key(name: &str) -> String {
    format!("{}:timestamp", name)
}

fn digest_key(name: &str) -> String {
    format!("{}:digest", name)
}

fn payload_digest(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}

/// Split `s` into slices of at most `max_bytes`, never inside a UTF-8 scalar.
/// An empty string yields one empty fragment.
fn split_fragments(s: &str, max_bytes: usize) -> Vec<&str> {
    if s.is_empty() {
        return vec![s];
    }

    let mut fragments = Vec::new();
    let mut start = 0;
    while start < s.len() {
        let mut end = (start + max_bytes).min(s.len());
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        fragments.push(&s[start..end]);
        start = end;
    }
    fragments
}
