//! In-process stores, used by tests and by hosts without durable storage.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{expiry_after, KvStore, PropertyStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl MemoryEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Mutex-guarded in-memory key-value and property store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    properties: Mutex<HashMap<String, String>>,
    entry_limit: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes of values larger than `limit` bytes, like a hosted cache would.
    pub fn with_entry_limit(limit: usize) -> Self {
        Self {
            entry_limit: Some(limit),
            ..Self::default()
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> StoreResult<MutexGuard<'_, HashMap<String, MemoryEntry>>> {
        self.entries
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn properties(&self) -> StoreResult<MutexGuard<'_, HashMap<String, String>>> {
        self.properties
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.entries()?;
        let now = Utc::now();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn put_many(&self, new_entries: &[(String, String)], ttl: Duration) -> StoreResult<()> {
        if let Some(limit) = self.entry_limit {
            if let Some((key, value)) = new_entries.iter().find(|(_, v)| v.len() > limit) {
                return Err(StoreError::EntryTooLarge {
                    key: key.clone(),
                    size: value.len(),
                    limit,
                });
            }
        }

        let expires_at = expiry_after(ttl);
        let mut entries = self.entries()?;
        for (key, value) in new_entries {
            entries.insert(
                key.clone(),
                MemoryEntry {
                    value: value.clone(),
                    expires_at,
                },
            );
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[String]) -> StoreResult<()> {
        let mut entries = self.entries()?;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    fn remove_prefix(&self, prefix: &str) -> StoreResult<usize> {
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }
}

impl PropertyStore for MemoryStore {
    fn get_property(&self, name: &str) -> StoreResult<Option<String>> {
        Ok(self.properties()?.get(name).cloned())
    }

    fn set_property(&self, name: &str, value: &str) -> StoreResult<()> {
        self.properties()?.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn delete_property(&self, name: &str) -> StoreResult<()> {
        self.properties()?.remove(name);
        Ok(())
    }
}
