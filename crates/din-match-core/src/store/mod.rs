//! Storage seams: the size-bounded key-value store behind the chunked cache
//! and the named-property store that holds the enrichment cursor.

mod memory;

pub use memory::*;

use std::time::Duration;

use thiserror::Error;

/// Storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entry {key} is {size} bytes, limit is {limit}")]
    EntryTooLarge {
        key: String,
        size: usize,
        limit: usize,
    },

    #[error("Lock poisoned: {0}")]
    Poisoned(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value store with per-entry expiry and a per-entry size ceiling.
pub trait KvStore {
    /// Read a live (unexpired) entry.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write all entries with the same time-to-live. Implementations either
    /// write every entry or none.
    fn put_many(&self, entries: &[(String, String)], ttl: Duration) -> StoreResult<()>;

    fn remove_many(&self, keys: &[String]) -> StoreResult<()>;

    /// Remove every entry whose key starts with `prefix`. Returns the number removed.
    fn remove_prefix(&self, prefix: &str) -> StoreResult<usize>;
}

/// Store for single named string values.
pub trait PropertyStore {
    fn get_property(&self, name: &str) -> StoreResult<Option<String>>;
    fn set_property(&self, name: &str, value: &str) -> StoreResult<()>;
    fn delete_property(&self, name: &str) -> StoreResult<()>;
}

/// Absolute expiry for an entry written now with `ttl`. `None` means the
/// ttl is too large to represent and the entry never expires.
pub(crate) fn expiry_after(ttl: Duration) -> Option<chrono::DateTime<chrono::Utc>> {
    let ttl = chrono::Duration::from_std(ttl).ok()?;
    chrono::Utc::now().checked_add_signed(ttl)
}
