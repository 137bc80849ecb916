//! SQLite-backed durable stores.

mod kv;
mod schema;

pub use schema::*;

use rusqlite::Connection;
use std::path::Path;

use crate::store::StoreResult;

/// Database connection wrapper implementing [`KvStore`](crate::store::KvStore)
/// and [`PropertyStore`](crate::store::PropertyStore).
pub struct Database {
    conn: Connection,
    entry_limit: Option<usize>,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn,
            entry_limit: None,
        };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            entry_limit: None,
        };
        db.initialize()?;
        Ok(db)
    }

    /// Reject key-value writes larger than `limit` bytes.
    pub fn with_entry_limit(mut self, limit: usize) -> Self {
        self.entry_limit = Some(limit);
        self
    }

    /// Initialize schema.
    fn initialize(&self) -> StoreResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}
