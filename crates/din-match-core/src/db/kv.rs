//! Key-value and property operations.

use std::time::Duration;

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::store::{expiry_after, KvStore, PropertyStore, StoreError, StoreResult};

impl Database {
    /// Delete expired key-value rows. Returns the number removed.
    pub fn purge_expired(&self) -> StoreResult<usize> {
        let now = chrono::Utc::now().timestamp_millis();
        let removed = self.conn.execute(
            "DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= ?",
            [now],
        )?;
        Ok(removed)
    }
}

impl KvStore for Database {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let row: Option<(String, Option<i64>)> = self
            .conn
            .query_row(
                "SELECT value, expires_at FROM kv_entries WHERE key = ?",
                [key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let now = chrono::Utc::now().timestamp_millis();
        match row {
            Some((_, Some(expires_at))) if expires_at <= now => {
                self.conn
                    .execute("DELETE FROM kv_entries WHERE key = ?", [key])?;
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value)),
            None => Ok(None),
        }
    }

    fn put_many(&self, entries: &[(String, String)], ttl: Duration) -> StoreResult<()> {
        if let Some(limit) = self.entry_limit {
            if let Some((key, value)) = entries.iter().find(|(_, v)| v.len() > limit) {
                return Err(StoreError::EntryTooLarge {
                    key: key.clone(),
                    size: value.len(),
                    limit,
                });
            }
        }

        let expires_at = expiry_after(ttl).map(|at| at.timestamp_millis());

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO kv_entries (key, value, expires_at, updated_at)
                VALUES (?1, ?2, ?3, datetime('now'))
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    expires_at = excluded.expires_at,
                    updated_at = datetime('now')
                "#,
            )?;
            for (key, value) in entries {
                stmt.execute(params![key, value, expires_at])?;
            }
        }
        tx.commit()?;

        self.purge_expired()?;
        Ok(())
    }

    fn remove_many(&self, keys: &[String]) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM kv_entries WHERE key = ?")?;
            for key in keys {
                stmt.execute([key])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn remove_prefix(&self, prefix: &str) -> StoreResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM kv_entries WHERE substr(key, 1, length(?1)) = ?1",
            [prefix],
        )?;
        Ok(removed)
    }
}

impl PropertyStore for Database {
    fn get_property(&self, name: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM properties WHERE name = ?", [name], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set_property(&self, name: &str, value: &str) -> StoreResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO properties (name, value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(name) DO UPDATE SET
                value = excluded.value,
                updated_at = datetime('now')
            "#,
            params![name, value],
        )?;
        Ok(())
    }

    fn delete_property(&self, name: &str) -> StoreResult<()> {
        self.conn
            .execute("DELETE FROM properties WHERE name = ?", [name])?;
        Ok(())
    }
}
