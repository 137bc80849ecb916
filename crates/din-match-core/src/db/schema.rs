//! SQLite schema definition.

/// Schema for the durable key-value and property stores.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Key-value entries (chunked cache backing store)
-- ============================================================================

CREATE TABLE IF NOT EXISTS kv_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at INTEGER,                          -- unix millis, NULL = never
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_kv_entries_expires_at ON kv_entries(expires_at);

-- ============================================================================
-- Named properties (enrichment cursor)
-- ============================================================================

CREATE TABLE IF NOT EXISTS properties (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
