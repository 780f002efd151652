//! Cache schema and migrations
//!
//! Versions are tracked with `PRAGMA user_version`; each entry of
//! [`MIGRATIONS`] moves the schema one version forward.

use rusqlite::Connection;

use crate::error::Result;

/// Ordered migrations; index + 1 is the version reached
const MIGRATIONS: &[&str] = &[
    // Version 1: entry table
    r"
    CREATE TABLE IF NOT EXISTS cache_entries (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        batch_id     TEXT NOT NULL UNIQUE,
        device_id    TEXT NOT NULL,
        result_count INTEGER NOT NULL,
        payload      BLOB NOT NULL,
        sealed_at    INTEGER NOT NULL,
        created_at   INTEGER NOT NULL,
        retry_count  INTEGER NOT NULL DEFAULT 0,
        status       TEXT NOT NULL DEFAULT 'pending',
        last_error   TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_cache_entries_created_at ON cache_entries (created_at);
    ",
    // Version 2: sealed_at from unix ms to unix ns
    r"
    UPDATE cache_entries SET sealed_at = sealed_at * 1000000;
    ",
];

pub const SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

/// Bring the database to [`SCHEMA_VERSION`]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = schema_version(conn)?;

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running cache migration");
            conn.execute_batch(migration)?;
            conn.pragma_update(None, "user_version", version)?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::debug!(from = current_version, to = SCHEMA_VERSION, "Cache schema migrated");
    }
    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?)
}
