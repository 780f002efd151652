//! SQLite-backed cache of undelivered reports.
//!
//! Uses a single `Mutex<Connection>`; every operation holds the lock for its
//! whole duration, so the drain path and the failure-path writer never
//! interleave inside one operation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use contracts::{CacheConfig, SealedReport};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, error, info, warn};

use crate::error::{CacheError, Result};
use crate::schema;

/// Lifecycle of a cached entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Written after inline retries were exhausted, not yet resent
    Pending,
    /// At least one drain resend failed
    Retrying,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Retrying => "retrying",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "retrying" => Some(Self::Retrying),
            _ => None,
        }
    }
}

/// One persisted report
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Auto-increment key; insertion order
    pub id: i64,
    pub batch_id: String,
    pub device_id: String,
    pub result_count: usize,
    /// Sealed body, byte-for-byte as first attempted
    pub payload: Bytes,
    /// When the batch was sealed
    pub sealed_at: DateTime<Utc>,
    /// When the entry was written to the cache
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub status: EntryStatus,
    pub last_error: Option<String>,
}

impl CacheEntry {
    /// Rebuild the sealed report for a resend
    pub fn to_report(&self) -> SealedReport {
        SealedReport::from_parts(
            &self.batch_id,
            &self.device_id,
            self.sealed_at,
            self.result_count,
            self.payload.clone(),
        )
    }
}

/// Result of an `add`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddOutcome {
    /// `false` when an entry with the same batch id already existed
    pub inserted: bool,
    /// Oldest entries removed to stay within `max_entries`
    pub evicted: usize,
}

/// Snapshot of the cache contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: u64,
    pub retrying: u64,
    /// Age of the oldest entry, `None` when empty
    pub oldest_age: Option<Duration>,
}

struct RawRow {
    id: i64,
    batch_id: String,
    device_id: String,
    result_count: i64,
    payload: Vec<u8>,
    sealed_at: i64,
    created_at: i64,
    retry_count: i64,
    status: String,
    last_error: Option<String>,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            batch_id: row.get(1)?,
            device_id: row.get(2)?,
            result_count: row.get(3)?,
            payload: row.get(4)?,
            sealed_at: row.get(5)?,
            created_at: row.get(6)?,
            retry_count: row.get(7)?,
            status: row.get(8)?,
            last_error: row.get(9)?,
        })
    }

    fn into_entry(self) -> Result<CacheEntry> {
        let id = self.id;
        let corrupt = |message: &str| CacheError::Corrupt {
            id,
            message: message.to_string(),
        };
        Ok(CacheEntry {
            id,
            batch_id: self.batch_id,
            device_id: self.device_id,
            result_count: usize::try_from(self.result_count)
                .map_err(|_| corrupt("negative result_count"))?,
            payload: Bytes::from(self.payload),
            sealed_at: DateTime::<Utc>::from_timestamp_nanos(self.sealed_at),
            created_at: from_millis(self.created_at).ok_or_else(|| corrupt("bad created_at"))?,
            retry_count: u32::try_from(self.retry_count)
                .map_err(|_| corrupt("bad retry_count"))?,
            status: EntryStatus::parse(&self.status).ok_or_else(|| corrupt("unknown status"))?,
            last_error: self.last_error,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, batch_id, device_id, result_count, payload, sealed_at, \
     created_at, retry_count, status, last_error FROM cache_entries";

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
}

/// Bounded, durable FIFO of undelivered reports
///
/// Create with [`CacheStore::open`] for a file-backed store or
/// [`CacheStore::in_memory`] when nothing should survive the process.
pub struct CacheStore {
    conn: Mutex<Connection>,
    max_entries: usize,
    max_age: Duration,
    location: String,
}

impl CacheStore {
    /// Open or create a store at `path`.
    ///
    /// # Errors
    /// [`CacheError::Io`] if the directory can't be created,
    /// [`CacheError::Sqlite`] if the database can't be opened or migrated.
    pub fn open(path: &Path, max_entries: usize, max_age: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, max_entries, max_age, path.display().to_string())
    }

    /// In-memory store with the same bound; lost on exit
    pub fn in_memory(max_entries: usize, max_age: Duration) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, max_entries, max_age, ":memory:".to_string())
    }

    /// Store described by the cache config.
    ///
    /// A disabled cache, or a file that cannot be opened, falls back to an
    /// in-memory store so the reporter keeps a bounded best-effort buffer.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let max_entries = config.max_entries;
        let max_age = config.max_age();
        if !config.enabled {
            warn!("Cache disabled, undelivered reports are kept in memory only");
            return Self::in_memory(max_entries, max_age);
        }

        match Self::open(&config.storage_path, max_entries, max_age) {
            Ok(store) => Ok(store),
            Err(e) => {
                error!(
                    path = %config.storage_path.display(),
                    error = %e,
                    "Cannot open cache file, falling back to in-memory cache"
                );
                Self::in_memory(max_entries, max_age)
            }
        }
    }

    fn with_connection(
        conn: Connection,
        max_entries: usize,
        max_age: Duration,
        location: String,
    ) -> Result<Self> {
        schema::run_migrations(&conn)?;
        info!(location = %location, max_entries, max_age_secs = max_age.as_secs(), "Cache store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            max_entries: max_entries.max(1),
            max_age,
            location,
        })
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::LockPoisoned)
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn is_durable(&self) -> bool {
        self.location != ":memory:"
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Insert a report, evicting the oldest entries beyond `max_entries`.
    pub fn add(&self, report: &SealedReport) -> Result<AddOutcome> {
        self.add_at(report, Utc::now())
    }

    pub fn add_at(&self, report: &SealedReport, now: DateTime<Utc>) -> Result<AddOutcome> {
        let sealed_at = report
            .created_at()
            .timestamp_nanos_opt()
            .ok_or(CacheError::TimestampRange(report.created_at()))?;
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO cache_entries \
             (batch_id, device_id, result_count, payload, sealed_at, created_at, status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(batch_id) DO NOTHING",
            params![
                report.batch_id(),
                report.device_id(),
                report.result_count() as i64,
                report.body().as_ref(),
                sealed_at,
                now.timestamp_millis(),
                EntryStatus::Pending.as_str(),
            ],
        )? > 0;

        let count: i64 = tx.query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;
        let excess = count - self.max_entries as i64;
        let evicted = if excess > 0 {
            tx.execute(
                "DELETE FROM cache_entries WHERE id IN \
                 (SELECT id FROM cache_entries ORDER BY id ASC LIMIT ?1)",
                params![excess],
            )?
        } else {
            0
        };
        tx.commit()?;

        if evicted > 0 {
            warn!(
                evicted,
                max_entries = self.max_entries,
                "Cache full, oldest entries evicted"
            );
        }
        if inserted {
            debug!(batch_id = %report.batch_id(), "Report cached");
        } else {
            debug!(batch_id = %report.batch_id(), "Report already cached");
        }
        Ok(AddOutcome { inserted, evicted })
    }

    /// Up to `limit` entries, oldest first. Expired entries are purged first.
    pub fn get_pending(&self, limit: usize) -> Result<Vec<CacheEntry>> {
        self.get_pending_at(limit, Utc::now())
    }

    pub fn get_pending_at(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<CacheEntry>> {
        self.purge_expired_at(now)?;

        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id ASC LIMIT ?1"))?;
        let rows = stmt
            .query_map(params![limit as i64], RawRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawRow::into_entry).collect()
    }

    pub fn get(&self, id: i64) -> Result<Option<CacheEntry>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                RawRow::from_row,
            )
            .optional()?;
        row.map(RawRow::into_entry).transpose()
    }

    /// Delete an entry after a successful resend. `false` if it was gone.
    pub fn remove(&self, id: i64) -> Result<bool> {
        let conn = self.lock_conn()?;
        let removed = conn.execute("DELETE FROM cache_entries WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    /// Record a failed resend
    pub fn increment_retry(&self, id: i64, last_error: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let updated = conn.execute(
            "UPDATE cache_entries \
             SET retry_count = retry_count + 1, status = ?2, last_error = ?3 \
             WHERE id = ?1",
            params![id, EntryStatus::Retrying.as_str(), last_error],
        )?;
        Ok(updated > 0)
    }

    /// Remove entries older than `max_age`
    pub fn purge_expired(&self) -> Result<usize> {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let max_age_ms = i64::try_from(self.max_age.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now.timestamp_millis().saturating_sub(max_age_ms);

        let conn = self.lock_conn()?;
        let purged = conn.execute(
            "DELETE FROM cache_entries WHERE created_at < ?1",
            params![cutoff],
        )?;
        if purged > 0 {
            warn!(purged, max_age_secs = self.max_age.as_secs(), "Expired cache entries purged");
        }
        Ok(purged)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> Result<CacheStats> {
        let conn = self.lock_conn()?;
        let (entries, oldest, retrying): (i64, Option<i64>, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), MIN(created_at), \
             SUM(CASE WHEN status = 'retrying' THEN 1 ELSE 0 END) FROM cache_entries",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;

        let oldest_age = oldest.map(|created| {
            let age_ms = now.timestamp_millis().saturating_sub(created).max(0);
            Duration::from_millis(age_ms as u64)
        });
        Ok(CacheStats {
            entries: entries.max(0) as u64,
            retrying: retrying.unwrap_or(0).max(0) as u64,
            oldest_age,
        })
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self.lock_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;
        Ok(count.max(0) as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Delete everything; returns the number of removed entries
    pub fn clear(&self) -> Result<usize> {
        let conn = self.lock_conn()?;
        Ok(conn.execute("DELETE FROM cache_entries", [])?)
    }

    /// Flush and release the connection
    pub fn close(self) -> Result<()> {
        let conn = self.conn.into_inner().map_err(|_| CacheError::LockPoisoned)?;
        conn.close().map_err(|(_, e)| CacheError::Sqlite(e))?;
        debug!(location = %self.location, "Cache store closed");
        Ok(())
    }
}
