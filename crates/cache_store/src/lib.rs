//! # Cache Store
//!
//! Durable, bounded, FIFO-ordered queue of reports that could not be
//! delivered. Backed by SQLite (`rusqlite`, bundled).
//!
//! Invariant: after any operation completes, the entry count is at most
//! `max_entries`; inserting beyond capacity evicts the oldest entry first.

mod error;
mod schema;
mod store;

pub use error::{CacheError, Result};
pub use schema::SCHEMA_VERSION;
pub use store::{AddOutcome, CacheEntry, CacheStats, CacheStore, EntryStatus};
