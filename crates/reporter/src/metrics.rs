//! Reporter metrics for observability

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters shared between the reporter worker, the intake sender and the
/// handle
#[derive(Debug, Default)]
pub struct ReporterMetrics {
    /// Current intake queue length
    queue_len: AtomicUsize,
    /// Results taken from the intake queue
    results_received: AtomicU64,
    /// Batches sealed (size, interval or shutdown)
    batches_sealed: AtomicU64,
    /// Successful sends, fresh or drained
    delivered: AtomicU64,
    /// Failed send attempts
    delivery_failures: AtomicU64,
    /// Batches written to the cache
    cached: AtomicU64,
    /// Cached batches resent successfully
    drained: AtomicU64,
    /// Batches that could not be written to the cache
    cache_write_failures: AtomicU64,
    /// Batches held in memory after a cache write failed
    spilled: AtomicU64,
    /// Batches dropped without delivery
    lost: AtomicU64,
    /// Results evicted from a full intake queue
    intake_dropped: AtomicU64,
}

macro_rules! counter_accessors {
    ($($field:ident => $inc:ident),* $(,)?) => {
        $(
            pub fn $field(&self) -> u64 {
                self.$field.load(Ordering::Relaxed)
            }

            pub fn $inc(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl ReporterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    counter_accessors!(
        results_received => inc_results_received,
        batches_sealed => inc_batches_sealed,
        delivered => inc_delivered,
        delivery_failures => inc_delivery_failures,
        cached => inc_cached,
        drained => inc_drained,
        cache_write_failures => inc_cache_write_failures,
        spilled => inc_spilled,
        lost => inc_lost,
        intake_dropped => inc_intake_dropped,
    );

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> ReporterSnapshot {
        ReporterSnapshot {
            queue_len: self.queue_len(),
            results_received: self.results_received(),
            batches_sealed: self.batches_sealed(),
            delivered: self.delivered(),
            delivery_failures: self.delivery_failures(),
            cached: self.cached(),
            drained: self.drained(),
            cache_write_failures: self.cache_write_failures(),
            spilled: self.spilled(),
            lost: self.lost(),
            intake_dropped: self.intake_dropped(),
        }
    }
}

/// Snapshot of reporter metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReporterSnapshot {
    pub queue_len: usize,
    pub results_received: u64,
    pub batches_sealed: u64,
    pub delivered: u64,
    pub delivery_failures: u64,
    pub cached: u64,
    pub drained: u64,
    pub cache_write_failures: u64,
    pub spilled: u64,
    pub lost: u64,
    pub intake_dropped: u64,
}

impl fmt::Display for ReporterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Reporter Summary ===")?;
        writeln!(f, "Results received: {}", self.results_received)?;
        writeln!(f, "Batches sealed: {}", self.batches_sealed)?;
        writeln!(
            f,
            "Delivered: {} (from cache: {})",
            self.delivered, self.drained
        )?;
        writeln!(f, "Failed attempts: {}", self.delivery_failures)?;
        writeln!(f, "Cached: {}", self.cached)?;
        if self.cache_write_failures > 0 {
            writeln!(
                f,
                "Cache write failures: {} (held in memory: {})",
                self.cache_write_failures, self.spilled
            )?;
        }
        if self.lost > 0 {
            writeln!(f, "Lost: {}", self.lost)?;
        }
        if self.intake_dropped > 0 {
            writeln!(f, "Dropped at intake: {}", self.intake_dropped)?;
        }
        Ok(())
    }
}
