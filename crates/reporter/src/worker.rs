//! Reporter worker - batching, delivery, caching and drain
//!
//! One task owns the transport, so at most one request is in flight. Sealed
//! fresh batches always go before cached entries; a drain cycle yields as
//! soon as a fresh batch is sealed.
//!
//! When the cache rejects a write the batch is held in a bounded in-memory
//! spill queue instead. Drain cycles serve the spill queue before the cache,
//! and whatever is left at shutdown gets one more chance to be persisted.

use std::collections::VecDeque;
use std::sync::Arc;

use cache_store::{CacheEntry, CacheStore};
use contracts::{ReportTransport, ReporterConfig, SealedReport, StopSignal};
use observability::DeliveryOutcome;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::batch::BatchAccumulator;
use crate::error::ReporterError;
use crate::intake::IntakeReceiver;
use crate::metrics::{ReporterMetrics, ReporterSnapshot};
use crate::retry::RetryPolicy;

pub(crate) struct ReporterWorker<T> {
    transport: T,
    cache: Arc<CacheStore>,
    batch: BatchAccumulator,
    sealed: VecDeque<SealedReport>,
    spill: VecDeque<SealedReport>,
    spill_limit: usize,
    retry: RetryPolicy,
    drain_interval: std::time::Duration,
    drain_batch_limit: usize,
    metrics: Arc<ReporterMetrics>,
    stop: StopSignal,
}

impl<T: ReportTransport> ReporterWorker<T> {
    pub(crate) fn new(
        config: &ReporterConfig,
        device_id: &str,
        transport: T,
        cache: CacheStore,
        metrics: Arc<ReporterMetrics>,
        stop: StopSignal,
    ) -> Self {
        let spill_limit = cache.max_entries().max(1);
        Self {
            transport,
            cache: Arc::new(cache),
            batch: BatchAccumulator::new(device_id, config.batch_size, config.batch_interval()),
            sealed: VecDeque::new(),
            spill: VecDeque::new(),
            spill_limit,
            retry: RetryPolicy::from_config(config),
            drain_interval: config.drain_interval(),
            drain_batch_limit: config.drain_batch_limit.max(1),
            metrics,
            stop,
        }
    }

    /// Run until the intake closes, then flush and close the cache
    #[instrument(
        name = "reporter_worker_loop",
        skip(self, intake),
        fields(endpoint = %self.transport.endpoint())
    )]
    pub(crate) async fn run(mut self, intake: IntakeReceiver) -> ReporterSnapshot {
        info!(
            transport = self.transport.name(),
            cache = %self.cache.location(),
            "Reporter worker started"
        );
        self.report_cache_depth().await;

        let mut drain_tick = time::interval_at(
            Instant::now() + self.drain_interval,
            self.drain_interval,
        );
        drain_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            self.deliver_sealed().await;

            let deadline = self.batch.deadline();
            tokio::select! {
                biased;
                received = intake.recv() => match received {
                    Some(result) => self.accept(result),
                    None => break,
                },
                _ = wait_until(deadline) => self.seal_open("interval"),
                _ = drain_tick.tick() => {
                    if !self.stop.is_triggered() {
                        self.drain(&intake).await;
                    }
                }
            }
        }

        debug!(pending = self.batch.len(), "Intake closed, flushing");
        self.seal_open("shutdown");
        self.deliver_sealed().await;
        self.persist_spill().await;

        let metrics = Arc::clone(&self.metrics);
        self.close_cache();
        let snapshot = metrics.snapshot();
        info!(
            delivered = snapshot.delivered,
            cached = snapshot.cached,
            drained = snapshot.drained,
            "Reporter worker stopped"
        );
        snapshot
    }

    fn accept(&mut self, result: contracts::InferenceResult) {
        self.metrics.inc_results_received();
        if let Some(payload) = self.batch.push(result) {
            self.enqueue_sealed(payload, "size");
        }
    }

    fn seal_open(&mut self, reason: &'static str) {
        if let Some(payload) = self.batch.seal() {
            self.enqueue_sealed(payload, reason);
        }
    }

    fn enqueue_sealed(&mut self, payload: contracts::ReportPayload, reason: &'static str) {
        let batch_id = payload.batch_id.clone();
        let results = payload.results.len();
        match payload.seal() {
            Ok(report) => {
                self.metrics.inc_batches_sealed();
                observability::record_batch_sealed(results);
                debug!(batch_id = %batch_id, results, reason, "Batch sealed");
                self.sealed.push_back(report);
            }
            Err(e) => {
                self.metrics.inc_lost();
                observability::record_delivery(DeliveryOutcome::Lost);
                error!(batch_id = %batch_id, error = %e, "Batch could not be serialized");
            }
        }
    }

    async fn deliver_sealed(&mut self) {
        while let Some(report) = self.sealed.pop_front() {
            self.deliver_fresh(report).await;
        }
    }

    /// First attempt plus retries with backoff; on failure the report is cached
    #[instrument(
        name = "reporter_deliver",
        skip(self, report),
        fields(batch_id = %report.batch_id(), results = report.result_count())
    )]
    async fn deliver_fresh(&mut self, report: SealedReport) {
        let attempts = self.retry.total_attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.transport.send(&report).await {
                Ok(()) => {
                    self.metrics.inc_delivered();
                    observability::record_delivery(DeliveryOutcome::Delivered);
                    info!(attempt, "Batch delivered");
                    return;
                }
                Err(e) => {
                    self.metrics.inc_delivery_failures();
                    observability::record_delivery(DeliveryOutcome::AttemptFailed);
                    warn!(attempt, attempts, error = %e, "Delivery attempt failed");
                    last_error = e.to_string();

                    if !e.is_retryable() || attempt == attempts || self.stop.is_triggered() {
                        break;
                    }

                    let delay = self.retry.delay_for(attempt);
                    debug!(delay_ms = delay.as_millis() as u64, "Backing off");
                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        _ = self.stop.cancelled() => {
                            info!("Stop requested during backoff");
                            break;
                        }
                    }
                }
            }
        }

        self.cache_report(report, &last_error).await;
    }

    async fn cache_report(&mut self, report: SealedReport, reason: &str) {
        let batch_id = report.batch_id().to_string();
        let stored = report.clone();
        match on_cache(&self.cache, move |cache| cache.add(&stored)).await {
            Ok(outcome) => {
                self.metrics.inc_cached();
                observability::record_delivery(DeliveryOutcome::Cached);
                warn!(
                    batch_id = %batch_id,
                    evicted = outcome.evicted,
                    last_error = %reason,
                    "Delivery exhausted, batch cached"
                );
            }
            Err(e) => {
                self.metrics.inc_cache_write_failures();
                error!(batch_id = %batch_id, error = %e, "Cache write failed, batch held in memory");
                self.spill_report(report);
            }
        }
        self.report_cache_depth().await;
    }

    fn spill_report(&mut self, report: SealedReport) {
        if self.spill.len() >= self.spill_limit {
            if let Some(evicted) = self.spill.pop_front() {
                self.metrics.inc_lost();
                observability::record_delivery(DeliveryOutcome::Lost);
                error!(batch_id = %evicted.batch_id(), "Spill queue full, oldest batch lost");
            }
        }
        self.metrics.inc_spilled();
        self.spill.push_back(report);
    }

    /// Stop draining when new results arrived that seal a fresh batch
    fn fresh_batch_waiting(&mut self, intake: &IntakeReceiver) -> bool {
        while let Some(result) = intake.try_recv() {
            self.accept(result);
        }
        if self.batch.is_due(Instant::now()) {
            self.seal_open("interval");
        }
        !self.sealed.is_empty()
    }

    /// Resend spilled batches oldest-first; the first failure ends the pass
    async fn drain_spill(&mut self, intake: &IntakeReceiver) -> usize {
        let mut resent = 0usize;
        while !self.spill.is_empty() {
            if self.stop.is_triggered() || self.fresh_batch_waiting(intake) {
                break;
            }
            let Some(report) = self.spill.pop_front() else {
                break;
            };
            match self.transport.send(&report).await {
                Ok(()) => {
                    self.metrics.inc_delivered();
                    self.metrics.inc_drained();
                    observability::record_delivery(DeliveryOutcome::Drained);
                    info!(batch_id = %report.batch_id(), "Spilled batch delivered");
                    resent += 1;
                }
                Err(e) => {
                    self.metrics.inc_delivery_failures();
                    observability::record_delivery(DeliveryOutcome::AttemptFailed);
                    warn!(batch_id = %report.batch_id(), error = %e, "Spilled batch resend failed");
                    self.spill.push_front(report);
                    break;
                }
            }
        }
        resent
    }

    /// Last chance for spilled batches: write them to the cache before exit
    async fn persist_spill(&mut self) {
        while let Some(report) = self.spill.pop_front() {
            let batch_id = report.batch_id().to_string();
            match on_cache(&self.cache, move |cache| cache.add(&report)).await {
                Ok(_) => {
                    self.metrics.inc_cached();
                    observability::record_delivery(DeliveryOutcome::Cached);
                    info!(batch_id = %batch_id, "Spilled batch cached at shutdown");
                }
                Err(e) => {
                    self.metrics.inc_lost();
                    observability::record_delivery(DeliveryOutcome::Lost);
                    error!(batch_id = %batch_id, error = %e, "Spilled batch lost at shutdown");
                }
            }
        }
    }

    /// Resend cached entries oldest-first, one attempt each
    #[instrument(name = "reporter_drain", skip(self, intake))]
    async fn drain(&mut self, intake: &IntakeReceiver) {
        if !self.spill.is_empty() {
            let spilled = self.spill.len();
            let resent = self.drain_spill(intake).await;
            info!(spilled, resent, "Spill queue drained");
            if !self.spill.is_empty() || !self.sealed.is_empty() {
                return;
            }
        }

        let limit = self.drain_batch_limit;
        let entries = match on_cache(&self.cache, move |cache| cache.get_pending(limit)).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Cannot read cache for drain");
                return;
            }
        };
        if entries.is_empty() {
            return;
        }

        info!(entries = entries.len(), "Drain cycle started");
        let mut resent = 0usize;
        for entry in entries {
            if self.stop.is_triggered() {
                break;
            }
            if self.fresh_batch_waiting(intake) {
                debug!("Fresh batch sealed, drain yields");
                break;
            }

            if self.resend(entry).await {
                resent += 1;
            }
        }

        info!(resent, "Drain cycle finished");
        self.report_cache_depth().await;
    }

    async fn resend(&mut self, entry: CacheEntry) -> bool {
        let id = entry.id;
        let report = entry.to_report();
        match self.transport.send(&report).await {
            Ok(()) => {
                self.metrics.inc_delivered();
                self.metrics.inc_drained();
                observability::record_delivery(DeliveryOutcome::Drained);
                info!(batch_id = %entry.batch_id, retries = entry.retry_count, "Cached batch delivered");
                if let Err(e) = on_cache(&self.cache, move |cache| cache.remove(id)).await {
                    error!(id, error = %e, "Cannot remove delivered cache entry");
                }
                true
            }
            Err(e) => {
                self.metrics.inc_delivery_failures();
                observability::record_delivery(DeliveryOutcome::AttemptFailed);
                warn!(batch_id = %entry.batch_id, error = %e, "Cached batch resend failed");
                let message = e.to_string();
                if let Err(e) =
                    on_cache(&self.cache, move |cache| cache.increment_retry(id, &message)).await
                {
                    error!(id, error = %e, "Cannot update cache entry");
                }
                false
            }
        }
    }

    async fn report_cache_depth(&mut self) {
        match on_cache(&self.cache, |cache| cache.len()).await {
            Ok(depth) => observability::record_cache_depth(depth as u64),
            Err(e) => debug!(error = %e, "Cache depth unavailable"),
        }
    }

    fn close_cache(self) {
        let location = self.cache.location().to_string();
        match Arc::try_unwrap(self.cache) {
            Ok(cache) => {
                if let Err(e) = cache.close() {
                    error!(cache = %location, error = %e, "Cache close failed");
                }
            }
            Err(_) => warn!(cache = %location, "Cache still shared at shutdown, left to drop"),
        }
    }
}

/// Run a cache operation on the blocking pool
async fn on_cache<F, R>(cache: &Arc<CacheStore>, op: F) -> Result<R, ReporterError>
where
    F: FnOnce(&CacheStore) -> cache_store::Result<R> + Send + 'static,
    R: Send + 'static,
{
    let cache = Arc::clone(cache);
    let result = tokio::task::spawn_blocking(move || op(&cache))
        .await
        .map_err(|e| ReporterError::CacheTask(e.to_string()))?;
    Ok(result?)
}

/// Sleep until `deadline`, or forever when there is none
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
