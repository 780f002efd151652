//! ReporterHandle - owns the reporter worker task

use std::sync::Arc;

use cache_store::CacheStore;
use contracts::{AgentConfig, ReportTransport, ReporterConfig, StopSignal};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ReporterError;
use crate::intake::{intake, IntakeSender};
use crate::metrics::{ReporterMetrics, ReporterSnapshot};
use crate::transport::AnyTransport;
use crate::worker::ReporterWorker;

/// Handle to a running reporter worker.
///
/// Results go in through the [`IntakeSender`] returned by
/// [`ReporterHandle::spawn`]. Dropping that sender closes the intake; the
/// worker then seals what is left, delivers or caches it, and exits.
pub struct ReporterHandle {
    endpoint: String,
    metrics: Arc<ReporterMetrics>,
    worker_handle: JoinHandle<ReporterSnapshot>,
}

impl ReporterHandle {
    /// Spawn the worker on the current runtime
    pub fn spawn<T: ReportTransport + 'static>(
        config: &ReporterConfig,
        device_id: &str,
        transport: T,
        cache: CacheStore,
        stop: StopSignal,
    ) -> (Self, IntakeSender) {
        let endpoint = transport.endpoint().to_string();
        let metrics = Arc::new(ReporterMetrics::new());
        let (tx, rx) = intake(
            config.queue_capacity,
            config.backpressure,
            Arc::clone(&metrics),
        );

        let worker = ReporterWorker::new(
            config,
            device_id,
            transport,
            cache,
            Arc::clone(&metrics),
            stop,
        );
        let worker_handle = tokio::spawn(worker.run(rx));

        debug!(
            endpoint = %endpoint,
            queue_capacity = config.queue_capacity,
            backpressure = ?config.backpressure,
            "Reporter spawned"
        );

        (
            Self {
                endpoint,
                metrics,
                worker_handle,
            },
            tx,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn metrics(&self) -> &Arc<ReporterMetrics> {
        &self.metrics
    }

    pub fn snapshot(&self) -> ReporterSnapshot {
        self.metrics.snapshot()
    }

    /// Wait for the worker to flush and exit.
    ///
    /// The intake sender must have been dropped first, or this waits forever.
    #[instrument(name = "reporter_handle_shutdown", skip(self), fields(endpoint = %self.endpoint))]
    pub async fn shutdown(self) -> ReporterSnapshot {
        match self.worker_handle.await {
            Ok(snapshot) => {
                debug!("Reporter shutdown complete");
                snapshot
            }
            Err(e) => {
                error!(error = ?e, "Reporter worker panicked");
                self.metrics.snapshot()
            }
        }
    }
}

/// Build transport and cache from configuration and spawn the reporter.
///
/// An unusable cache path falls back to an in-memory cache; a transport
/// that cannot be built is an error.
#[instrument(name = "reporter_spawn_from_config", skip(config, stop), fields(device_id = %config.device_id))]
pub fn spawn_from_config(
    config: &AgentConfig,
    stop: StopSignal,
) -> Result<(ReporterHandle, IntakeSender), ReporterError> {
    let transport = AnyTransport::from_config(&config.reporter)?;
    let cache = CacheStore::from_config(&config.cache)?;
    if config.cache.enabled && !cache.is_durable() {
        warn!(
            path = %config.cache.storage_path.display(),
            "Offline cache is not durable, cached batches are lost on exit"
        );
    }
    info!(
        cache = %cache.location(),
        max_entries = cache.max_entries(),
        "Offline cache ready"
    );
    Ok(ReporterHandle::spawn(
        &config.reporter,
        &config.device_id,
        transport,
        cache,
        stop,
    ))
}
