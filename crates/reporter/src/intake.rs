//! Bounded intake queue between the capture loop and the reporter worker
//!
//! With [`BackpressurePolicy::Block`] a full queue blocks the producer; with
//! [`BackpressurePolicy::DropOldest`] the oldest queued result is evicted to
//! make room. Dropping the [`IntakeSender`] closes the queue; the worker
//! still receives everything queued before the close.

use std::sync::Arc;

use async_channel::{Receiver, Sender, TryRecvError, TrySendError};
use contracts::{BackpressurePolicy, InferenceResult};
use tracing::warn;

use crate::error::ReporterError;
use crate::metrics::ReporterMetrics;

/// What happened to a submitted result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Queued without loss
    Queued,
    /// Queued after evicting this many older results
    QueuedWithEviction(usize),
}

/// Producer side, owned by the capture loop
#[derive(Debug)]
pub struct IntakeSender {
    tx: Sender<InferenceResult>,
    /// Receiver clone used only to evict under `DropOldest`
    evict: Option<Receiver<InferenceResult>>,
    metrics: Arc<ReporterMetrics>,
}

/// Consumer side, owned by the reporter worker
#[derive(Debug)]
pub struct IntakeReceiver {
    rx: Receiver<InferenceResult>,
    metrics: Arc<ReporterMetrics>,
}

/// Create a bounded intake queue
pub fn intake(
    capacity: usize,
    policy: BackpressurePolicy,
    metrics: Arc<ReporterMetrics>,
) -> (IntakeSender, IntakeReceiver) {
    let (tx, rx) = async_channel::bounded(capacity.max(1));
    let evict = match policy {
        BackpressurePolicy::Block => None,
        BackpressurePolicy::DropOldest => Some(rx.clone()),
    };
    (
        IntakeSender {
            tx,
            evict,
            metrics: Arc::clone(&metrics),
        },
        IntakeReceiver { rx, metrics },
    )
}

impl IntakeSender {
    pub fn policy(&self) -> BackpressurePolicy {
        if self.evict.is_some() {
            BackpressurePolicy::DropOldest
        } else {
            BackpressurePolicy::Block
        }
    }

    /// Submit from a blocking thread (the capture loop).
    ///
    /// # Errors
    /// [`ReporterError::IntakeClosed`] when the worker has gone away.
    pub fn submit_blocking(&self, result: InferenceResult) -> Result<SubmitOutcome, ReporterError> {
        let outcome = match &self.evict {
            None => {
                self.tx
                    .send_blocking(result)
                    .map_err(|_| ReporterError::IntakeClosed)?;
                SubmitOutcome::Queued
            }
            Some(evict) => self.submit_evicting(evict, result)?,
        };
        self.metrics.set_queue_len(self.tx.len());
        Ok(outcome)
    }

    /// Submit from async code.
    pub async fn submit(&self, result: InferenceResult) -> Result<SubmitOutcome, ReporterError> {
        let outcome = match &self.evict {
            None => {
                self.tx
                    .send(result)
                    .await
                    .map_err(|_| ReporterError::IntakeClosed)?;
                SubmitOutcome::Queued
            }
            Some(evict) => self.submit_evicting(evict, result)?,
        };
        self.metrics.set_queue_len(self.tx.len());
        Ok(outcome)
    }

    fn submit_evicting(
        &self,
        evict: &Receiver<InferenceResult>,
        mut result: InferenceResult,
    ) -> Result<SubmitOutcome, ReporterError> {
        // the eviction clone alone keeps the channel open
        if self.tx.receiver_count() < 2 {
            return Err(ReporterError::IntakeClosed);
        }
        let mut evicted = 0;
        loop {
            match self.tx.try_send(result) {
                Ok(()) => break,
                Err(TrySendError::Full(rejected)) => {
                    result = rejected;
                    match evict.try_recv() {
                        Ok(dropped) => {
                            evicted += 1;
                            self.metrics.inc_intake_dropped();
                            observability::record_intake_dropped();
                            warn!(frame_id = dropped.frame_id, "Intake full, oldest result dropped");
                        }
                        // the worker emptied a slot in between
                        Err(TryRecvError::Empty) => {}
                        Err(TryRecvError::Closed) => return Err(ReporterError::IntakeClosed),
                    }
                }
                Err(TrySendError::Closed(_)) => return Err(ReporterError::IntakeClosed),
            }
        }
        Ok(if evicted == 0 {
            SubmitOutcome::Queued
        } else {
            SubmitOutcome::QueuedWithEviction(evicted)
        })
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(usize::MAX)
    }
}

impl IntakeReceiver {
    /// Next result; `None` once the queue is closed and empty
    pub async fn recv(&self) -> Option<InferenceResult> {
        let result = self.rx.recv().await.ok();
        self.metrics.set_queue_len(self.rx.len());
        result
    }

    /// Next result if one is ready
    pub fn try_recv(&self) -> Option<InferenceResult> {
        let result = self.rx.try_recv().ok();
        if result.is_some() {
            self.metrics.set_queue_len(self.rx.len());
        }
        result
    }
}
