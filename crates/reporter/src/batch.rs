//! Batch accumulation
//!
//! A batch seals when it holds `batch_size` results or when `batch_interval`
//! has passed since its first result, whichever comes first. An empty batch
//! never seals.

use std::time::Duration;

use chrono::Utc;
use contracts::{InferenceResult, ReportPayload};
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug)]
pub struct BatchAccumulator {
    device_id: String,
    batch_size: usize,
    batch_interval: Duration,
    results: Vec<InferenceResult>,
    /// Arrival of the first result of the open batch
    opened_at: Option<Instant>,
}

impl BatchAccumulator {
    pub fn new(device_id: impl Into<String>, batch_size: usize, batch_interval: Duration) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            device_id: device_id.into(),
            batch_size,
            batch_interval,
            results: Vec::with_capacity(batch_size),
            opened_at: None,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Add a result; returns the sealed batch when it reached `batch_size`
    pub fn push(&mut self, result: InferenceResult) -> Option<ReportPayload> {
        if self.results.is_empty() {
            self.opened_at = Some(Instant::now());
        }
        self.results.push(result);
        if self.results.len() >= self.batch_size {
            self.seal()
        } else {
            None
        }
    }

    /// When the open batch times out, `None` while empty
    pub fn deadline(&self) -> Option<Instant> {
        self.opened_at.map(|opened| opened + self.batch_interval)
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Close the open batch regardless of thresholds; `None` if empty
    pub fn seal(&mut self) -> Option<ReportPayload> {
        if self.results.is_empty() {
            return None;
        }
        self.opened_at = None;
        let results = std::mem::replace(&mut self.results, Vec::with_capacity(self.batch_size));
        Some(ReportPayload {
            device_id: self.device_id.clone(),
            batch_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            results,
        })
    }
}
