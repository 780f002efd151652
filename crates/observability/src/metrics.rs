//! Edge agent metrics
//!
//! Prometheus-facing helpers (`edge_agent_*`) plus in-process aggregates used
//! for the end-of-run summary.

use std::collections::BTreeMap;

use contracts::Detection;
use metrics::{counter, gauge, histogram};

/// Record a frame that went through inference
pub fn record_frame_processed(source_type: &str) {
    counter!(
        "edge_agent_frames_processed_total",
        "source_type" => source_type.to_string()
    )
    .increment(1);
}

/// Record a frame that was read but not reported
pub fn record_frame_skipped(reason: &'static str) {
    counter!("edge_agent_frames_skipped_total", "reason" => reason).increment(1);
}

/// Record one successful inference call
pub fn record_inference(latency_ms: f64, detections: &[Detection]) {
    histogram!("edge_agent_inference_latency_ms").record(latency_ms);
    histogram!("edge_agent_detections_per_frame").record(detections.len() as f64);
    for detection in detections {
        counter!(
            "edge_agent_detections_total",
            "label" => detection.label().to_string()
        )
        .increment(1);
    }
}

/// Record a failed inference call
pub fn record_inference_failure(engine: &str) {
    counter!(
        "edge_agent_inference_failures_total",
        "engine" => engine.to_string()
    )
    .increment(1);
}

/// Record a sealed batch
pub fn record_batch_sealed(result_count: usize) {
    counter!("edge_agent_batches_sealed_total").increment(1);
    histogram!("edge_agent_batch_size").record(result_count as f64);
}

/// Outcome of a delivery step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Fresh batch accepted by the endpoint
    Delivered,
    /// One attempt failed
    AttemptFailed,
    /// Batch written to the cache after exhausting retries
    Cached,
    /// Cached batch resent successfully
    Drained,
    /// Payload could not be delivered nor cached
    Lost,
}

impl DeliveryOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::AttemptFailed => "attempt_failed",
            Self::Cached => "cached",
            Self::Drained => "drained",
            Self::Lost => "lost",
        }
    }
}

/// Record a delivery step
pub fn record_delivery(outcome: DeliveryOutcome) {
    counter!("edge_agent_deliveries_total", "outcome" => outcome.as_str()).increment(1);
}

/// Record the number of entries waiting in the cache
pub fn record_cache_depth(entries: u64) {
    gauge!("edge_agent_cache_entries").set(entries as f64);
}

/// Record a result evicted from the intake queue
pub fn record_intake_dropped() {
    counter!("edge_agent_intake_dropped_total").increment(1);
}

/// Record the orchestrator state as its ordinal (0 = init .. 3 = stopped)
pub fn record_agent_state(ordinal: u8) {
    gauge!("edge_agent_state").set(f64::from(ordinal));
}

/// Inference statistics aggregator
///
/// Aggregates in memory for the run summary.
#[derive(Debug, Clone, Default)]
pub struct InferenceStatsAggregator {
    pub total_frames: u64,
    pub frames_with_detections: u64,
    pub total_detections: u64,
    pub latency_ms: RunningStats,
    pub detections_per_frame: RunningStats,
    pub label_counts: BTreeMap<String, u64>,
}

impl InferenceStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, latency_ms: f64, detections: &[Detection]) {
        self.total_frames += 1;
        self.total_detections += detections.len() as u64;
        if !detections.is_empty() {
            self.frames_with_detections += 1;
        }
        self.latency_ms.push(latency_ms);
        self.detections_per_frame.push(detections.len() as f64);
        for detection in detections {
            *self
                .label_counts
                .entry(detection.label().to_string())
                .or_insert(0) += 1;
        }
    }

    pub fn summary(&self) -> InferenceSummary {
        InferenceSummary {
            total_frames: self.total_frames,
            frames_with_detections: self.frames_with_detections,
            total_detections: self.total_detections,
            hit_rate: if self.total_frames > 0 {
                self.frames_with_detections as f64 / self.total_frames as f64 * 100.0
            } else {
                0.0
            },
            latency_ms: StatsSummary::from(&self.latency_ms),
            detections_per_frame: StatsSummary::from(&self.detections_per_frame),
            label_counts: self.label_counts.clone(),
        }
    }
}

/// Inference summary
#[derive(Debug, Clone, Default)]
pub struct InferenceSummary {
    pub total_frames: u64,
    pub frames_with_detections: u64,
    pub total_detections: u64,
    /// Percentage of frames with at least one detection
    pub hit_rate: f64,
    pub latency_ms: StatsSummary,
    pub detections_per_frame: StatsSummary,
    pub label_counts: BTreeMap<String, u64>,
}

impl std::fmt::Display for InferenceSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Inference Summary ===")?;
        writeln!(f, "Frames inferred: {}", self.total_frames)?;
        writeln!(
            f,
            "Frames with detections: {} ({:.2}%)",
            self.frames_with_detections, self.hit_rate
        )?;
        writeln!(f, "Detections: {}", self.total_detections)?;
        writeln!(f, "Latency (ms): {}", self.latency_ms)?;
        writeln!(f, "Detections per frame: {}", self.detections_per_frame)?;

        if !self.label_counts.is_empty() {
            writeln!(f, "Labels:")?;
            for (label, count) in &self.label_counts {
                writeln!(f, "  {}: {}", label, count)?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
