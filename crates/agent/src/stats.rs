//! Run statistics

use std::fmt;
use std::time::Duration;

use observability::InferenceStatsAggregator;

/// Counters kept by the capture loop
#[derive(Debug, Clone, Default)]
pub struct AgentStats {
    /// Frames returned by the source
    pub frames_read: u64,

    /// Frames that went through inference successfully
    pub frames_processed: u64,

    /// Frames decimated away or filtered for having no detections
    pub frames_skipped: u64,

    pub inference_failures: u64,

    pub detections_total: u64,

    /// Results accepted by the reporter intake
    pub results_submitted: u64,

    /// Results evicted from a full intake (drop-oldest only)
    pub results_dropped: u64,

    /// Wall time from RUNNING to the end of capture
    pub duration: Duration,

    pub inference: InferenceStatsAggregator,
}

impl AgentStats {
    /// Processed frames per second
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames_processed as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl fmt::Display for AgentStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Capture Summary ===")?;
        writeln!(f, "Duration: {:.2}s", self.duration.as_secs_f64())?;
        writeln!(f, "Frames read: {}", self.frames_read)?;
        writeln!(f, "Frames processed: {}", self.frames_processed)?;
        writeln!(f, "Frames skipped: {}", self.frames_skipped)?;
        writeln!(f, "Inference failures: {}", self.inference_failures)?;
        writeln!(f, "Detections: {}", self.detections_total)?;
        writeln!(f, "Results submitted: {}", self.results_submitted)?;
        if self.results_dropped > 0 {
            writeln!(f, "Results dropped at intake: {}", self.results_dropped)?;
        }
        writeln!(f, "FPS: {:.2}", self.fps())?;
        write!(f, "{}", self.inference.summary())
    }
}
