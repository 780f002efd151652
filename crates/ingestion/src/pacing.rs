//! Read pacing
//!
//! `RatePacer` keeps consecutive reads at least `1 / rate` apart.
//! `FrameDecimator` implements `skip_frames`: admit one frame, drop N.

use std::time::{Duration, Instant};

use contracts::StopSignal;

/// Longest gap the pacer enforces; slower rates are clamped to it
pub const MAX_PACING_INTERVAL: Duration = Duration::from_secs(86_400);

/// Minimum-interval pacer for blocking read loops
#[derive(Debug)]
pub struct RatePacer {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl RatePacer {
    /// `rate` in reads per second; `0` disables pacing
    pub fn new(rate: f64) -> Self {
        let interval = (rate > 0.0 && rate.is_finite()).then(|| {
            Duration::try_from_secs_f64(1.0 / rate)
                .map_or(MAX_PACING_INTERVAL, |d| d.min(MAX_PACING_INTERVAL))
        });
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Block until the next read is allowed.
    ///
    /// Returns `false` if the stop signal fired while waiting.
    pub fn wait(&mut self, stop: &StopSignal) -> bool {
        if let (Some(interval), Some(last)) = (self.interval, self.last) {
            let due = last + interval;
            let now = Instant::now();
            if due > now && stop.wait_timeout(due - now) {
                return false;
            }
        }
        self.last = Some(Instant::now());
        !stop.is_triggered()
    }
}

/// `skip_frames` decimator
#[derive(Debug)]
pub struct FrameDecimator {
    skip: u32,
    counter: u64,
}

impl FrameDecimator {
    pub fn new(skip: u32) -> Self {
        Self { skip, counter: 0 }
    }

    /// Whether the next frame should be processed
    pub fn admit(&mut self) -> bool {
        let admitted = self.counter % (u64::from(self.skip) + 1) == 0;
        self.counter += 1;
        admitted
    }
}
