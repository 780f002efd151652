//! Inline retry policy for fresh batches

use std::time::Duration;

use contracts::ReporterConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ReporterConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: config.retry_initial_delay(),
            backoff: config.retry_backoff.max(1.0),
            max_delay: config.retry_max_delay(),
        }
    }

    /// First attempt plus retries
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before retry `retry` (1-based): `initial * backoff^(retry-1)`,
    /// capped at `max_delay`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ReporterConfig::default())
    }
}
