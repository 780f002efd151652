//! AgentConfig - config loader output
//!
//! The complete, immutable agent configuration: device identity, source,
//! inference, reporter and cache sections. Every section has defaults so a
//! partial file (or no file at all) yields a usable structure.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Complete agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AgentConfig {
    /// Device identifier stamped on every report
    #[validate(length(min = 1, message = "device_id must not be empty"))]
    pub device_id: String,

    /// Skip results without any detection before they reach the reporter
    pub report_only_detections: bool,

    #[validate(nested)]
    pub source: SourceConfig,

    #[validate(nested)]
    pub inference: InferenceConfig,

    #[validate(nested)]
    pub reporter: ReporterConfig,

    #[validate(nested)]
    pub cache: CacheConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            device_id: "edge-agent-001".to_string(),
            report_only_detections: false,
            source: SourceConfig::default(),
            inference: InferenceConfig::default(),
            reporter: ReporterConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Source kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    #[default]
    Folder,
    Video,
    Camera,
    NetworkStream,
}

impl SourceType {
    /// Finite sources end; infinite ones run until stopped or failed.
    pub fn is_finite(self) -> bool {
        matches!(self, Self::Folder | Self::Video)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Video => "video",
            Self::Camera => "camera",
            Self::NetworkStream => "network-stream",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub source_type: SourceType,

    /// Folder path, video file, `stub://name` or `/dev/videoN` camera, or a
    /// `tcp://host:port` / `http://` MJPEG stream
    #[validate(length(min = 1, message = "source path must not be empty"))]
    pub path: String,

    /// Maximum frames per second requested from the source, 0 = unpaced
    #[validate(range(min = 0.0, message = "rate_limit must be >= 0"))]
    pub rate_limit: f64,

    /// Restart finite sources from the beginning when exhausted
    #[serde(rename = "loop")]
    pub looping: bool,

    /// Process one frame, then discard this many
    pub skip_frames: u32,

    /// Accepted image extensions for folder sources
    pub extensions: Vec<String>,

    /// Native frame rate of video files and synthetic cameras
    #[validate(range(exclusive_min = 0.0, message = "native_fps must be > 0"))]
    pub native_fps: f64,

    /// Consecutive reconnect failures tolerated by network streams
    #[validate(range(min = 1, message = "reconnect_max_attempts must be >= 1"))]
    pub reconnect_max_attempts: u32,

    pub reconnect_initial_delay_ms: u64,

    pub reconnect_max_delay_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            source_type: SourceType::Folder,
            path: "./images".to_string(),
            rate_limit: 0.0,
            looping: false,
            skip_frames: 0,
            extensions: default_extensions(),
            native_fps: 30.0,
            reconnect_max_attempts: 5,
            reconnect_initial_delay_ms: 500,
            reconnect_max_delay_ms: 10_000,
        }
    }
}

fn default_extensions() -> Vec<String> {
    [".jpg", ".jpeg", ".png", ".bmp"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl SourceConfig {
    pub fn reconnect_initial_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }
}

/// Inference configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct InferenceConfig {
    /// Engine identifier, e.g. `stub` or `stub:empty`
    #[validate(length(min = 1, message = "engine must not be empty"))]
    pub engine: String,

    /// Model artifact; required to exist for non-stub engines
    pub model_path: PathBuf,

    #[validate(range(min = 0.0, max = 1.0, message = "must be within [0, 1]"))]
    pub confidence_threshold: f32,

    #[validate(range(min = 0.0, max = 1.0, message = "must be within [0, 1]"))]
    pub iou_threshold: f32,

    /// Run one warm-up prediction during startup
    pub warmup: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            engine: "stub".to_string(),
            model_path: PathBuf::new(),
            confidence_threshold: 0.5,
            iou_threshold: 0.5,
            warmup: true,
        }
    }
}

/// Producer behavior when the reporter intake queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Wait for space; no result is lost
    #[default]
    Block,
    /// Evict the oldest queued result to make room
    DropOldest,
}

/// Reporter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ReporterConfig {
    /// `http(s)://...` or `log://name`
    #[validate(length(min = 1, message = "endpoint must not be empty"))]
    pub endpoint: String,

    /// Sent as `Authorization: Bearer <key>`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[validate(range(exclusive_min = 0.0, message = "timeout_secs must be > 0"))]
    pub timeout_secs: f64,

    /// Retries after the first attempt
    pub max_retries: u32,

    #[validate(range(min = 0.0, message = "retry_initial_delay_secs must be >= 0"))]
    pub retry_initial_delay_secs: f64,

    #[validate(range(min = 1.0, message = "retry_backoff must be >= 1"))]
    pub retry_backoff: f64,

    #[validate(range(min = 0.0, message = "retry_max_delay_secs must be >= 0"))]
    pub retry_max_delay_secs: f64,

    #[validate(range(min = 1, message = "batch_size must be >= 1"))]
    pub batch_size: usize,

    #[validate(range(exclusive_min = 0.0, message = "batch_interval_secs must be > 0"))]
    pub batch_interval_secs: f64,

    /// Intake queue capacity between capture loop and reporter
    #[validate(range(min = 1, message = "queue_capacity must be >= 1"))]
    pub queue_capacity: usize,

    pub backpressure: BackpressurePolicy,

    #[validate(range(exclusive_min = 0.0, message = "drain_interval_secs must be > 0"))]
    pub drain_interval_secs: f64,

    /// Cached entries attempted per drain cycle
    #[validate(range(min = 1, message = "drain_batch_limit must be >= 1"))]
    pub drain_batch_limit: usize,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/api/v1/report".to_string(),
            api_key: None,
            timeout_secs: 30.0,
            max_retries: 3,
            retry_initial_delay_secs: 1.0,
            retry_backoff: 2.0,
            retry_max_delay_secs: 30.0,
            batch_size: 10,
            batch_interval_secs: 5.0,
            queue_capacity: 64,
            backpressure: BackpressurePolicy::Block,
            drain_interval_secs: 60.0,
            drain_batch_limit: 50,
        }
    }
}

impl ReporterConfig {
    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }

    pub fn batch_interval(&self) -> Duration {
        secs(self.batch_interval_secs)
    }

    pub fn retry_initial_delay(&self) -> Duration {
        secs(self.retry_initial_delay_secs)
    }

    pub fn retry_max_delay(&self) -> Duration {
        secs(self.retry_max_delay_secs)
    }

    pub fn drain_interval(&self) -> Duration {
        secs(self.drain_interval_secs)
    }
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CacheConfig {
    /// Persist undelivered payloads on disk; otherwise keep them in memory
    pub enabled: bool,

    pub storage_path: PathBuf,

    #[validate(range(min = 1, message = "max_entries must be >= 1"))]
    pub max_entries: usize,

    #[validate(range(exclusive_min = 0.0, message = "max_age_hours must be > 0"))]
    pub max_age_hours: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            storage_path: PathBuf::from("cache/edge_agent.db"),
            max_entries: 10_000,
            max_age_hours: 24.0,
        }
    }
}

impl CacheConfig {
    pub fn max_age(&self) -> Duration {
        secs(self.max_age_hours * 3600.0)
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
