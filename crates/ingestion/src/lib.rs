//! # Ingestion
//!
//! Frame sources.
//!
//! Responsibilities:
//! - Enumerate and decode images from folders and MJPEG video files
//! - Produce synthetic camera frames (`stub://`), or capture from V4L2
//!   devices with the `v4l2` feature
//! - Read MJPEG over TCP or HTTP with reconnect and backoff
//! - Pace and decimate reads for the capture loop
//!
//! Every source implements the blocking [`contracts::FrameSource`] trait and is
//! driven from a dedicated thread by the agent.
//!
//! ## Usage Example
//!
//! ```ignore
//! use contracts::{ReadOutcome, SourceConfig, StopSignal};
//! use ingestion::create_source;
//!
//! let stop = StopSignal::new();
//! let mut source = create_source(&config.source, &stop)?;
//! source.open()?;
//! while let ReadOutcome::Frame(frame) = source.read()? {
//!     // hand the frame to inference
//! }
//! source.close();
//! ```

mod camera;
mod decode;
mod error;
mod factory;
mod folder;
mod mjpeg;
mod network;
mod pacing;
mod synthetic;
#[cfg(feature = "v4l2")]
mod v4l2;
mod video;

pub use camera::CameraSource;
pub use decode::{decode_image, decode_jpeg};
pub use error::{IngestionError, Result};
pub use factory::create_source;
pub use folder::FolderSource;
pub use mjpeg::{index_frames, MjpegSplitter};
pub use network::{NetworkStreamSource, ReconnectPolicy};
pub use pacing::{FrameDecimator, RatePacer, MAX_PACING_INTERVAL};
pub use synthetic::TestPattern;
pub use video::{decimation_step, VideoSource};
