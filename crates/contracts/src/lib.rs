//! # Contracts
//!
//! Shared interface contracts for the edge agent: the data that flows from a
//! frame source through inference to the reporter, the configuration
//! structure, the error taxonomy and the collaborator traits.
//!
//! Every other crate depends on this one; it depends on none of them.
//!
//! ## Time Model
//! - Capture and creation timestamps are wall-clock UTC (`chrono::DateTime<Utc>`)
//! - Frame `sequence` is per-source, starts at 0 and only increases

mod config;
mod detection;
mod engine;
mod error;
mod frame;
mod report;
mod shutdown;
mod source;
mod transport;

pub use config::*;
pub use detection::{BoundingBox, Detection, InferenceResult};
pub use engine::{InferenceEngine, Prediction};
pub use error::*;
pub use frame::{Frame, ImageData, ImageFormat};
pub use report::{ReportPayload, SealedReport};
pub use shutdown::StopSignal;
pub use source::{FrameSource, ReadOutcome};
pub use transport::{LocalReportTransport, ReportTransport};
