//! # Reporter
//!
//! Uplink of the edge agent.
//!
//! - Accepts `InferenceResult`s through a bounded intake queue
//! - Seals them into batches by size or interval
//! - Delivers each batch with retry and exponential backoff
//! - Caches undeliverable batches and drains the cache later
//!
//! A single worker task owns the transport, so fresh batches and cache
//! drain never send concurrently.

pub mod batch;
pub mod error;
pub mod handle;
pub mod intake;
pub mod metrics;
pub mod retry;
pub mod transport;
mod worker;

pub use batch::BatchAccumulator;
pub use contracts::{ReportTransport, SealedReport};
pub use error::ReporterError;
pub use handle::{spawn_from_config, ReporterHandle};
pub use intake::{intake, IntakeReceiver, IntakeSender, SubmitOutcome};
pub use metrics::{ReporterMetrics, ReporterSnapshot};
pub use retry::RetryPolicy;
pub use transport::{is_retryable_status, AnyTransport, HttpTransport, LogTransport};
