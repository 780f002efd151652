//! # Agent
//!
//! Orchestrator of the edge agent.
//!
//! Owns one source, one inference engine and the reporter for the lifetime
//! of a run:
//! - INIT: open the source, build and warm up the engine, spawn the reporter
//! - RUNNING: capture-and-infer on a blocking thread, results into the
//!   reporter intake
//! - DRAINING: stop reading, force-seal and flush the open batch
//! - STOPPED: source closed, cache closed

pub mod capture;
pub mod error;
pub mod orchestrator;
pub mod state;
pub mod stats;

pub use capture::{CaptureExit, CaptureLoop, StopReason};
pub use error::AgentError;
pub use orchestrator::{Agent, RunReport};
pub use state::{AgentState, StateMachine};
pub use stats::AgentStats;
