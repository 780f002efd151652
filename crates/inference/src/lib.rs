//! # Inference
//!
//! Engine construction for the capture loop. Real model backends plug in via
//! [`EngineRegistry::register`]; the built-in `stub` engine returns fixed
//! detections.

mod registry;
mod stub;

pub use registry::{create_engine, EngineConstructor, EngineRegistry};
pub use stub::{StubEngine, StubMode};
