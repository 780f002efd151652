//! InferenceEngine trait - the model collaborator

use std::time::Duration;

use crate::{ContractError, Detection, ImageData};

/// Output of one `predict` call
#[derive(Debug, Clone, Default)]
pub struct Prediction {
    pub detections: Vec<Detection>,
    pub latency: Duration,
}

/// Synchronous inference backend.
///
/// Implementations are not assumed safe for concurrent calls; the capture
/// loop owns exactly one instance and calls it sequentially.
pub trait InferenceEngine: Send {
    /// Engine identifier (used for logging/metrics)
    fn name(&self) -> &str;

    /// Optional warm-up run before the first real frame
    fn warm_up(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    /// Run the model on one image.
    ///
    /// # Errors
    /// `Inference` on malformed input or backend fault.
    fn predict(&mut self, image: &ImageData) -> Result<Prediction, ContractError>;
}
