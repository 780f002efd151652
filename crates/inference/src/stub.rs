//! Stub engine
//!
//! Returns fixed detections without running a model. Used for demos, dry runs
//! and tests.

use std::str::FromStr;
use std::time::Instant;

use contracts::{BoundingBox, ContractError, Detection, ImageData, InferenceEngine, Prediction};
use tracing::debug;

/// Fixed output of the stub engine: label, confidence, bbox
const FIXED_DETECTIONS: [(&str, f32, [f32; 4]); 3] = [
    ("crack", 0.95, [100.0, 150.0, 300.0, 400.0]),
    ("rust", 0.88, [450.0, 200.0, 550.0, 350.0]),
    ("deformation", 0.72, [200.0, 500.0, 400.0, 650.0]),
];

/// Stub behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StubMode {
    /// Fixed detections filtered by confidence
    #[default]
    Normal,
    /// Never detects anything
    Empty,
    /// Every prediction fails
    Error,
}

impl FromStr for StubMode {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "normal" => Ok(Self::Normal),
            "empty" => Ok(Self::Empty),
            "error" => Ok(Self::Error),
            other => Err(ContractError::config_validation(
                "inference.engine",
                format!("unknown stub mode '{other}', expected normal, empty or error"),
            )),
        }
    }
}

#[derive(Debug)]
pub struct StubEngine {
    name: String,
    mode: StubMode,
    confidence_threshold: f32,
    calls: u64,
}

impl StubEngine {
    pub fn new(mode: StubMode, confidence_threshold: f32) -> Self {
        let name = match mode {
            StubMode::Normal => "stub".to_string(),
            StubMode::Empty => "stub:empty".to_string(),
            StubMode::Error => "stub:error".to_string(),
        };
        Self {
            name,
            mode,
            confidence_threshold,
            calls: 0,
        }
    }

    pub fn mode(&self) -> StubMode {
        self.mode
    }

    /// Number of `predict` calls so far
    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn detections(&self) -> Result<Vec<Detection>, ContractError> {
        FIXED_DETECTIONS
            .iter()
            .filter(|(_, confidence, _)| *confidence >= self.confidence_threshold)
            .map(|(label, confidence, bbox)| {
                Detection::new(*label, *confidence, BoundingBox::from(*bbox))
            })
            .collect()
    }
}

impl InferenceEngine for StubEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn warm_up(&mut self) -> Result<(), ContractError> {
        debug!(engine = %self.name, "Stub warm-up");
        Ok(())
    }

    fn predict(&mut self, image: &ImageData) -> Result<Prediction, ContractError> {
        let started = Instant::now();
        self.calls += 1;

        if !image.is_well_formed() {
            return Err(ContractError::inference(
                &self.name,
                format!(
                    "malformed image: {}x{} with {} bytes",
                    image.width,
                    image.height,
                    image.data.len()
                ),
            ));
        }

        let detections = match self.mode {
            StubMode::Error => {
                return Err(ContractError::inference(&self.name, "simulated failure"));
            }
            StubMode::Empty => Vec::new(),
            StubMode::Normal => self.detections()?,
        };

        Ok(Prediction {
            detections,
            latency: started.elapsed(),
        })
    }
}
