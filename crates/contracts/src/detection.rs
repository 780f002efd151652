//! Detection / InferenceResult - inference output

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ContractError, Frame};

/// Axis-aligned box in pixel coordinates, top-left then bottom-right.
///
/// Serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [f32; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One detected object. Immutable once built.
///
/// Construction and deserialization both reject a confidence outside `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDetection")]
pub struct Detection {
    label: String,
    confidence: f32,
    bbox: BoundingBox,
}

#[derive(Deserialize)]
struct RawDetection {
    label: String,
    confidence: f32,
    bbox: BoundingBox,
}

impl TryFrom<RawDetection> for Detection {
    type Error = ContractError;

    fn try_from(raw: RawDetection) -> Result<Self, Self::Error> {
        Detection::new(raw.label, raw.confidence, raw.bbox)
    }
}

impl Detection {
    /// # Errors
    /// Returns `ConfigValidation` when `confidence` is NaN or outside `[0, 1]`.
    pub fn new(
        label: impl Into<String>,
        confidence: f32,
        bbox: BoundingBox,
    ) -> Result<Self, ContractError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ContractError::config_validation(
                "detection.confidence",
                format!("confidence must be within [0, 1], got {confidence}"),
            ));
        }
        Ok(Self {
            label: label.into(),
            confidence,
            bbox,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }
}

/// Result of one successful inference call, referencing the source frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    /// Sequence index of the frame
    pub frame_id: u64,

    /// Producing source
    pub source_id: String,

    /// Capture time of the frame
    pub captured_at: DateTime<Utc>,

    /// Detections, in engine order
    pub detections: Vec<Detection>,

    /// Wall time spent in the engine
    pub inference_time_ms: f64,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl InferenceResult {
    pub fn from_frame(frame: &Frame, detections: Vec<Detection>, latency: Duration) -> Self {
        Self {
            frame_id: frame.sequence,
            source_id: frame.source_id.clone(),
            captured_at: frame.captured_at,
            detections,
            inference_time_ms: latency.as_secs_f64() * 1000.0,
            metadata: frame.metadata.clone(),
        }
    }

    pub fn has_detections(&self) -> bool {
        !self.detections.is_empty()
    }
}
