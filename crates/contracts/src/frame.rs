//! Frame - source output
//!
//! One captured or decoded image plus where and when it came from.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decoded image buffer
#[derive(Clone)]
pub struct ImageData {
    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Pixel layout
    pub format: ImageFormat,

    /// Raw pixel data, row-major, tightly packed
    pub data: Bytes,
}

impl ImageData {
    /// Create an image buffer
    pub fn new(width: u32, height: u32, format: ImageFormat, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            format,
            data: data.into(),
        }
    }

    /// Number of bytes a well-formed buffer of this size must hold
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Whether the buffer length matches the declared geometry
    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_len()
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Rgb8,
    Rgba8,
    Luma8,
}

impl ImageFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
            Self::Luma8 => 1,
        }
    }
}

/// A frame produced by a source read.
///
/// Consumed once by the capture loop and never persisted.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded image
    pub image: ImageData,

    /// Wall-clock capture (or decode) time
    pub captured_at: DateTime<Utc>,

    /// Per-source sequence index, strictly increasing
    pub sequence: u64,

    /// Identifier of the producing source
    pub source_id: String,

    /// Origin details (file name, stream position, ...)
    pub metadata: BTreeMap<String, String>,
}

impl Frame {
    pub fn new(image: ImageData, sequence: u64, source_id: impl Into<String>) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
            sequence,
            source_id: source_id.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach one metadata entry
    pub fn with_meta(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }
}
