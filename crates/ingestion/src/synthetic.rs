//! Synthetic test pattern
//!
//! Deterministic frames for sources without real hardware.

use bytes::Bytes;
use contracts::{ImageData, ImageFormat};

/// Moving diagonal gradient generator
#[derive(Debug, Clone)]
pub struct TestPattern {
    width: u32,
    height: u32,
}

impl TestPattern {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Render frame `index`; the gradient shifts one pixel per frame
    pub fn render(&self, index: u64) -> ImageData {
        let shift = (index % 256) as u32;
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                let r = ((x + shift) % 256) as u8;
                let g = ((y + shift) % 256) as u8;
                let b = ((x + y) % 256) as u8;
                data.extend_from_slice(&[r, g, b]);
            }
        }
        ImageData::new(self.width, self.height, ImageFormat::Rgb8, Bytes::from(data))
    }
}
