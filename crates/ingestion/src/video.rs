//! Video file source
//!
//! Reads Motion-JPEG files (`.mjpeg` / `.mjpg`). The whole file is indexed at
//! `open`, then frames are decoded lazily. When a rate limit below the native
//! frame rate is configured, frames are decimated with a fixed step so that
//! playback keeps its real-time position instead of slowing down.

use std::ops::Range;
use std::path::PathBuf;

use contracts::{ContractError, Frame, FrameSource, ReadOutcome, SourceType};
use tracing::{debug, info, warn};

use crate::decode::decode_jpeg;
use crate::mjpeg::index_frames;

const SUPPORTED_EXTENSIONS: [&str; 2] = ["mjpeg", "mjpg"];

/// Decimation step for a `native` fps stream read at `rate` fps
///
/// `rate == 0` means unpaced, so every frame is kept.
pub fn decimation_step(native_fps: f64, rate: f64) -> usize {
    if rate <= 0.0 || native_fps <= rate {
        return 1;
    }
    ((native_fps / rate).round() as usize).max(1)
}

/// MJPEG video source
pub struct VideoSource {
    source_id: String,
    path: PathBuf,
    looping: bool,
    step: usize,
    native_fps: f64,
    data: Vec<u8>,
    frames: Vec<Range<usize>>,
    /// Index of the next frame to decode
    position: usize,
    sequence: u64,
    opened: bool,
}

impl VideoSource {
    pub fn new(path: impl Into<PathBuf>, native_fps: f64, rate_limit: f64, looping: bool) -> Self {
        let path = path.into();
        Self {
            source_id: path.display().to_string(),
            path,
            looping,
            step: decimation_step(native_fps, rate_limit),
            native_fps,
            data: Vec::new(),
            frames: Vec::new(),
            position: 0,
            sequence: 0,
            opened: false,
        }
    }

    /// Frames in the container
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn step(&self) -> usize {
        self.step
    }

    fn advance(&mut self) {
        self.position += self.step;
    }
}

impl FrameSource for VideoSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn kind(&self) -> SourceType {
        SourceType::Video
    }

    fn open(&mut self) -> Result<(), ContractError> {
        let supported = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !supported {
            return Err(ContractError::source_open(
                &self.source_id,
                format!("unsupported container, expected one of {SUPPORTED_EXTENSIONS:?}"),
            ));
        }

        let data = std::fs::read(&self.path)
            .map_err(|e| ContractError::source_open(&self.source_id, e.to_string()))?;
        let frames = index_frames(&data);
        if frames.is_empty() {
            return Err(ContractError::source_open(
                &self.source_id,
                "no JPEG frames found in file",
            ));
        }

        info!(
            source = %self.source_id,
            frames = frames.len(),
            native_fps = self.native_fps,
            step = self.step,
            "Video source opened"
        );
        self.data = data;
        self.frames = frames;
        self.position = 0;
        self.opened = true;
        Ok(())
    }

    fn read(&mut self) -> Result<ReadOutcome, ContractError> {
        if !self.opened {
            return Err(ContractError::source_fatal(
                &self.source_id,
                "read on a closed source",
            ));
        }

        let mut failures = 0usize;
        loop {
            if self.position >= self.frames.len() {
                if !self.looping {
                    return Ok(ReadOutcome::EndOfStream);
                }
                debug!(source = %self.source_id, "Video source rewound");
                self.position = 0;
            }

            let index = self.position;
            let range = self.frames[index].clone();
            self.advance();

            match decode_jpeg(&self.data[range], &format!("frame#{index}")) {
                Ok(image) => {
                    let frame = Frame::new(image, self.sequence, &self.source_id)
                        .with_meta("frame_index", index)
                        .with_meta("position_secs", format!("{:.3}", index as f64 / self.native_fps));
                    self.sequence += 1;
                    return Ok(ReadOutcome::Frame(frame));
                }
                Err(e) => {
                    warn!(source = %self.source_id, error = %e, "Skipping corrupt video frame");
                    failures += 1;
                    if self.looping && failures >= self.frames.len() {
                        return Err(ContractError::source_fatal(
                            &self.source_id,
                            "no decodable frame in video",
                        ));
                    }
                }
            }
        }
    }

    fn close(&mut self) {
        if self.opened {
            debug!(source = %self.source_id, "Video source closed");
        }
        self.opened = false;
        self.data = Vec::new();
        self.frames.clear();
    }

    fn progress(&self) -> Option<f64> {
        if self.looping || self.frames.is_empty() {
            return None;
        }
        Some(self.position.min(self.frames.len()) as f64 / self.frames.len() as f64)
    }
}
