//! Motion-JPEG framing
//!
//! An MJPEG stream is a plain concatenation of JPEG images. Each image starts
//! with SOI (`FF D8`) and ends with EOI (`FF D9`); bytes between images are
//! ignored.
//!
//! The end of an image is found by walking its marker segments, so an EXIF
//! thumbnail (a whole JPEG inside APP1) does not end the outer frame. Data
//! that does not follow the segment layout is cut at the first EOI.

use std::ops::Range;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Upper bound for a single frame held by the splitter
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

fn find_marker(haystack: &[u8], marker: [u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker.as_slice())
}

/// First EOI at or after `from`, as an exclusive end offset
fn scan_to_eoi(data: &[u8], from: usize) -> Option<usize> {
    find_marker(data.get(from..)?, EOI).map(|offset| from + offset + 2)
}

/// Length of the JPEG that starts at `data[0]` (an SOI), or `None` while
/// the image is still incomplete
fn frame_end(data: &[u8]) -> Option<usize> {
    let mut pos = SOI.len();
    loop {
        if *data.get(pos)? != 0xFF {
            return scan_to_eoi(data, pos);
        }
        let marker = *data.get(pos + 1)?;
        match marker {
            // fill byte
            0xFF => {
                pos += 1;
                continue;
            }
            0xD9 => return Some(pos + 2),
            // standalone markers carry no length
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            0xD8 => return scan_to_eoi(data, pos + 2),
            _ => {}
        }

        let len = usize::from(u16::from_be_bytes([*data.get(pos + 2)?, *data.get(pos + 3)?]));
        if len < 2 {
            return scan_to_eoi(data, pos + 2);
        }
        pos += 2 + len;

        if marker == 0xDA {
            // entropy-coded data: stuffed zeros and restart markers belong to the scan
            loop {
                pos += data.get(pos..)?.iter().position(|&b| b == 0xFF)?;
                match *data.get(pos + 1)? {
                    0x00 | 0xD0..=0xD7 => pos += 2,
                    0xFF => pos += 1,
                    _ => break,
                }
            }
        }
    }
}

/// Byte ranges of every complete JPEG in `data`, in order
pub fn index_frames(data: &[u8]) -> Vec<Range<usize>> {
    let mut frames = Vec::new();
    let mut cursor = 0;
    while let Some(offset) = find_marker(&data[cursor..], SOI) {
        let start = cursor + offset;
        let Some(len) = frame_end(&data[start..]) else {
            break;
        };
        let end = start + len;
        frames.push(start..end);
        cursor = end;
    }
    frames
}

/// Incremental splitter for MJPEG arriving in arbitrary chunks
#[derive(Debug)]
pub struct MjpegSplitter {
    buffer: Vec<u8>,
    max_frame_bytes: usize,
}

impl Default for MjpegSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl MjpegSplitter {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_bytes,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pop the next complete JPEG, if one is buffered
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let Some(start) = find_marker(&self.buffer, SOI) else {
            // a trailing 0xFF may be the first half of the next SOI
            let keep = usize::from(self.buffer.last() == Some(&0xFF));
            let cut = self.buffer.len() - keep;
            self.buffer.drain(..cut);
            return None;
        };
        if start > 0 {
            self.buffer.drain(..start);
        }

        match frame_end(&self.buffer) {
            Some(end) => Some(self.buffer.drain(..end).collect()),
            None => {
                if self.buffer.len() > self.max_frame_bytes {
                    self.buffer.clear();
                }
                None
            }
        }
    }

    /// Drop partial data (after a reconnect)
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
