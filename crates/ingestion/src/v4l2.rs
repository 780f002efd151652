//! V4L2 capture for `/dev/videoN` cameras
//!
//! Asks the driver for Motion-JPEG and accepts packed RGB24 as a fallback;
//! any other pixel format is refused at open.

use contracts::{ContractError, ImageData, ImageFormat};
use ouroboros::self_referencing;
use tracing::{info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::decode::decode_jpeg;

const BUFFER_COUNT: u32 = 4;
const MJPG: &[u8; 4] = b"MJPG";
const RGB3: &[u8; 4] = b"RGB3";

#[self_referencing]
struct Streaming {
    device: Device,
    #[borrows(mut device)]
    #[covariant]
    stream: MmapStream<'this, Device>,
}

/// An open, streaming capture device
pub(crate) struct DeviceCapture {
    path: String,
    streaming: Streaming,
    fourcc: [u8; 4],
    width: u32,
    height: u32,
}

impl DeviceCapture {
    pub(crate) fn open(path: &str, native_fps: f64) -> Result<Self, ContractError> {
        let open_error = |e: std::io::Error| ContractError::source_open(path, e.to_string());

        let device = Device::with_path(path).map_err(open_error)?;
        let mut format = device.format().map_err(open_error)?;
        format.fourcc = FourCC::new(MJPG);
        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(e) => {
                warn!(device = path, error = %e, "Cannot select MJPEG, keeping driver format");
                device.format().map_err(open_error)?
            }
        };

        let fourcc = format.fourcc.repr;
        if &fourcc != MJPG && &fourcc != RGB3 {
            return Err(ContractError::source_open(
                path,
                format!(
                    "unsupported pixel format {}, need MJPG or RGB3",
                    String::from_utf8_lossy(&fourcc)
                ),
            ));
        }

        if native_fps >= 1.0 {
            let params = v4l::video::capture::Parameters::with_fps(native_fps.round() as u32);
            if let Err(e) = device.set_params(&params) {
                warn!(device = path, error = %e, "Cannot set frame rate");
            }
        }

        let streaming = StreamingTryBuilder {
            device,
            stream_builder: |device| MmapStream::with_buffers(device, Type::VideoCapture, BUFFER_COUNT),
        }
        .try_build()
        .map_err(open_error)?;

        info!(
            device = path,
            width = format.width,
            height = format.height,
            fourcc = %String::from_utf8_lossy(&fourcc),
            "V4L2 camera opened"
        );
        Ok(Self {
            path: path.to_string(),
            streaming,
            fourcc,
            width: format.width,
            height: format.height,
        })
    }

    /// Block until the driver hands over the next buffer
    pub(crate) fn capture(&mut self) -> Result<ImageData, ContractError> {
        let path = self.path.as_str();
        let frame = self.streaming.with_mut(|fields| {
            fields
                .stream
                .next()
                .map(|(buf, meta)| {
                    let used = (meta.bytesused as usize).min(buf.len());
                    let used = if used == 0 { buf.len() } else { used };
                    buf[..used].to_vec()
                })
                .map_err(|e| ContractError::source_read(path, e.to_string()))
        })?;

        if &self.fourcc == MJPG {
            return decode_jpeg(&frame, path)
                .map_err(|e| ContractError::source_read(path, e.to_string()));
        }

        let expected = self.width as usize * self.height as usize * 3;
        if frame.len() < expected {
            return Err(ContractError::source_read(
                path,
                format!("short RGB3 buffer: {} of {expected} bytes", frame.len()),
            ));
        }
        let mut pixels = frame;
        pixels.truncate(expected);
        Ok(ImageData::new(self.width, self.height, ImageFormat::Rgb8, pixels))
    }
}
