//! Camera source
//!
//! Infinite source with two backends:
//! - `stub://<name>`: a synthetic test pattern at the configured native frame
//!   rate, blocking between frames like a real device would
//! - `/dev/videoN`: a V4L2 device, available when built with the `v4l2`
//!   feature

use std::time::{Duration, Instant};

use contracts::{ContractError, Frame, FrameSource, ReadOutcome, SourceType, StopSignal};
use tracing::{debug, info};

use crate::pacing::MAX_PACING_INTERVAL;
use crate::synthetic::TestPattern;

const STUB_SCHEME: &str = "stub://";
const DEVICE_PREFIX: &str = "/dev/";
const STUB_WIDTH: u32 = 320;
const STUB_HEIGHT: u32 = 240;

enum Backend {
    Stub(TestPattern),
    #[cfg(feature = "v4l2")]
    Device(crate::v4l2::DeviceCapture),
}

/// Camera device source
pub struct CameraSource {
    source_id: String,
    native_fps: f64,
    frame_interval: Duration,
    stop: StopSignal,
    backend: Option<Backend>,
    next_due: Option<Instant>,
    sequence: u64,
}

impl CameraSource {
    pub fn new(device: impl Into<String>, native_fps: f64, stop: StopSignal) -> Self {
        let frame_interval = if native_fps > 0.0 {
            Duration::try_from_secs_f64(1.0 / native_fps)
                .map_or(MAX_PACING_INTERVAL, |d| d.min(MAX_PACING_INTERVAL))
        } else {
            Duration::ZERO
        };
        Self {
            source_id: device.into(),
            native_fps,
            frame_interval,
            stop,
            backend: None,
            next_due: None,
            sequence: 0,
        }
    }

    fn open_stub(&self, name: &str) -> Result<Backend, ContractError> {
        if name.is_empty() {
            return Err(ContractError::source_open(
                &self.source_id,
                "stub camera needs a name",
            ));
        }
        info!(
            source = %self.source_id,
            width = STUB_WIDTH,
            height = STUB_HEIGHT,
            interval_ms = self.frame_interval.as_millis() as u64,
            "Synthetic camera opened"
        );
        Ok(Backend::Stub(TestPattern::new(STUB_WIDTH, STUB_HEIGHT)))
    }

    #[cfg(feature = "v4l2")]
    fn open_device(&self) -> Result<Backend, ContractError> {
        crate::v4l2::DeviceCapture::open(&self.source_id, self.native_fps).map(Backend::Device)
    }

    #[cfg(not(feature = "v4l2"))]
    fn open_device(&self) -> Result<Backend, ContractError> {
        debug!(source = %self.source_id, native_fps = self.native_fps, "No device backend");
        Err(ContractError::source_open(
            &self.source_id,
            "built without the v4l2 feature, only stub://<name> cameras are available",
        ))
    }
}

/// Hold the synthetic camera to its native frame rate; `false` on stop
fn wait_for_frame(next_due: &mut Option<Instant>, interval: Duration, stop: &StopSignal) -> bool {
    if let Some(due) = *next_due {
        let now = Instant::now();
        if due > now && stop.wait_timeout(due - now) {
            return false;
        }
    }
    *next_due = Some(Instant::now() + interval);
    true
}

impl FrameSource for CameraSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn kind(&self) -> SourceType {
        SourceType::Camera
    }

    fn open(&mut self) -> Result<(), ContractError> {
        let backend = if let Some(name) = self.source_id.strip_prefix(STUB_SCHEME) {
            self.open_stub(name)?
        } else if self.source_id.starts_with(DEVICE_PREFIX) {
            self.open_device()?
        } else {
            return Err(ContractError::source_open(
                &self.source_id,
                format!("unknown camera, expected {STUB_SCHEME}<name> or {DEVICE_PREFIX}videoN"),
            ));
        };
        self.backend = Some(backend);
        self.next_due = None;
        Ok(())
    }

    fn read(&mut self) -> Result<ReadOutcome, ContractError> {
        let (image, backend) = match self.backend.as_mut() {
            None => {
                return Err(ContractError::source_fatal(
                    &self.source_id,
                    "read on a closed camera",
                ));
            }
            Some(Backend::Stub(pattern)) => {
                if !wait_for_frame(&mut self.next_due, self.frame_interval, &self.stop) {
                    return Err(ContractError::source_read(
                        &self.source_id,
                        "stopped while waiting for frame",
                    ));
                }
                (pattern.render(self.sequence), "stub")
            }
            #[cfg(feature = "v4l2")]
            Some(Backend::Device(device)) => {
                if self.stop.is_triggered() {
                    return Err(ContractError::source_read(&self.source_id, "stopped"));
                }
                (device.capture()?, "v4l2")
            }
        };

        let frame = Frame::new(image, self.sequence, &self.source_id).with_meta("backend", backend);
        self.sequence += 1;
        Ok(ReadOutcome::Frame(frame))
    }

    fn close(&mut self) {
        if self.backend.take().is_some() {
            debug!(source = %self.source_id, "Camera closed");
        }
    }

    fn progress(&self) -> Option<f64> {
        None
    }
}
