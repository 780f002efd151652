//! Source construction from configuration

use contracts::{ContractError, FrameSource, SourceConfig, SourceType, StopSignal};
use tracing::debug;

use crate::camera::CameraSource;
use crate::folder::FolderSource;
use crate::network::{NetworkStreamSource, ReconnectPolicy};
use crate::video::VideoSource;

/// Build the source selected by `config.source_type` (not yet opened)
pub fn create_source(
    config: &SourceConfig,
    stop: &StopSignal,
) -> Result<Box<dyn FrameSource>, ContractError> {
    if config.path.trim().is_empty() {
        return Err(ContractError::source_open("<empty>", "source path is empty"));
    }

    debug!(source_type = %config.source_type, path = %config.path, "Creating source");
    let source: Box<dyn FrameSource> = match config.source_type {
        SourceType::Folder => Box::new(FolderSource::new(
            &config.path,
            &config.extensions,
            config.looping,
        )),
        SourceType::Video => Box::new(VideoSource::new(
            &config.path,
            config.native_fps,
            config.rate_limit,
            config.looping,
        )),
        SourceType::Camera => Box::new(CameraSource::new(
            config.path.clone(),
            config.native_fps,
            stop.clone(),
        )),
        SourceType::NetworkStream => Box::new(NetworkStreamSource::new(
            config.path.clone(),
            ReconnectPolicy::from_config(config),
            stop.clone(),
        )),
    };
    Ok(source)
}
