//! FrameSource trait - capture-side input interface
//!
//! Every source kind (folder, video, camera, network stream) implements the
//! same small capability set so the capture loop never needs to know which
//! one it is driving.

use crate::{ContractError, Frame, SourceType};

/// Result of one `read`
#[derive(Debug)]
pub enum ReadOutcome {
    /// The next frame in source order
    Frame(Frame),
    /// A finite, non-looping source has nothing more to give. Not an error.
    EndOfStream,
}

/// Frame source
///
/// Reads are blocking: file I/O, decode, device capture or network receive.
/// The capture loop calls them from a blocking thread.
pub trait FrameSource: Send {
    /// Source identifier stamped on every frame
    fn source_id(&self) -> &str;

    /// Source kind
    fn kind(&self) -> SourceType;

    /// Acquire the underlying resource.
    ///
    /// # Errors
    /// `SourceOpen` when the path, device or address is unusable.
    fn open(&mut self) -> Result<(), ContractError>;

    /// Produce the next frame.
    ///
    /// # Errors
    /// `SourceFatal` when the source cannot continue. Transient errors of
    /// reconnect-capable sources are handled internally.
    fn read(&mut self) -> Result<ReadOutcome, ContractError>;

    /// Release resources. Safe to call more than once.
    fn close(&mut self);

    /// Completion estimate in `[0, 1]`, non-decreasing.
    /// `None` for infinite (or looping) sources.
    fn progress(&self) -> Option<f64>;
}
