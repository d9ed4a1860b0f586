//! Camera frame sources.
//!
//! The camera device is an external collaborator; the pipeline only needs
//! the narrow interface below. Sources produce [`RawFrame`] instances on
//! demand and report open/closed/unavailable status. Acquisition cadence
//! is owned by the capture controller, not the source.
//!
//! Implementations:
//! - [`HttpCameraSource`]: HTTP cameras serving multipart MJPEG or
//!   single-JPEG snapshots.
//! - [`StubCameraSource`]: deterministic synthetic frames for tests and
//!   endpoint smoke runs.

mod http;
mod stub;

pub use http::{HttpCameraConfig, HttpCameraSource};
pub use stub::StubCameraSource;

use anyhow::Result;

use crate::frame::RawFrame;

/// Camera collaborator interface.
///
/// The handle is exclusively owned by the capture controller for the
/// lifetime of a running episode.
pub trait CameraSource: Send {
    /// Acquire the device. `Err` means unavailable; the episode never
    /// starts.
    fn open(&mut self) -> Result<()>;

    /// Read the next frame. `Ok(None)` means no frame was available this
    /// cycle (skip and retry after the delay); `Err` is an unrecoverable
    /// read failure that ends the episode.
    fn read_frame(&mut self) -> Result<Option<RawFrame>>;

    /// Release the device. Terminal for this handle.
    fn release(&mut self);
}
