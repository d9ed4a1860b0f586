//! camcaption - camera frame-to-caption pipeline.
//!
//! The core is the repeated cycle of acquire a frame, encode it, call a
//! remote captioning inference endpoint, interpret the response, recover
//! from failure, and throttle the next attempt. Data flows one direction
//! per cycle:
//!
//! camera source -> [`encode`] -> [`caption::CaptionClient`] ->
//! [`controller::CaptureController`] -> display sink
//!
//! The camera device and the display surface are external collaborators,
//! reached only through the [`source::CameraSource`] and
//! [`controller::CaptionSink`] traits. No component holds state across
//! cycles beyond the controller's own lifecycle.

pub mod caption;
pub mod config;
pub mod controller;
pub mod encode;
pub mod frame;
pub mod source;

pub use caption::{CaptionClient, CaptionResult, CaptionTransport, HttpTransport, PayloadShape};
pub use config::CamcaptionConfig;
pub use controller::{
    CaptionSink, CaptureConfig, CaptureController, ControllerState, CycleError, CycleOutcome,
    LogSink,
};
pub use encode::{encode, EncodedImage, ImageKind};
pub use frame::{PixelLayout, RawFrame};
pub use source::{CameraSource, HttpCameraConfig, HttpCameraSource, StubCameraSource};
