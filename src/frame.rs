//! Raw frame container.
//!
//! A `RawFrame` is one sample from the camera collaborator: a decoded pixel
//! buffer plus dimensions. Frames are owned exclusively by the cycle that
//! captured them and are discarded after encoding.
//!
//! Pixel bytes are private; the only consumer is the frame encoder. Camera
//! sources construct frames through [`RawFrame::rgb8`], which rejects empty
//! or inconsistent buffers so that no partial frame ever reaches encoding.

use anyhow::{anyhow, Result};

/// Pixel layout of a raw frame buffer.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    /// 8-bit RGB, 3 bytes per pixel, row-major.
    Rgb8,
}

impl PixelLayout {
    /// Bytes per pixel for this layout.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgb8 => 3,
        }
    }
}

/// One sample from the camera at a point in time.
pub struct RawFrame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
}

impl RawFrame {
    /// Create an RGB8 frame. Fails on zero dimensions or a buffer whose
    /// length does not match `width * height * 3`.
    pub fn rgb8(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!(
                "frame dimensions must be non-zero ({}x{})",
                width,
                height
            ));
        }
        let expected = width as usize * height as usize * PixelLayout::Rgb8.bytes_per_pixel();
        if pixels.len() != expected {
            return Err(anyhow!(
                "rgb8 buffer length {} does not match {}x{} (expected {})",
                pixels.len(),
                width,
                height,
                expected
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            layout: PixelLayout::Rgb8,
        })
    }

    /// Pixel bytes. Crate-internal; only the encoder reads them.
    pub(crate) fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}
