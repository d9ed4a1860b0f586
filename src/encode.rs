//! Frame encoder.
//!
//! Turns a [`RawFrame`] into a compact, transferable image payload: JPEG
//! compression first, then standard base64 text for embedding in a request
//! body. Exactly one `EncodedImage` is derived from one frame; the encoded
//! bytes never touch disk on the way to the inference client.
//!
//! Compression uses a fixed quality setting, so encoding the same frame
//! twice yields byte-identical payloads.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, Rgb};

use crate::frame::{PixelLayout, RawFrame};

/// Fixed JPEG quality so repeated encodes of one frame are deterministic.
const JPEG_QUALITY: u8 = 85;

/// Encoding kind of a transfer-ready image.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
}

impl ImageKind {
    /// MIME type for this encoding.
    pub fn mime(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
        }
    }
}

/// Compressed, transfer-ready rendering of one raw frame. Immutable;
/// consumed by request building.
pub struct EncodedImage {
    bytes: Vec<u8>,
    pub kind: ImageKind,
}

impl EncodedImage {
    /// Compressed image bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Standard base64 text of the compressed bytes.
    pub fn base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:<mime>;base64,<payload>` form of this image.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.kind.mime(), self.base64())
    }
}

/// Encode a raw frame as a JPEG still image.
///
/// Fails when the pixel buffer cannot be interpreted under its declared
/// layout or the JPEG encoder cannot produce a bitstream. Failures are
/// cycle-local; the controller logs them and moves on.
pub fn encode(frame: &RawFrame) -> Result<EncodedImage> {
    match frame.layout {
        PixelLayout::Rgb8 => {}
    }
    let img: ImageBuffer<Rgb<u8>, &[u8]> =
        ImageBuffer::from_raw(frame.width, frame.height, frame.pixels())
            .ok_or_else(|| anyhow!("pixel buffer inconsistent with {}x{} rgb8", frame.width, frame.height))?;

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&img)
        .context("encode frame as jpeg")?;
    if bytes.is_empty() {
        return Err(anyhow!("jpeg encoder produced an empty bitstream"));
    }

    Ok(EncodedImage {
        bytes,
        kind: ImageKind::Jpeg,
    })
}
