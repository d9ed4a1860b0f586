//! HTTP camera source.
//!
//! Connects to cameras that serve JPEG over HTTP in one of two forms:
//! a multipart MJPEG stream, or a snapshot URL returning one JPEG per GET.
//! The form is sniffed from the Content-Type of the initial response.
//!
//! Frames are decoded to RGB8 in memory and handed off immediately; the
//! source retains nothing beyond the stream handle and a carry-over buffer
//! for MJPEG boundary scanning.

use std::io::Read;

use anyhow::{anyhow, Context, Result};
use url::Url;

use super::CameraSource;
use crate::frame::RawFrame;

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

/// Configuration for an HTTP camera.
#[derive(Clone, Debug)]
pub struct HttpCameraConfig {
    /// Camera URL. http(s) only.
    pub url: String,
}

/// HTTP camera source. MJPEG stream or single-JPEG snapshot endpoint.
pub struct HttpCameraSource {
    config: HttpCameraConfig,
    stream: Option<HttpStream>,
    frame_count: u64,
}

enum HttpStream {
    Mjpeg(MjpegStream),
    SingleJpeg,
}

impl HttpCameraSource {
    pub fn new(config: HttpCameraConfig) -> Result<Self> {
        let url = Url::parse(&config.url).context("parse camera url")?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported camera scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        Ok(Self {
            config,
            stream: None,
            frame_count: 0,
        })
    }

    /// Frames produced since open.
    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}

impl CameraSource for HttpCameraSource {
    fn open(&mut self) -> Result<()> {
        let response = ureq::get(&self.config.url)
            .call()
            .context("connect to http camera")?;
        let content_type = response.header("Content-Type").unwrap_or("");
        if content_type.to_lowercase().contains("multipart") {
            let reader = response.into_reader();
            self.stream = Some(HttpStream::Mjpeg(MjpegStream::new(reader)));
        } else {
            self.stream = Some(HttpStream::SingleJpeg);
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<RawFrame>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow!("http camera not opened; call open() first"))?;

        let jpeg_bytes = match stream {
            HttpStream::Mjpeg(stream) => stream.read_next_jpeg()?,
            HttpStream::SingleJpeg => match fetch_single_jpeg(&self.config.url) {
                Ok(bytes) => bytes,
                Err(err) => {
                    // Snapshot endpoints fail transiently; skip the cycle.
                    log::warn!("snapshot fetch failed: {:#}", err);
                    return Ok(None);
                }
            },
        };

        match decode_jpeg(&jpeg_bytes) {
            Ok(frame) => {
                self.frame_count += 1;
                Ok(Some(frame))
            }
            Err(err) => {
                // A truncated JPEG mid-stream is not worth ending the episode.
                log::warn!("dropping undecodable frame: {:#}", err);
                Ok(None)
            }
        }
    }

    fn release(&mut self) {
        self.stream = None;
    }
}

struct MjpegStream {
    reader: Box<dyn Read + Send>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    fn read_next_jpeg(&mut self) -> Result<Vec<u8>> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(frame);
            }

            let read = self.reader.read(&mut chunk).context("read mjpeg chunk")?;
            if read == 0 {
                return Err(anyhow!("mjpeg stream ended"));
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let keep = 2.min(self.buffer.len());
                let drain_len = self.buffer.len() - keep;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

fn fetch_single_jpeg(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("fetch jpeg snapshot from {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .context("read jpeg snapshot")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty jpeg snapshot"));
    }
    Ok(bytes)
}

fn decode_jpeg(bytes: &[u8]) -> Result<RawFrame> {
    let image = image::load_from_memory(bytes).context("decode jpeg")?;
    let rgb = image.into_rgb8();
    let (width, height) = rgb.dimensions();
    RawFrame::rgb8(rgb.into_raw(), width, height)
}

/// Scan for one complete JPEG (SOI .. EOI) in the carry-over buffer.
fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let mut start = None;
    let mut i = 0;
    while i + 1 < buffer.len() {
        if buffer[i] == 0xFF && buffer[i + 1] == 0xD8 {
            start = Some(i);
            break;
        }
        i += 1;
    }
    let start = start?;
    let mut j = start + 2;
    while j + 1 < buffer.len() {
        if buffer[j] == 0xFF && buffer[j + 1] == 0xD9 {
            return Some((start, j + 2));
        }
        j += 1;
    }
    None
}
