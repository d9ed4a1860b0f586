//! Stub camera source for tests and endpoint smoke runs.

use anyhow::{anyhow, Result};

use super::CameraSource;
use crate::frame::RawFrame;

/// Deterministic synthetic camera. Each frame is a gradient shifted by the
/// frame index, so consecutive frames differ but runs are reproducible.
pub struct StubCameraSource {
    width: u32,
    height: u32,
    available: bool,
    opened: bool,
    frame_index: u64,
}

impl StubCameraSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            available: true,
            opened: false,
            frame_index: 0,
        }
    }

    /// A camera that refuses to open. For exercising the unavailable path.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(64, 48)
        }
    }
}

impl Default for StubCameraSource {
    fn default() -> Self {
        Self::new(64, 48)
    }
}

impl CameraSource for StubCameraSource {
    fn open(&mut self) -> Result<()> {
        if !self.available {
            return Err(anyhow!("stub camera marked unavailable"));
        }
        self.opened = true;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<RawFrame>> {
        if !self.opened {
            return Err(anyhow!("stub camera not opened"));
        }
        let shift = (self.frame_index % 251) as u8;
        self.frame_index += 1;

        let mut pixels = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                pixels.push((x as u8).wrapping_add(shift));
                pixels.push((y as u8).wrapping_add(shift));
                pixels.push(shift);
            }
        }
        Ok(Some(RawFrame::rgb8(pixels, self.width, self.height)?))
    }

    fn release(&mut self) {
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_frames_after_open() {
        let mut source = StubCameraSource::new(8, 8);
        source.open().unwrap();
        let frame = source.read_frame().unwrap().unwrap();
        assert_eq!(frame.width, 8);
        assert_eq!(frame.height, 8);
    }

    #[test]
    fn consecutive_frames_differ() {
        let mut source = StubCameraSource::new(8, 8);
        source.open().unwrap();
        let a = crate::encode::encode(&source.read_frame().unwrap().unwrap()).unwrap();
        let b = crate::encode::encode(&source.read_frame().unwrap().unwrap()).unwrap();
        assert_ne!(a.bytes(), b.bytes());
    }

    #[test]
    fn unavailable_camera_fails_open() {
        let mut source = StubCameraSource::unavailable();
        assert!(source.open().is_err());
    }

    #[test]
    fn release_closes_the_handle() {
        let mut source = StubCameraSource::new(8, 8);
        source.open().unwrap();
        source.release();
        assert!(source.read_frame().is_err());
    }
}
