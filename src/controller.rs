//! Capture loop controller.
//!
//! Drives the cycle: pull a frame from the camera collaborator, encode it,
//! run the infer-with-fallback policy, publish the outcome to the display
//! collaborator, wait a fixed interval, repeat. Cycles are strictly
//! sequential; captions are published in acquisition order because no cycle
//! starts before the previous publish completes.
//!
//! The loop's liveness is the primary invariant: every per-cycle failure is
//! converted to a diagnostic outcome at the cycle boundary and the loop
//! moves on. Only two things end a running episode: an external stop
//! signal, or an unrecoverable camera read failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::caption::{CaptionClient, CaptionResult};
use crate::encode;
use crate::frame::RawFrame;
use crate::source::CameraSource;

/// Controller lifecycle. `Stopped` is terminal for a given camera handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Running,
    Stopped,
}

/// Per-cycle failure kinds surfaced as diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleError {
    /// Frame could not be turned into a transferable image.
    Encode(String),
    /// The final inference attempt failed at the transport level (the
    /// fallback attempt's result is what a cycle reports).
    Transport(String),
    /// Responses arrived on both attempts but carried no caption.
    NoCaption,
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleError::Encode(detail) => write!(f, "encode failed: {}", detail),
            CycleError::Transport(detail) => write!(f, "inference transport failed: {}", detail),
            CycleError::NoCaption => write!(f, "no caption generated"),
        }
    }
}

/// What one loop iteration reports to the display collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Accepted caption, verbatim.
    Caption(String),
    /// Diagnostic for a recovered per-cycle failure.
    Diagnostic(CycleError),
}

/// Display collaborator interface. Best-effort, fire-and-forget: the
/// controller never waits on rendering and never observes sink failures.
pub trait CaptionSink: Send {
    fn publish(&self, outcome: &CycleOutcome);
}

/// Sink that writes outcomes through the log facade.
pub struct LogSink;

impl CaptionSink for LogSink {
    fn publish(&self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Caption(text) => log::info!("caption: {}", text),
            CycleOutcome::Diagnostic(err) => log::warn!("cycle diagnostic: {}", err),
        }
    }
}

/// Capture loop settings.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Fixed wait between cycles.
    pub interval: Duration,
    /// Stop after this many cycles. `None` runs until the stop signal.
    pub max_cycles: Option<u64>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_cycles: None,
        }
    }
}

/// Orchestrates one capture episode over an exclusively-owned camera handle.
pub struct CaptureController {
    source: Box<dyn CameraSource>,
    client: CaptionClient,
    sink: Box<dyn CaptionSink>,
    config: CaptureConfig,
    stop: Arc<AtomicBool>,
    state: ControllerState,
    cycles_completed: u64,
}

impl CaptureController {
    pub fn new(
        source: Box<dyn CameraSource>,
        client: CaptionClient,
        sink: Box<dyn CaptionSink>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            source,
            client,
            sink,
            config,
            stop: Arc::new(AtomicBool::new(false)),
            state: ControllerState::Idle,
            cycles_completed: 0,
        }
    }

    /// Shared stop signal. Setting it ends the episode at the next cycle
    /// boundary; an in-flight inference call is not interrupted.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Cycles that ran to their publish step (successful or diagnostic).
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    /// Run one capture episode: open the camera, cycle until stopped, then
    /// release.
    ///
    /// An unopenable camera leaves the controller in `Idle` with zero
    /// cycles attempted and surfaces the failure to the caller.
    pub fn run(&mut self) -> Result<()> {
        match self.state {
            ControllerState::Idle => {}
            other => {
                return Err(anyhow::anyhow!(
                    "controller cannot start from {:?}; a fresh handle is required",
                    other
                ))
            }
        }

        self.source.open().context("open camera")?;
        self.state = ControllerState::Running;
        log::info!(
            "capture episode started (interval {} ms)",
            self.config.interval.as_millis()
        );

        let episode = self.cycle_loop();

        self.source.release();
        self.state = ControllerState::Stopped;
        log::info!(
            "capture episode stopped after {} cycles",
            self.cycles_completed
        );
        episode
    }

    fn cycle_loop(&mut self) -> Result<()> {
        loop {
            if self.episode_over() {
                return Ok(());
            }

            match self.run_cycle() {
                Ok(()) => {}
                // Camera read failures are the one unrecoverable case.
                Err(err) => {
                    log::error!("camera read failed, ending episode: {:#}", err);
                    return Err(err);
                }
            }

            // Re-check before sleeping so a finished episode does not
            // wait out one more interval after its last publish.
            if self.episode_over() {
                return Ok(());
            }
            self.wait_interval();
        }
    }

    fn episode_over(&self) -> bool {
        if self.stop.load(Ordering::Relaxed) {
            return true;
        }
        matches!(self.config.max_cycles, Some(max) if self.cycles_completed >= max)
    }

    /// One cycle. `Err` only for an unrecoverable camera read failure;
    /// everything downstream of acquisition is caught here and published
    /// as a diagnostic.
    fn run_cycle(&mut self) -> Result<()> {
        let frame = match self.source.read_frame().context("read camera frame")? {
            Some(frame) => frame,
            None => {
                log::debug!("no frame available this cycle");
                return Ok(());
            }
        };

        let outcome = self.caption_frame(&frame);
        self.sink.publish(&outcome);
        self.cycles_completed += 1;
        Ok(())
    }

    fn caption_frame(&self, frame: &RawFrame) -> CycleOutcome {
        let image = match encode::encode(frame) {
            Ok(image) => image,
            Err(err) => return CycleOutcome::Diagnostic(CycleError::Encode(format!("{:#}", err))),
        };

        match self.client.infer_with_fallback(&image) {
            CaptionResult::Caption(text) => CycleOutcome::Caption(text),
            CaptionResult::NoCaption => CycleOutcome::Diagnostic(CycleError::NoCaption),
            CaptionResult::TransportError(detail) => {
                CycleOutcome::Diagnostic(CycleError::Transport(detail))
            }
        }
    }

    /// Fixed inter-cycle wait, sliced so a stop request is noticed without
    /// waiting out the full interval.
    fn wait_interval(&self) {
        let deadline = Instant::now() + self.config.interval;
        while !self.stop.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let remaining = deadline - now;
            std::thread::sleep(remaining.min(Duration::from_millis(100)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_diagnostics_are_distinguishable() {
        let encode = CycleError::Encode("bad buffer".into()).to_string();
        let transport = CycleError::Transport("connection refused".into()).to_string();
        let no_caption = CycleError::NoCaption.to_string();
        assert!(encode.contains("encode"));
        assert!(transport.contains("transport"));
        assert_eq!(no_caption, "no caption generated");
    }

    #[test]
    fn default_interval_matches_caption_cadence() {
        let config = CaptureConfig::default();
        assert_eq!(config.interval, Duration::from_millis(2000));
        assert!(config.max_cycles.is_none());
    }
}
