//! End-to-end capture loop behavior with a mocked wire transport.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use camcaption::{
    encode, CameraSource, CaptionClient, CaptionResult, CaptionSink, CaptionTransport,
    CaptureConfig, CaptureController, ControllerState, CycleError, CycleOutcome, PayloadShape,
    RawFrame, StubCameraSource,
};

/// One scripted transport behavior per call, cycling when exhausted.
#[derive(Clone)]
enum Script {
    Body(&'static str),
    Fail(&'static str),
}

struct ScriptedTransport {
    script: Vec<Script>,
    calls: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Script>) -> Self {
        Self {
            script,
            calls: Arc::new(AtomicUsize::new(0)),
            bodies: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn body_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.bodies)
    }
}

impl CaptionTransport for ScriptedTransport {
    fn post_json(&self, body: &str) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies.lock().unwrap().push(body.to_string());
        match &self.script[call % self.script.len()] {
            Script::Body(text) => Ok((*text).to_string()),
            Script::Fail(reason) => Err(anyhow!("{}", reason)),
        }
    }
}

struct RecordingSink {
    outcomes: Arc<Mutex<Vec<CycleOutcome>>>,
}

impl RecordingSink {
    fn new() -> (Self, Arc<Mutex<Vec<CycleOutcome>>>) {
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                outcomes: Arc::clone(&outcomes),
            },
            outcomes,
        )
    }
}

impl CaptionSink for RecordingSink {
    fn publish(&self, outcome: &CycleOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }
}

fn controller_with(
    script: Vec<Script>,
    max_cycles: u64,
) -> (
    CaptureController,
    Arc<AtomicUsize>,
    Arc<Mutex<Vec<String>>>,
    Arc<Mutex<Vec<CycleOutcome>>>,
) {
    let transport = ScriptedTransport::new(script);
    let calls = transport.call_counter();
    let bodies = transport.body_log();
    let client = CaptionClient::new(Box::new(transport));
    let (sink, outcomes) = RecordingSink::new();
    let controller = CaptureController::new(
        Box::new(StubCameraSource::new(16, 16)),
        client,
        Box::new(sink),
        CaptureConfig {
            interval: Duration::from_millis(1),
            max_cycles: Some(max_cycles),
        },
    );
    (controller, calls, bodies, outcomes)
}

#[test]
fn publishes_caption_verbatim_from_primary_attempt() {
    let (mut controller, calls, bodies, outcomes) = controller_with(
        vec![Script::Body(r#"[{"generated_text":"a cat"}]"#)],
        1,
    );
    controller.run().unwrap();

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.as_slice(), &[CycleOutcome::Caption("a cat".into())]);
    // Primary succeeded: exactly one attempt, with the data-URI shape.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let bodies = bodies.lock().unwrap();
    assert!(bodies[0].contains("data:image/jpeg;base64,"));
}

#[test]
fn fallback_attempt_result_is_final() {
    let (mut controller, calls, bodies, outcomes) = controller_with(
        vec![
            Script::Body(r#"{"error":"unexpected input"}"#),
            Script::Body(r#"[{"generated_text":"a dog on grass"}]"#),
        ],
        1,
    );
    controller.run().unwrap();

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(
        outcomes.as_slice(),
        &[CycleOutcome::Caption("a dog on grass".into())]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Second attempt must carry the bare payload, no data-URI prefix.
    let bodies = bodies.lock().unwrap();
    assert!(bodies[0].contains("data:image/jpeg;base64,"));
    assert!(!bodies[1].contains("data:image/jpeg;base64,"));
}

#[test]
fn double_transport_failure_publishes_diagnostic_and_loop_continues() {
    let (mut controller, calls, _bodies, outcomes) =
        controller_with(vec![Script::Fail("connection refused")], 3);
    controller.run().unwrap();

    // Three cycles completed despite every attempt failing.
    assert_eq!(controller.cycles_completed(), 3);
    assert_eq!(controller.state(), ControllerState::Stopped);
    // Two attempts per cycle, never more.
    assert_eq!(calls.load(Ordering::SeqCst), 6);

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 3);
    for outcome in outcomes.iter() {
        match outcome {
            CycleOutcome::Diagnostic(CycleError::Transport(detail)) => {
                assert!(detail.contains("connection refused"));
            }
            other => panic!("expected transport diagnostic, got {:?}", other),
        }
    }
}

#[test]
fn markerless_responses_on_both_attempts_yield_no_caption_diagnostic() {
    let (mut controller, calls, _bodies, outcomes) =
        controller_with(vec![Script::Body(r#"{"status":"queued"}"#)], 1);
    controller.run().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let outcomes = outcomes.lock().unwrap();
    assert_eq!(
        outcomes.as_slice(),
        &[CycleOutcome::Diagnostic(CycleError::NoCaption)]
    );
}

#[test]
fn successful_cycles_never_issue_a_second_attempt() {
    let (mut controller, calls, _bodies, outcomes) = controller_with(
        vec![Script::Body(r#"[{"generated_text":"a kitchen"}]"#)],
        4,
    );
    controller.run().unwrap();

    assert_eq!(controller.cycles_completed(), 4);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(outcomes.lock().unwrap().len(), 4);
}

#[test]
fn unavailable_camera_never_leaves_idle_and_makes_no_calls() {
    let transport = ScriptedTransport::new(vec![Script::Body(r#"[{"generated_text":"x"}]"#)]);
    let calls = transport.call_counter();
    let client = CaptionClient::new(Box::new(transport));
    let (sink, outcomes) = RecordingSink::new();

    let mut controller = CaptureController::new(
        Box::new(StubCameraSource::unavailable()),
        client,
        Box::new(sink),
        CaptureConfig {
            interval: Duration::from_millis(1),
            max_cycles: Some(1),
        },
    );

    assert!(controller.run().is_err());
    assert_eq!(controller.state(), ControllerState::Idle);
    assert_eq!(controller.cycles_completed(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(outcomes.lock().unwrap().is_empty());
}

/// Sink that raises the stop signal as soon as it has seen one outcome.
/// The signal slot is filled in after the controller hands out its handle.
struct StopOnPublishSink {
    stop: Arc<Mutex<Option<Arc<AtomicBool>>>>,
    outcomes: Arc<Mutex<Vec<CycleOutcome>>>,
}

impl CaptionSink for StopOnPublishSink {
    fn publish(&self, outcome: &CycleOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
        if let Some(stop) = self.stop.lock().unwrap().as_ref() {
            stop.store(true, Ordering::SeqCst);
        }
    }
}

#[test]
fn stop_signal_ends_unbounded_episode_at_cycle_boundary() {
    let transport =
        ScriptedTransport::new(vec![Script::Body(r#"[{"generated_text":"a window"}]"#)]);
    let calls = transport.call_counter();
    let client = CaptionClient::new(Box::new(transport));

    let stop_slot: Arc<Mutex<Option<Arc<AtomicBool>>>> = Arc::new(Mutex::new(None));
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = StopOnPublishSink {
        stop: Arc::clone(&stop_slot),
        outcomes: Arc::clone(&outcomes),
    };

    let mut controller = CaptureController::new(
        Box::new(StubCameraSource::new(16, 16)),
        client,
        Box::new(sink),
        CaptureConfig {
            // No max_cycles: the stop signal is the only way out, and the
            // long interval would be felt if the episode overshot it.
            interval: Duration::from_secs(5),
            max_cycles: None,
        },
    );
    *stop_slot.lock().unwrap() = Some(controller.stop_handle());

    let started = Instant::now();
    controller.run().unwrap();

    // The in-flight cycle ran to its publish step, then the episode ended
    // at the boundary without waiting out the interval.
    assert_eq!(controller.state(), ControllerState::Stopped);
    assert_eq!(controller.cycles_completed(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        outcomes.lock().unwrap().as_slice(),
        &[CycleOutcome::Caption("a window".into())]
    );
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn stop_signal_raised_before_run_stops_without_a_cycle() {
    let transport = ScriptedTransport::new(vec![Script::Body(r#"[{"generated_text":"x"}]"#)]);
    let calls = transport.call_counter();
    let client = CaptionClient::new(Box::new(transport));
    let (sink, outcomes) = RecordingSink::new();

    let mut controller = CaptureController::new(
        Box::new(StubCameraSource::new(16, 16)),
        client,
        Box::new(sink),
        CaptureConfig {
            interval: Duration::from_millis(1),
            max_cycles: None,
        },
    );
    controller.stop_handle().store(true, Ordering::SeqCst);
    controller.run().unwrap();

    assert_eq!(controller.state(), ControllerState::Stopped);
    assert_eq!(controller.cycles_completed(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(outcomes.lock().unwrap().is_empty());
}

/// Camera with no frame ready on every other read.
struct IntermittentCamera {
    reads: Arc<AtomicUsize>,
    opened: bool,
}

impl CameraSource for IntermittentCamera {
    fn open(&mut self) -> Result<()> {
        self.opened = true;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<RawFrame>> {
        if !self.opened {
            return Err(anyhow!("not opened"));
        }
        let read = self.reads.fetch_add(1, Ordering::SeqCst);
        if read % 2 == 0 {
            return Ok(None);
        }
        Ok(Some(RawFrame::rgb8(vec![0; 16 * 16 * 3], 16, 16)?))
    }

    fn release(&mut self) {
        self.opened = false;
    }
}

#[test]
fn frameless_reads_skip_the_cycle_without_publishing() {
    let transport =
        ScriptedTransport::new(vec![Script::Body(r#"[{"generated_text":"a hallway"}]"#)]);
    let calls = transport.call_counter();
    let client = CaptionClient::new(Box::new(transport));
    let (sink, outcomes) = RecordingSink::new();

    let reads = Arc::new(AtomicUsize::new(0));
    let mut controller = CaptureController::new(
        Box::new(IntermittentCamera {
            reads: Arc::clone(&reads),
            opened: false,
        }),
        client,
        Box::new(sink),
        CaptureConfig {
            interval: Duration::from_millis(1),
            max_cycles: Some(2),
        },
    );
    controller.run().unwrap();

    // Two frameless reads were skipped and retried after the delay; only
    // the two frame-bearing reads became cycles with inference and publish.
    assert_eq!(reads.load(Ordering::SeqCst), 4);
    assert_eq!(controller.cycles_completed(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(
        outcomes.as_slice(),
        &[
            CycleOutcome::Caption("a hallway".into()),
            CycleOutcome::Caption("a hallway".into()),
        ]
    );
}

#[test]
fn bounded_run_does_not_sleep_after_its_last_cycle() {
    let (mut controller, _calls, _bodies, outcomes) = {
        let transport =
            ScriptedTransport::new(vec![Script::Body(r#"[{"generated_text":"a desk"}]"#)]);
        let calls = transport.call_counter();
        let bodies = transport.body_log();
        let client = CaptionClient::new(Box::new(transport));
        let (sink, outcomes) = RecordingSink::new();
        let controller = CaptureController::new(
            Box::new(StubCameraSource::new(16, 16)),
            client,
            Box::new(sink),
            CaptureConfig {
                interval: Duration::from_secs(5),
                max_cycles: Some(1),
            },
        );
        (controller, calls, bodies, outcomes)
    };

    let started = Instant::now();
    controller.run().unwrap();

    assert_eq!(controller.cycles_completed(), 1);
    assert_eq!(outcomes.lock().unwrap().len(), 1);
    // The single cycle finishes in milliseconds; a trailing interval wait
    // would blow well past this bound.
    assert!(started.elapsed() < Duration::from_secs(1));
}

/// Camera whose reads fail after open: the one unrecoverable case.
struct BrokenCamera;

impl CameraSource for BrokenCamera {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<RawFrame>> {
        Err(anyhow!("device wedged"))
    }

    fn release(&mut self) {}
}

#[test]
fn unrecoverable_read_failure_ends_the_episode() {
    let transport = ScriptedTransport::new(vec![Script::Body(r#"[{"generated_text":"x"}]"#)]);
    let calls = transport.call_counter();
    let client = CaptionClient::new(Box::new(transport));
    let (sink, _outcomes) = RecordingSink::new();

    let mut controller = CaptureController::new(
        Box::new(BrokenCamera),
        client,
        Box::new(sink),
        CaptureConfig {
            interval: Duration::from_millis(1),
            max_cycles: None,
        },
    );

    assert!(controller.run().is_err());
    assert_eq!(controller.state(), ControllerState::Stopped);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn infer_returns_only_sentinels_or_captions_per_shape() {
    let mut camera = StubCameraSource::new(16, 16);
    camera.open().unwrap();
    let frame = camera.read_frame().unwrap().unwrap();
    let image = encode(&frame).unwrap();

    let failing = CaptionClient::new(Box::new(ScriptedTransport::new(vec![Script::Fail(
        "timed out",
    )])));
    for shape in [PayloadShape::Primary, PayloadShape::Fallback] {
        match failing.infer(&image, shape) {
            CaptionResult::TransportError(detail) => assert!(detail.contains("timed out")),
            other => panic!("expected transport sentinel, got {:?}", other),
        }
    }

    let markerless = CaptionClient::new(Box::new(ScriptedTransport::new(vec![Script::Body(
        r#"{"warnings":[]}"#,
    )])));
    for shape in [PayloadShape::Primary, PayloadShape::Fallback] {
        assert_eq!(markerless.infer(&image, shape), CaptionResult::NoCaption);
    }
}
