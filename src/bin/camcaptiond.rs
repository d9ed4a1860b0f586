//! camcaptiond - camera frame-to-caption daemon.
//!
//! This daemon:
//! 1. Acquires frames from an HTTP camera (or the stub camera)
//! 2. Encodes each frame as JPEG + base64, fully in memory
//! 3. Sends it to the remote captioning endpoint with the
//!    primary-then-fallback payload policy
//! 4. Publishes captions and diagnostics through the log facade
//! 5. Waits a fixed interval between cycles; Ctrl-C stops at the next
//!    cycle boundary

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::atomic::Ordering;

use camcaption::{
    CamcaptionConfig, CaptionClient, CameraSource, CaptureConfig, CaptureController,
    HttpCameraConfig, HttpCameraSource, LogSink, StubCameraSource,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Caption camera frames through a remote inference endpoint"
)]
struct Args {
    /// Camera URL override (http MJPEG stream or JPEG snapshot endpoint).
    #[arg(long)]
    camera_url: Option<String>,

    /// Caption endpoint URL override.
    #[arg(long)]
    endpoint: Option<String>,

    /// Inter-cycle interval override, in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Use the built-in synthetic camera instead of a real one.
    #[arg(long, env = "CAMCAPTION_STUB_CAMERA")]
    stub_camera: bool,

    /// Stop after this many cycles (smoke runs).
    #[arg(long, env = "CAMCAPTION_MAX_CYCLES")]
    max_cycles: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = CamcaptionConfig::load()?;
    if let Some(url) = args.camera_url {
        cfg.camera_url = url;
    }
    if let Some(endpoint) = args.endpoint {
        cfg.endpoint = endpoint;
    }
    if let Some(millis) = args.interval_ms {
        cfg.interval = std::time::Duration::from_millis(millis);
    }

    log::info!("caption endpoint: {}", cfg.endpoint);

    let source: Box<dyn CameraSource> = if args.stub_camera {
        log::info!("using stub camera");
        Box::new(StubCameraSource::default())
    } else {
        log::info!("camera: {}", cfg.camera_url);
        Box::new(HttpCameraSource::new(HttpCameraConfig {
            url: cfg.camera_url.clone(),
        })?)
    };

    let client = CaptionClient::over_http(&cfg.endpoint, &cfg.token, cfg.timeout);
    let capture = CaptureConfig {
        interval: cfg.interval,
        max_cycles: args.max_cycles,
    };

    let mut controller = CaptureController::new(source, client, Box::new(LogSink), capture);

    let stop = controller.stop_handle();
    ctrlc::set_handler(move || {
        log::info!("stop requested");
        stop.store(true, Ordering::Relaxed);
    })
    .context("install ctrl-c handler")?;

    controller.run()
}
