//! Daemon configuration.
//!
//! Layered the usual way: optional JSON config file named by
//! `CAMCAPTION_CONFIG`, then environment overrides, then validation. The
//! bearer credential is always injected at load time, from
//! `CAMCAPTION_TOKEN` or a token file, and is never baked into the binary.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const DEFAULT_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/Salesforce/blip-image-captioning-base";
const DEFAULT_CAMERA_URL: &str = "http://127.0.0.1:81/stream";
const DEFAULT_INTERVAL_MS: u64 = 2000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize, Default)]
struct CamcaptionConfigFile {
    endpoint: Option<String>,
    token_path: Option<PathBuf>,
    camera: Option<CameraConfigFile>,
    cadence: Option<CadenceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CadenceConfigFile {
    interval_ms: Option<u64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CamcaptionConfig {
    pub endpoint: String,
    pub token: String,
    pub camera_url: String,
    pub interval: Duration,
    pub timeout: Duration,
}

impl CamcaptionConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CAMCAPTION_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CamcaptionConfigFile) -> Result<Self> {
        let endpoint = file
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let token = match file.token_path {
            Some(path) => read_token_file(&path)?,
            None => String::new(),
        };
        let camera_url = file
            .camera
            .and_then(|camera| camera.url)
            .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string());
        let interval = Duration::from_millis(
            file.cadence
                .as_ref()
                .and_then(|cadence| cadence.interval_ms)
                .unwrap_or(DEFAULT_INTERVAL_MS),
        );
        let timeout = Duration::from_secs(
            file.cadence
                .and_then(|cadence| cadence.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        );
        Ok(Self {
            endpoint,
            token,
            camera_url,
            interval,
            timeout,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(endpoint) = std::env::var("CAMCAPTION_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.endpoint = endpoint;
            }
        }
        if let Ok(url) = std::env::var("CAMCAPTION_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera_url = url;
            }
        }
        if let Ok(path) = std::env::var("CAMCAPTION_TOKEN_PATH") {
            if !path.trim().is_empty() {
                self.token = read_token_file(Path::new(&path))?;
            }
        }
        // A directly-set token wins over any token file.
        if let Ok(token) = std::env::var("CAMCAPTION_TOKEN") {
            if !token.trim().is_empty() {
                self.token = token.trim().to_string();
            }
        }
        if let Ok(interval) = std::env::var("CAMCAPTION_INTERVAL_MS") {
            let millis: u64 = interval
                .parse()
                .map_err(|_| anyhow!("CAMCAPTION_INTERVAL_MS must be an integer number of milliseconds"))?;
            self.interval = Duration::from_millis(millis);
        }
        if let Ok(timeout) = std::env::var("CAMCAPTION_TIMEOUT_SECS") {
            let seconds: u64 = timeout
                .parse()
                .map_err(|_| anyhow!("CAMCAPTION_TIMEOUT_SECS must be an integer number of seconds"))?;
            self.timeout = Duration::from_secs(seconds);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| anyhow!("invalid caption endpoint url: {}", e))?;
        match endpoint.scheme() {
            "http" | "https" => {}
            other => return Err(anyhow!("caption endpoint scheme '{}' not supported", other)),
        }
        Url::parse(&self.camera_url).map_err(|e| anyhow!("invalid camera url: {}", e))?;
        if self.token.is_empty() {
            return Err(anyhow!(
                "no caption api token; set CAMCAPTION_TOKEN or a token_path"
            ));
        }
        if self.interval.as_millis() == 0 {
            return Err(anyhow!("capture interval must be greater than zero"));
        }
        if self.timeout.as_secs() == 0 {
            return Err(anyhow!("inference timeout must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<CamcaptionConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn read_token_file(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read token file {}: {}", path.display(), e))?;
    let token = raw.trim().to_string();
    if token.is_empty() {
        return Err(anyhow!("token file {} is empty", path.display()));
    }
    Ok(token)
}
