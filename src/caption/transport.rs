//! Wire transport for the captioning endpoint.
//!
//! The transport owns only the HTTP round trip: POST the JSON body, return
//! the response body as text. Success or failure of a caption attempt is
//! judged by the caller from the body content, not the status code, so a
//! non-2xx response still yields its body here.

use std::time::Duration;

use anyhow::{Context, Result};

/// One outbound POST to the caption endpoint.
///
/// Implementations must return the full response body as text whenever a
/// response was received at all, regardless of HTTP status. Only transport
/// failures (connect, timeout, stream errors) are `Err`.
pub trait CaptionTransport: Send {
    fn post_json(&self, body: &str) -> Result<String>;
}

/// `ureq`-backed transport with a bounded per-call timeout.
pub struct HttpTransport {
    agent: ureq::Agent,
    endpoint: String,
    bearer: String,
}

impl HttpTransport {
    pub fn new(endpoint: &str, token: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            endpoint: endpoint.to_string(),
            bearer: format!("Bearer {}", token),
        }
    }
}

impl CaptionTransport for HttpTransport {
    fn post_json(&self, body: &str) -> Result<String> {
        let response = self
            .agent
            .post(&self.endpoint)
            .set("Authorization", &self.bearer)
            .set("Content-Type", "application/json")
            .send_string(body);

        match response {
            Ok(resp) => resp.into_string().context("read caption response body"),
            // Error statuses still carry a body the caller can scan.
            Err(ureq::Error::Status(code, resp)) => {
                log::debug!("caption endpoint returned status {}", code);
                resp.into_string().context("read caption error body")
            }
            Err(err) => Err(err).context("post caption request"),
        }
    }
}
