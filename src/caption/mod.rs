//! Inference client for the remote captioning endpoint.
//!
//! One invocation builds a request body embedding the encoded image as a
//! single string field, posts it with a bearer credential, and scans the
//! response text for a caption. The endpoint's accepted input format is not
//! guaranteed, so two payload shapes exist: a `data:` URI wrapping
//! (primary) and the bare base64 text (fallback). A cycle issues the
//! primary shape first and falls back exactly once on a sentinel result.
//!
//! Responses are treated as loosely-structured text, not a validated
//! schema: the same marker scan tolerates arrays, error objects, and
//! well-formed caption objects. [`extract_caption`] isolates that rule so a
//! structured parser could replace it without touching the client.

mod transport;

pub use transport::{CaptionTransport, HttpTransport};

use crate::encode::EncodedImage;

/// Literal field marker scanned for in response text.
const CAPTION_MARKER: &str = "\"generated_text\":";

/// Textual wrapping applied to the base64 image text before it is embedded
/// in the request body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadShape {
    /// `data:image/jpeg;base64,<payload>` — tried first.
    Primary,
    /// `<payload>` alone, no prefix.
    Fallback,
}

impl PayloadShape {
    fn wrap(self, image: &EncodedImage) -> String {
        match self {
            PayloadShape::Primary => image.data_uri(),
            PayloadShape::Fallback => image.base64(),
        }
    }
}

/// Outcome of one inference attempt. Sentinel variants stand in for
/// exceptions; the caller decides whether to retry with the other shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptionResult {
    /// Caption text, verbatim from the response.
    Caption(String),
    /// A response arrived but carried no caption marker.
    NoCaption,
    /// The call itself failed (connect, timeout, stream error).
    TransportError(String),
}

impl CaptionResult {
    /// Sentinel results trigger the one fallback-shape attempt.
    pub fn needs_fallback(&self) -> bool {
        !matches!(self, CaptionResult::Caption(_))
    }
}

/// Extract a caption from opaque response text.
///
/// Finds the first occurrence of the caption marker and returns the first
/// quoted string after it, verbatim. Deliberately permissive: no schema
/// validation, no unescaping.
pub fn extract_caption(body: &str) -> Option<String> {
    let after = body.find(CAPTION_MARKER)? + CAPTION_MARKER.len();
    let rest = &body[after..];
    let open = rest.find('"')?;
    let rest = &rest[open + 1..];
    let close = rest.find('"')?;
    Some(rest[..close].to_string())
}

/// Client for the captioning endpoint. Holds no state between calls beyond
/// the transport handle.
pub struct CaptionClient {
    transport: Box<dyn CaptionTransport>,
}

impl CaptionClient {
    pub fn new(transport: Box<dyn CaptionTransport>) -> Self {
        Self { transport }
    }

    /// Client over HTTP with a bounded timeout.
    pub fn over_http(endpoint: &str, token: &str, timeout: std::time::Duration) -> Self {
        Self::new(Box::new(HttpTransport::new(endpoint, token, timeout)))
    }

    /// One inference attempt with the given payload shape.
    ///
    /// Never panics and never propagates an error: transport failures come
    /// back as [`CaptionResult::TransportError`], markerless responses as
    /// [`CaptionResult::NoCaption`].
    pub fn infer(&self, image: &EncodedImage, shape: PayloadShape) -> CaptionResult {
        let body = serde_json::json!({ "inputs": shape.wrap(image) }).to_string();
        match self.transport.post_json(&body) {
            Ok(text) => match extract_caption(&text) {
                Some(caption) => CaptionResult::Caption(caption),
                None => CaptionResult::NoCaption,
            },
            Err(err) => CaptionResult::TransportError(format!("{:#}", err)),
        }
    }

    /// Primary attempt, then exactly one fallback-shape attempt if the
    /// primary result was a sentinel. The fallback's result is final.
    pub fn infer_with_fallback(&self, image: &EncodedImage) -> CaptionResult {
        let primary = self.infer(image, PayloadShape::Primary);
        if !primary.needs_fallback() {
            return primary;
        }
        log::debug!(
            "primary caption attempt yielded {:?}; retrying with bare payload",
            primary
        );
        self.infer(image, PayloadShape::Fallback)
    }
}
