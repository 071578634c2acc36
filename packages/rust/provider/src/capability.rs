//! The generation capability boundary.
//!
//! Everything the pipeline needs from a remote model goes through
//! [`GenerationCapability`], so tests and alternative providers can stand in
//! for Gemini without touching the pipeline.

use async_trait::async_trait;

use sdgscan_shared::{Result, SdgScanError};

use crate::image::ImageInput;

/// A remote model that can write text and caption images.
#[async_trait]
pub trait GenerationCapability: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Fail with [`SdgScanError::CapabilityUnavailable`] if no call can succeed
    /// (e.g. no credential configured). Must not perform network I/O.
    fn ensure_available(&self) -> Result<()>;

    /// Send a prompt and return the generated text.
    async fn generate_text(&self, prompt: &str) -> Result<String>;

    /// Return a short factual description of an image.
    async fn describe_image(&self, image: &ImageInput) -> Result<String>;
}

/// Error for a provider that has no API key configured.
pub fn missing_api_key_error(provider: &str, env_var: &str) -> SdgScanError {
    SdgScanError::CapabilityUnavailable(format!(
        "{provider} API key is missing. Set the {env_var} environment variable."
    ))
}

/// Map a non-success HTTP status to an error.
///
/// Rate limits and server errors are retryable; auth failures make the
/// capability unavailable; any other client error is a permanent failure
/// of that call.
pub fn classify_http_error(status: u16, body: &str, provider: &str) -> SdgScanError {
    let detail = truncate(body, 300);
    match status {
        401 | 403 => SdgScanError::CapabilityUnavailable(format!(
            "{provider}: API key rejected (HTTP {status})"
        )),
        408 | 429 => SdgScanError::transport(format!("{provider}: HTTP {status}: {detail}"), true),
        500..=599 => SdgScanError::transport(format!("{provider}: HTTP {status}: {detail}"), true),
        _ => SdgScanError::transport(format!("{provider}: HTTP {status}: {detail}"), false),
    }
}

/// Map a `reqwest` failure; connection problems, timeouts and interrupted
/// bodies are retryable.
pub fn classify_request_error(err: &reqwest::Error, provider: &str) -> SdgScanError {
    let retryable = err.is_timeout() || err.is_connect() || err.is_request() || err.is_body();
    SdgScanError::transport(format!("{provider}: {err}"), retryable)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
