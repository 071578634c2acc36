//! Gemini REST implementation of [`GenerationCapability`].
//!
//! Uses the `models/{model}:generateContent` endpoint with the API key in the
//! `x-goog-api-key` header. Images are sent inline as base64 parts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use sdgscan_shared::{GeminiConfig, Result, SdgScanError};

use crate::capability::{
    GenerationCapability, classify_http_error, classify_request_error, missing_api_key_error,
};
use crate::image::ImageInput;

/// User-Agent string for Gemini requests.
const USER_AGENT: &str = concat!("SdgScan/", env!("CARGO_PKG_VERSION"));

const PROVIDER_NAME: &str = "gemini";

/// Instruction sent alongside an uploaded image.
const IMAGE_DESCRIPTION_PROMPT: &str = "Analyze this image for local sustainability issues. \
Describe what you see in a neutral, factual way. \
Focus on waste, water, pollution, infrastructure, or nature. \
Keep it brief (1-2 sentences).";

/// Gemini client bound to one analysis model and one vision model.
pub struct GeminiProvider {
    client: Client,
    base_url: Url,
    model: String,
    vision_model: String,
    api_key: Option<String>,
    api_key_env: String,
}

impl GeminiProvider {
    /// Create a provider from config and an optional API key.
    ///
    /// A missing key is not an error here; it surfaces through
    /// [`GenerationCapability::ensure_available`].
    pub fn new(config: &GeminiConfig, api_key: Option<String>) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            SdgScanError::config(format!("invalid gemini base_url '{}': {e}", config.base_url))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SdgScanError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            vision_model: config.vision_model.clone(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            api_key_env: config.api_key_env.clone(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{model}:generateContent",
            self.base_url.as_str().trim_end_matches('/')
        )
    }

    /// POST a `generateContent` request and extract the candidate text.
    async fn generate(&self, model: &str, parts: serde_json::Value) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| missing_api_key_error(PROVIDER_NAME, &self.api_key_env))?;

        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": parts }]
        });

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_request_error(&e, PROVIDER_NAME))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &text, PROVIDER_NAME));
        }

        // The client timeout also covers the body read.
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_request_error(&e, PROVIDER_NAME))?;

        let parsed: GenerateContentResponse = serde_json::from_slice(&body).map_err(|e| {
            SdgScanError::transport(format!("{PROVIDER_NAME}: unreadable response body: {e}"), false)
        })?;

        parsed.into_text()
    }
}

#[async_trait]
impl GenerationCapability for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn ensure_available(&self) -> Result<()> {
        match self.api_key {
            Some(_) => Ok(()),
            None => Err(missing_api_key_error(PROVIDER_NAME, &self.api_key_env)),
        }
    }

    #[instrument(skip_all, fields(model = %self.model, prompt_chars = prompt.len()))]
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let parts = serde_json::json!([{ "text": prompt }]);
        let text = self.generate(&self.model, parts).await?;
        debug!(chars = text.len(), "generation complete");
        Ok(text)
    }

    #[instrument(skip_all, fields(model = %self.vision_model, mime = %image.mime_type, bytes = image.bytes.len()))]
    async fn describe_image(&self, image: &ImageInput) -> Result<String> {
        let parts = serde_json::json!([
            { "text": IMAGE_DESCRIPTION_PROMPT },
            { "inline_data": { "mime_type": image.mime_type, "data": image.to_base64() } }
        ]);
        let text = self.generate(&self.vision_model, parts).await?;
        Ok(text.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenate the text parts of the first candidate.
    fn into_text(self) -> Result<String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(SdgScanError::transport(
                format!("{PROVIDER_NAME}: prompt blocked ({reason})"),
                false,
            ));
        }

        let candidate = self.candidates.into_iter().next().ok_or_else(|| {
            SdgScanError::transport(format!("{PROVIDER_NAME}: response had no candidates"), false)
        })?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
            return Err(SdgScanError::transport(
                format!("{PROVIDER_NAME}: empty response (finish reason: {reason})"),
                false,
            ));
        }

        Ok(text)
    }
}
