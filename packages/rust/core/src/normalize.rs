//! Input normalization: mixed report channels → ordered issue texts.
//!
//! Rules, in order:
//! 1. Raw text that parses as a JSON list contributes each element; any other
//!    raw text (including invalid JSON) contributes itself verbatim.
//! 2. An image caption contributes one `[Image Analysis]:` entry.
//! 3. Audio contributes one fixed placeholder entry.
//!
//! Nothing is deduplicated and arrival order is preserved.

use tracing::debug;

use sdgscan_shared::{IssueText, Result, SdgScanError};

/// Prefix marking entries that came from an uploaded image.
pub const IMAGE_MARKER: &str = "[Image Analysis]:";

/// Entry substituted for uploaded audio, which is not transcribed server-side.
pub const AUDIO_PLACEHOLDER: &str = "[Audio received: server-side transcription is not available. \
Use client-side speech input and submit the transcript as text.]";

/// Normalize one request's inputs into issue texts.
///
/// Fails with `Validation` when nothing usable was submitted and with
/// `QuotaExceeded` when more than `max_items` entries result. Blank JSON list
/// elements are dropped rather than analyzed, so `["", " "]` counts as empty.
pub fn normalize(
    raw_text: Option<&str>,
    image_caption: Option<&str>,
    audio_marker: Option<&str>,
    max_items: usize,
) -> Result<Vec<IssueText>> {
    let mut entries = raw_text.map(text_entries).unwrap_or_default();

    if let Some(caption) = image_caption.filter(|c| !c.trim().is_empty()) {
        entries.push(format!("{IMAGE_MARKER} {}", caption.trim()));
    }

    if let Some(marker) = audio_marker {
        debug!(marker, "audio submitted, substituting placeholder");
        entries.push(AUDIO_PLACEHOLDER.to_string());
    }

    if entries.is_empty() {
        return Err(SdgScanError::validation("No text provided for analysis."));
    }
    check_quota(entries.len(), max_items)?;

    entries.into_iter().map(IssueText::new).collect()
}

/// Entries contributed by the raw text channel alone.
///
/// A JSON list yields its elements (non-string elements as their JSON text);
/// blank elements are skipped. Anything else yields the text verbatim.
pub fn text_entries(raw_text: &str) -> Vec<String> {
    if raw_text.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<serde_json::Value>(raw_text) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .filter(|s| !s.trim().is_empty())
            .collect(),
        _ => vec![raw_text.to_string()],
    }
}

/// Reject batches larger than `max_items`.
pub fn check_quota(count: usize, max_items: usize) -> Result<()> {
    if count > max_items {
        return Err(SdgScanError::QuotaExceeded {
            count,
            max: max_items,
        });
    }
    Ok(())
}
