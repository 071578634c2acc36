//! Multimodal intake: turns one submission into normalized issue texts.
//!
//! Image and audio failures never fail the request. An image that cannot be
//! described becomes an error caption; audio always becomes a placeholder.

use tracing::{info, instrument, warn};

use sdgscan_provider::{GenerationCapability, ImageInput};
use sdgscan_shared::{IssueText, Result};

use crate::normalize::{self, check_quota};

/// Everything one caller submitted for analysis.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    /// Free text, or a JSON-encoded list of texts.
    pub text: Option<String>,
    /// An uploaded photo of the issue.
    pub image: Option<ImageInput>,
    /// A voice recording (not transcribed).
    pub audio: Option<Vec<u8>>,
}

impl Submission {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Number of issue entries this submission will normalize to.
    ///
    /// Exact without contacting the capability: image and audio always
    /// contribute one entry each.
    pub fn entry_count(&self) -> usize {
        let text = self
            .text
            .as_deref()
            .map(|t| normalize::text_entries(t).len())
            .unwrap_or(0);
        text + usize::from(self.image.is_some()) + usize::from(self.audio.is_some())
    }
}

/// Caption an image, encoding any failure as an error caption.
pub async fn describe_image(capability: &dyn GenerationCapability, image: &ImageInput) -> String {
    if image.is_empty() {
        return "[Error analyzing image: empty upload]".to_string();
    }

    match capability.describe_image(image).await {
        Ok(caption) if !caption.trim().is_empty() => caption,
        Ok(_) => "[Error analyzing image: no description returned]".to_string(),
        Err(e) => {
            warn!(error = %e, "image description failed");
            format!("[Error analyzing image: {e}]")
        }
    }
}

/// Normalize a submission, describing its image if present.
///
/// The quota is checked before the image is sent anywhere, so an oversized
/// request costs no capability calls.
pub async fn prepare(
    submission: &Submission,
    capability: &dyn GenerationCapability,
    max_items: usize,
) -> Result<Vec<IssueText>> {
    prepare_counted(submission, submission.entry_count(), capability, max_items).await
}

/// [`prepare`] for a caller that already knows the submission's
/// [`Submission::entry_count`].
#[instrument(skip_all, fields(entries = entries))]
pub(crate) async fn prepare_counted(
    submission: &Submission,
    entries: usize,
    capability: &dyn GenerationCapability,
    max_items: usize,
) -> Result<Vec<IssueText>> {
    check_quota(entries, max_items)?;

    let caption = match &submission.image {
        Some(image) => Some(describe_image(capability, image).await),
        None => None,
    };

    let audio_marker = submission
        .audio
        .as_ref()
        .map(|bytes| format!("{} bytes of audio", bytes.len()));

    let items = normalize::normalize(
        submission.text.as_deref(),
        caption.as_deref(),
        audio_marker.as_deref(),
        max_items,
    )?;

    info!(items = items.len(), "submission normalized");
    Ok(items)
}
