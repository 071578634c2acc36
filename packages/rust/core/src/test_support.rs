//! In-memory [`GenerationCapability`] for pipeline tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use sdgscan_provider::{GenerationCapability, ImageInput};
use sdgscan_shared::{Result, SdgScanError};

type Responder = Box<dyn Fn(&str, usize) -> Result<String> + Send + Sync>;
type ImageResponder = Box<dyn Fn(&ImageInput) -> Result<String> + Send + Sync>;

/// Answers each prompt through a closure given the prompt and the call index.
pub(crate) struct ScriptedCapability {
    available: bool,
    responder: Responder,
    image_responder: ImageResponder,
    calls: AtomicUsize,
    image_calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCapability {
    pub(crate) fn new(
        responder: impl Fn(&str, usize) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            available: true,
            responder: Box::new(responder),
            image_responder: Box::new(|_| Ok("A photo of a street.".into())),
            calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A capability with no credential; every call fails.
    pub(crate) fn unavailable() -> Self {
        let mut capability = Self::new(|_, _| {
            Err(SdgScanError::CapabilityUnavailable("no key".into()))
        });
        capability.available = false;
        capability
    }

    pub(crate) fn with_image_responder(
        mut self,
        responder: impl Fn(&ImageInput) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        self.image_responder = Box::new(responder);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

#[async_trait]
impl GenerationCapability for ScriptedCapability {
    fn name(&self) -> &str {
        "scripted"
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(SdgScanError::CapabilityUnavailable(
                "GEMINI_API_KEY is missing".into(),
            ))
        }
    }

    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        (self.responder)(prompt, call)
    }

    async fn describe_image(&self, image: &ImageInput) -> Result<String> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        (self.image_responder)(image)
    }
}

/// A well-formed model answer for `issue` classified under `sdg`.
pub(crate) fn analysis_json(issue: &str, sdg: &str) -> String {
    serde_json::json!({
        "issue": issue,
        "sdg": sdg,
        "severity": "Medium",
        "summary": format!("Reported: {issue}."),
        "recommendation": "Notify the responsible municipal department.",
        "explanation": format!("Matches {sdg} in sdgs.json."),
        "rag_sources": ["sdgs.json"]
    })
    .to_string()
}

/// Extract the quoted issue text from a composed prompt.
pub(crate) fn issue_in(prompt: &str) -> &str {
    prompt
        .split("Reported issue:\n\"\"\"\n")
        .nth(1)
        .and_then(|rest| rest.split("\n\"\"\"").next())
        .unwrap_or("")
}
