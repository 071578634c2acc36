//! Knowledge context for grounding analyses.
//!
//! Grounding documents are read once per process and concatenated into a
//! single immutable text blob that every prompt embeds. A missing or empty
//! knowledge location never fails startup: the context degrades to
//! [`NOT_FOUND_SENTINEL`] and analysis continues without grounding.

mod documents;

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tracing::{info, instrument, warn};

pub use documents::KnowledgeDocument;

/// Context text used when no grounding documents are available.
pub const NOT_FOUND_SENTINEL: &str = "Knowledge base not found.";

// ---------------------------------------------------------------------------
// KnowledgeContext
// ---------------------------------------------------------------------------

/// Immutable, cheaply clonable grounding text plus the names of its documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeContext {
    text: Arc<str>,
    documents: Arc<[String]>,
}

impl KnowledgeContext {
    /// Load every document at `location`, falling back to the sentinel.
    #[instrument(skip_all, fields(path = %location.display()))]
    pub fn load(location: &Path) -> Self {
        let docs = documents::collect(location);
        if docs.is_empty() {
            warn!("no grounding documents found, analyses will run ungrounded");
            return Self::sentinel();
        }

        let context = Self::from_documents(docs);
        info!(
            documents = context.documents.len(),
            chars = context.text.len(),
            "knowledge context assembled"
        );
        context
    }

    /// Build a context from already-rendered documents.
    pub fn from_documents(docs: Vec<KnowledgeDocument>) -> Self {
        if docs.is_empty() {
            return Self::sentinel();
        }

        let text = docs
            .iter()
            .map(|doc| format!("=== Document: {} ===\n{}", doc.name, doc.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        let names: Vec<String> = docs.into_iter().map(|doc| doc.name).collect();

        Self {
            text: Arc::from(text),
            documents: Arc::from(names),
        }
    }

    /// The degraded, document-less context.
    pub fn sentinel() -> Self {
        Self {
            text: Arc::from(NOT_FOUND_SENTINEL),
            documents: Arc::from(Vec::new()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Names of the documents that make up this context, in order.
    pub fn document_names(&self) -> &[String] {
        &self.documents
    }

    /// True when no documents were found.
    pub fn is_degraded(&self) -> bool {
        self.documents.is_empty()
    }
}

// ---------------------------------------------------------------------------
// KnowledgeProvider
// ---------------------------------------------------------------------------

/// Lazily builds the [`KnowledgeContext`] for a location on first use.
#[derive(Debug)]
pub struct KnowledgeProvider {
    location: PathBuf,
    context: OnceLock<KnowledgeContext>,
}

impl KnowledgeProvider {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            context: OnceLock::new(),
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// The process-wide context; built on the first call, reused afterwards.
    pub fn get_context(&self) -> &KnowledgeContext {
        self.context
            .get_or_init(|| KnowledgeContext::load(&self.location))
    }
}
