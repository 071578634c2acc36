//! Grounding document discovery and reading.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// File extensions treated as grounding documents.
const SUPPORTED_EXTENSIONS: &[&str] = &["md", "txt", "json"];

/// A single grounding document, already rendered to prompt text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeDocument {
    /// File name; this is what analyses cite in `rag_sources`.
    pub name: String,
    /// Rendered body.
    pub content: String,
}

/// Read every usable document at `location`.
///
/// A directory yields its supported files in file-name order; a file yields
/// itself. Missing locations and unreadable files produce no documents.
pub(crate) fn collect(location: &Path) -> Vec<KnowledgeDocument> {
    let paths = if location.is_dir() {
        list_directory(location)
    } else if location.is_file() {
        vec![location.to_path_buf()]
    } else {
        debug!(path = %location.display(), "knowledge location does not exist");
        return Vec::new();
    };

    paths.iter().filter_map(|path| read_document(path)).collect()
}

fn list_directory(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "cannot list knowledge directory");
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_supported(path))
        .collect();
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    paths
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

fn read_document(path: &Path) -> Option<KnowledgeDocument> {
    let name = path.file_name()?.to_string_lossy().into_owned();
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable knowledge document");
            return None;
        }
    };

    let content = render(path, &raw);
    if content.trim().is_empty() {
        debug!(%name, "skipping empty knowledge document");
        return None;
    }

    Some(KnowledgeDocument { name, content })
}

/// JSON documents are re-serialized pretty-printed; everything else is trimmed text.
fn render(path: &Path, raw: &str) -> String {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => {
                if let Ok(pretty) = serde_json::to_string_pretty(&value) {
                    return pretty;
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid JSON knowledge document, using raw text");
            }
        }
    }

    raw.trim().to_string()
}
