//! Model output cleanup, parsing and validation.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use sdgscan_shared::{IssueAnalysis, Result, SdgCategory, SdgScanError, Severity};

/// Fields every analysis must carry.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "issue",
    "sdg",
    "severity",
    "summary",
    "recommendation",
    "explanation",
];

/// Unparsed text returned by the generation capability for one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawModelOutput(String);

impl RawModelOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// How strictly `sdg` and `severity` values are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Out-of-domain values are accepted and logged.
    #[default]
    Permissive,
    /// Out-of-domain values are rejected as malformed output.
    Strict,
}

impl ValidationMode {
    pub fn from_strict(strict: bool) -> Self {
        if strict { Self::Strict } else { Self::Permissive }
    }
}

/// Remove surrounding whitespace and a wrapping code fence, if any.
///
/// Strips the opening fence with its language tag (e.g. ```` ```json ````) and
/// a trailing ```` ``` ````. Text without fences is only trimmed.
pub fn strip_fences(raw: &str) -> &str {
    static OPEN_FENCE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^```[A-Za-z0-9_+\-]*").expect("valid regex"));

    let mut text = raw.trim();
    if let Some(m) = OPEN_FENCE.find(text) {
        text = &text[m.end()..];
    }
    if let Some(stripped) = text.strip_suffix("```") {
        text = stripped;
    }
    text.trim()
}

/// Parse and validate raw model output into an [`IssueAnalysis`].
pub fn parse_analysis(raw: &RawModelOutput, mode: ValidationMode) -> Result<IssueAnalysis> {
    let text = strip_fences(raw.as_str());
    if text.is_empty() {
        return Err(SdgScanError::malformed("model returned no content"));
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|e| SdgScanError::malformed(format!("not valid JSON: {e}")))?;

    let object = match value {
        Value::Object(object) => object,
        other => {
            return Err(SdgScanError::malformed(format!(
                "expected a JSON object, got {}",
                kind(&other)
            )));
        }
    };

    let missing: Vec<&str> = REQUIRED_FIELDS
        .into_iter()
        .filter(|field| object.get(*field).is_none_or(Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(SdgScanError::malformed(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }

    let analysis = IssueAnalysis {
        issue: field_text(&object, "issue"),
        sdg: field_text(&object, "sdg"),
        severity: field_text(&object, "severity"),
        summary: field_text(&object, "summary"),
        recommendation: field_text(&object, "recommendation"),
        explanation: field_text(&object, "explanation"),
        rag_sources: sources(&object),
    };

    check_domains(&analysis, mode)?;
    Ok(analysis)
}

/// Field value as text; non-string scalars keep their JSON form.
fn field_text(object: &Map<String, Value>, field: &str) -> String {
    match object.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn sources(object: &Map<String, Value>) -> Option<Vec<String>> {
    let value = object
        .get("rag_sources")
        .or_else(|| object.get("citations"))?;
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        ),
        Value::String(s) => Some(vec![s.clone()]),
        _ => None,
    }
}

fn check_domains(analysis: &IssueAnalysis, mode: ValidationMode) -> Result<()> {
    if SdgCategory::recognize(&analysis.sdg).is_none() {
        let allowed = SdgCategory::ALL.map(|c| c.code()).join(", ");
        if mode == ValidationMode::Strict {
            return Err(SdgScanError::malformed(format!(
                "sdg '{}' is not one of {allowed}",
                analysis.sdg
            )));
        }
        warn!(sdg = %analysis.sdg, "model returned an sdg outside the allowed set");
    }

    if Severity::recognize(&analysis.severity).is_none() {
        if mode == ValidationMode::Strict {
            return Err(SdgScanError::malformed(format!(
                "severity '{}' is not one of Low, Medium, High",
                analysis.severity
            )));
        }
        warn!(severity = %analysis.severity, "model returned a severity outside the allowed set");
    }

    Ok(())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"issue":"broken streetlight","sdg":"SDG 11","severity":"Medium","summary":"...","recommendation":"...","explanation":"..."}"#;

    fn parse(text: &str) -> Result<IssueAnalysis> {
        parse_analysis(&RawModelOutput::new(text), ValidationMode::Permissive)
    }

    #[test]
    fn strip_leaves_clean_text_unchanged() {
        assert_eq!(strip_fences(VALID), VALID);
        assert_eq!(strip_fences(strip_fences(VALID)), VALID);
    }

    #[test]
    fn strip_removes_only_fence_markers() {
        let fenced = format!("```json\n{VALID}\n```");
        assert_eq!(strip_fences(&fenced), VALID);

        let bare_fence = format!("  ```\n{VALID}```  ");
        assert_eq!(strip_fences(&bare_fence), VALID);

        let stripped = strip_fences(&fenced);
        assert_eq!(strip_fences(stripped), stripped);
    }

    #[test]
    fn parses_valid_output() {
        let analysis = parse(VALID).unwrap();
        assert_eq!(analysis.sdg, "SDG 11");
        assert_eq!(analysis.issue, "broken streetlight");
        assert_eq!(analysis.severity_level(), Some(Severity::Medium));
        assert!(analysis.rag_sources.is_none());
    }

    #[test]
    fn fenced_output_parses_identically() {
        let fenced = format!("```json\n{VALID}\n```");
        assert_eq!(parse(&fenced).unwrap(), parse(VALID).unwrap());
    }

    #[test]
    fn citations_are_collected() {
        let text = r#"{"issue":"leak","sdg":"SDG 6","severity":"High","summary":"s",
            "recommendation":"r","explanation":"e","rag_sources":["sdgs.json","best_practices.md"]}"#;
        let analysis = parse(text).unwrap();
        assert_eq!(
            analysis.rag_sources,
            Some(vec!["sdgs.json".to_string(), "best_practices.md".to_string()])
        );

        let text = r#"{"issue":"leak","sdg":"SDG 6","severity":"High","summary":"s",
            "recommendation":"r","explanation":"e","citations":"sdgs.json"}"#;
        assert_eq!(parse(text).unwrap().rag_sources, Some(vec!["sdgs.json".to_string()]));
    }

    #[test]
    fn missing_fields_are_malformed() {
        let err = parse(r#"{"issue":"x","sdg":"SDG 11","severity":null}"#).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, SdgScanError::MalformedOutput(_)));
        assert!(msg.contains("severity"));
        assert!(msg.contains("summary"));
        assert!(!msg.contains("issue,"));
    }

    #[test]
    fn non_json_is_malformed() {
        let err = parse("The issue is about SDG 11.").unwrap_err();
        assert!(matches!(err, SdgScanError::MalformedOutput(_)));

        let err = parse("```json\n```").unwrap_err();
        assert!(err.to_string().contains("no content"));

        let err = parse(r#"["issue"]"#).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn values_are_not_coerced() {
        let text = r#"{"issue":"x","sdg":11,"severity":3,"summary":"s","recommendation":"r","explanation":"e"}"#;
        let analysis = parse(text).unwrap();
        assert_eq!(analysis.sdg, "11");
        assert_eq!(analysis.severity, "3");
    }

    #[test]
    fn permissive_mode_accepts_out_of_domain_values() {
        let text = VALID.replace("SDG 11", "SDG 3").replace("Medium", "Critical");
        let analysis = parse(&text).unwrap();
        assert_eq!(analysis.sdg, "SDG 3");
        assert!(!analysis.is_conforming());
    }

    #[test]
    fn strict_mode_rejects_out_of_domain_values() {
        let strict = |text: &str| parse_analysis(&RawModelOutput::new(text), ValidationMode::Strict);

        assert!(strict(VALID).is_ok());

        let err = strict(&VALID.replace("SDG 11", "SDG 3")).unwrap_err();
        assert!(err.to_string().contains("SDG 3"));

        let err = strict(&VALID.replace("Medium", "Critical")).unwrap_err();
        assert!(err.to_string().contains("Critical"));
    }
}
