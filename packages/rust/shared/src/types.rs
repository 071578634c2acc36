//! Core domain types for SdgScan analyses.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SdgScanError};

// ---------------------------------------------------------------------------
// BatchId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one analysis batch in logs (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub Uuid);

impl BatchId {
    /// Generate a new time-sortable batch identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// IssueText
// ---------------------------------------------------------------------------

/// One normalized, non-empty issue description ready for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IssueText(String);

impl IssueText {
    /// Wrap a description, rejecting blank text.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SdgScanError::validation("issue text must not be empty"));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IssueText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// SdgCategory
// ---------------------------------------------------------------------------

/// The sustainability goals an issue may be classified under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SdgCategory {
    #[serde(rename = "SDG 6")]
    CleanWater,
    #[serde(rename = "SDG 11")]
    SustainableCities,
    #[serde(rename = "SDG 12")]
    ResponsibleConsumption,
    #[serde(rename = "SDG 13")]
    ClimateAction,
}

impl SdgCategory {
    /// Every allowed category, in goal-number order.
    pub const ALL: [SdgCategory; 4] = [
        Self::CleanWater,
        Self::SustainableCities,
        Self::ResponsibleConsumption,
        Self::ClimateAction,
    ];

    /// Goal number as published by the UN.
    pub fn number(&self) -> u8 {
        match self {
            Self::CleanWater => 6,
            Self::SustainableCities => 11,
            Self::ResponsibleConsumption => 12,
            Self::ClimateAction => 13,
        }
    }

    /// Identifier the model is asked to emit (e.g. `SDG 11`).
    pub fn code(&self) -> &'static str {
        match self {
            Self::CleanWater => "SDG 6",
            Self::SustainableCities => "SDG 11",
            Self::ResponsibleConsumption => "SDG 12",
            Self::ClimateAction => "SDG 13",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::CleanWater => "Clean Water & Sanitation",
            Self::SustainableCities => "Sustainable Cities & Communities",
            Self::ResponsibleConsumption => "Responsible Consumption & Production",
            Self::ClimateAction => "Climate Action",
        }
    }

    /// Recognize a category in free-form model output.
    ///
    /// Accepts `SDG 11`, `sdg11`, `11`, and decorated forms such as
    /// `SDG 11 (Sustainable Cities)`. Returns `None` for anything else.
    pub fn recognize(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let rest = match trimmed.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("sdg") => &trimmed[3..],
            _ => trimmed,
        };
        let rest = rest.trim_start_matches([' ', '-', '_']);
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        // Reject "110" or "11a" style tails glued to the number.
        if let Some(next) = rest[digits.len()..].chars().next() {
            if next.is_ascii_alphanumeric() {
                return None;
            }
        }
        let number: u8 = digits.parse().ok()?;
        Self::ALL.into_iter().find(|c| c.number() == number)
    }
}

impl std::fmt::Display for SdgCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Three-level urgency estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    /// Case-insensitive recognition of a severity label.
    pub fn recognize(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(value))
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// IssueAnalysis
// ---------------------------------------------------------------------------

/// Structured classification of one issue, as returned by the model.
///
/// `sdg` and `severity` keep the model's exact strings; use
/// [`IssueAnalysis::sdg_category`] and [`IssueAnalysis::severity_level`] to
/// interpret them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueAnalysis {
    pub issue: String,
    pub sdg: String,
    pub severity: String,
    pub summary: String,
    pub recommendation: String,
    pub explanation: String,
    /// Knowledge documents the explanation relies on.
    #[serde(
        default,
        alias = "citations",
        skip_serializing_if = "Option::is_none"
    )]
    pub rag_sources: Option<Vec<String>>,
}

impl IssueAnalysis {
    pub fn sdg_category(&self) -> Option<SdgCategory> {
        SdgCategory::recognize(&self.sdg)
    }

    pub fn severity_level(&self) -> Option<Severity> {
        Severity::recognize(&self.severity)
    }

    /// Both `sdg` and `severity` fall inside their allowed sets.
    pub fn is_conforming(&self) -> bool {
        self.sdg_category().is_some() && self.severity_level().is_some()
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result for one submitted issue: its analysis or the reason it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    Analyzed {
        original_text: String,
        analysis: IssueAnalysis,
    },
    Failed {
        original_text: String,
        error: String,
    },
}

impl AnalysisOutcome {
    pub fn original_text(&self) -> &str {
        match self {
            Self::Analyzed { original_text, .. } | Self::Failed { original_text, .. } => {
                original_text
            }
        }
    }

    pub fn analysis(&self) -> Option<&IssueAnalysis> {
        match self {
            Self::Analyzed { analysis, .. } => Some(analysis),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Analyzed { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Analyzed { .. })
    }
}

/// The body returned for a processed batch: one outcome per issue, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<AnalysisOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// The body returned when a request fails as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error: String,
}

impl From<&SdgScanError> for ErrorReport {
    fn from(err: &SdgScanError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}
