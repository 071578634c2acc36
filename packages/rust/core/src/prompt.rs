//! Grounded prompt composition.

use sdgscan_knowledge::KnowledgeContext;
use sdgscan_shared::{IssueText, SdgCategory, Severity};

/// The instruction sent to the model for exactly one issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPrompt(String);

impl AnalysisPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Build the analysis prompt for `issue`, grounded in `context`.
///
/// Pure: identical inputs always produce the identical prompt.
pub fn compose(issue: &IssueText, context: &KnowledgeContext) -> AnalysisPrompt {
    let categories = SdgCategory::ALL
        .iter()
        .map(|c| {
            let note = if *c == SdgCategory::SustainableCities {
                " - primary; use it when unsure but the issue concerns the city"
            } else {
                ""
            };
            format!("- {} ({}){note}", c.code(), c.title())
        })
        .collect::<Vec<_>>()
        .join("\n");
    let codes = SdgCategory::ALL.map(|c| c.code()).join(", ");
    let severities = Severity::ALL.map(|s| s.as_str()).join(", ");

    let sources = if context.is_degraded() {
        "The knowledge base is unavailable. Rely on general SDG knowledge, say so in the \
explanation, and return an empty \"rag_sources\" list."
            .to_string()
    } else {
        format!(
            "Available documents: {}.",
            context.document_names().join(", ")
        )
    };

    AnalysisPrompt(format!(
        r#"You are an assistant for a local sustainability issue analyzer.
Classify the reported issue under exactly one of these UN Sustainable Development Goals:
{categories}

Use the knowledge base below to ground your classification and recommendation.
{sources}

Knowledge Base:
<<<
{knowledge}
>>>

Reported issue:
"""
{issue}
"""

Task:
1. Identify the core issue in a few words (e.g. "overflowing trash", "water leak").
2. Choose the single most relevant SDG from: {codes}.
3. Estimate severity as exactly one of: {severities}, based on urgency and impact.
4. Summarize the issue in one sentence.
5. Recommend a concrete action based on the best practices in the knowledge base.
6. Explain why this SDG applies, citing the specific knowledge base document and section or target you relied on (for example "sdgs.json, target 11.6"). A generic justification is not acceptable.
7. List the names of the knowledge base documents you cited in "rag_sources".

Respond with a single JSON object only, without prose or code fences, containing exactly these fields:
{{
  "issue": "string",
  "sdg": "one of {codes}",
  "severity": "one of {severities}",
  "summary": "string",
  "recommendation": "string",
  "explanation": "string",
  "rag_sources": ["document name"]
}}"#,
        knowledge = context.as_str(),
        issue = issue.as_str(),
    ))
}
