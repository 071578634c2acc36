//! End-to-end analysis: submission → normalize → compose → invoke → parse → report.
//!
//! Items are processed strictly one at a time, in input order. Request-level
//! problems (empty input, quota, unavailable capability) abort the batch, and
//! they are checked before any item is sent. Once items are in flight every
//! failure is recorded as that item's outcome and the batch moves on, including
//! a request-scoped error such as a key rejected mid-batch.

use tracing::{Span, error, info, instrument, warn};

use sdgscan_knowledge::KnowledgeContext;
use sdgscan_shared::{
    AnalysisOutcome, AnalyzeConfig, BatchId, BatchReport, IssueAnalysis, IssueText, Result,
    SdgScanError,
};

use crate::intake::{self, Submission};
use crate::invoker::GenerationInvoker;
use crate::normalize::check_quota;
use crate::prompt::compose;
use crate::response::{ValidationMode, parse_analysis};

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for batch analysis.
pub trait AnalysisProgress: Send + Sync {
    /// Called once the batch has passed request-level checks.
    fn batch_started(&self, total: usize);
    /// Called before an item is sent to the model.
    fn item_started(&self, index: usize, total: usize, issue: &IssueText);
    /// Called with each item's outcome.
    fn item_finished(&self, index: usize, total: usize, outcome: &AnalysisOutcome);
    /// Called when every item has an outcome.
    fn batch_finished(&self, report: &BatchReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl AnalysisProgress for SilentProgress {
    fn batch_started(&self, _total: usize) {}
    fn item_started(&self, _index: usize, _total: usize, _issue: &IssueText) {}
    fn item_finished(&self, _index: usize, _total: usize, _outcome: &AnalysisOutcome) {}
    fn batch_finished(&self, _report: &BatchReport) {}
}

// ---------------------------------------------------------------------------
// BatchAnalyzer
// ---------------------------------------------------------------------------

/// Runs batches of issues against the generation capability.
///
/// Holds the process-wide knowledge context and configuration; construct it
/// once and reuse it for every request.
#[derive(Clone)]
pub struct BatchAnalyzer {
    invoker: GenerationInvoker,
    knowledge: KnowledgeContext,
    config: AnalyzeConfig,
}

impl BatchAnalyzer {
    pub fn new(invoker: GenerationInvoker, knowledge: KnowledgeContext, config: AnalyzeConfig) -> Self {
        Self {
            invoker,
            knowledge,
            config,
        }
    }

    pub fn knowledge(&self) -> &KnowledgeContext {
        &self.knowledge
    }

    /// Analyze a raw submission (text, image, audio).
    #[instrument(skip_all, fields(batch = %BatchId::new(), entries))]
    pub async fn analyze_submission(
        &self,
        submission: &Submission,
        progress: &dyn AnalysisProgress,
    ) -> Result<BatchReport> {
        let entries = submission.entry_count();
        Span::current().record("entries", entries);
        if entries == 0 {
            return Err(SdgScanError::validation("No text provided for analysis."));
        }
        check_quota(entries, self.config.max_items)?;
        self.invoker.ensure_available()?;

        let items = intake::prepare_counted(
            submission,
            entries,
            self.invoker.capability(),
            self.config.max_items,
        )
        .await?;

        self.run_items(&items, progress).await
    }

    /// Analyze already-normalized issues.
    #[instrument(skip_all, fields(batch = %BatchId::new(), items = items.len()))]
    pub async fn run(
        &self,
        items: &[IssueText],
        progress: &dyn AnalysisProgress,
    ) -> Result<BatchReport> {
        if items.is_empty() {
            return Err(SdgScanError::validation("No text provided for analysis."));
        }
        check_quota(items.len(), self.config.max_items)?;
        self.invoker.ensure_available()?;

        self.run_items(items, progress).await
    }

    /// Analyze a single issue: compose → invoke → parse.
    pub async fn analyze_item(&self, issue: &IssueText) -> Result<IssueAnalysis> {
        let prompt = compose(issue, &self.knowledge);
        let raw = self.invoker.invoke(&prompt).await?;
        parse_analysis(&raw, ValidationMode::from_strict(self.config.strict))
    }

    async fn run_items(
        &self,
        items: &[IssueText],
        progress: &dyn AnalysisProgress,
    ) -> Result<BatchReport> {
        let total = items.len();
        progress.batch_started(total);
        info!(
            total,
            grounded = !self.knowledge.is_degraded(),
            "starting batch analysis"
        );

        let mut results = Vec::with_capacity(total);
        for (index, issue) in items.iter().enumerate() {
            progress.item_started(index, total, issue);

            let outcome = match self.analyze_item(issue).await {
                Ok(analysis) => AnalysisOutcome::Analyzed {
                    original_text: issue.as_str().to_string(),
                    analysis,
                },
                Err(e) => {
                    if e.is_item_scoped() {
                        warn!(index, error = %e, "issue analysis failed");
                    } else {
                        // e.g. key revoked mid-batch; still recorded per item.
                        error!(index, error = %e, "request-level failure mid-batch");
                    }
                    AnalysisOutcome::Failed {
                        original_text: issue.as_str().to_string(),
                        error: e.to_string(),
                    }
                }
            };

            progress.item_finished(index, total, &outcome);
            results.push(outcome);
        }

        let report = BatchReport { results };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "batch analysis complete"
        );
        progress.batch_finished(&report);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::test_support::{ScriptedCapability, analysis_json, issue_in};
    use sdgscan_provider::ImageInput;
    use sdgscan_shared::RetryConfig;

    fn analyzer(capability: Arc<ScriptedCapability>) -> BatchAnalyzer {
        BatchAnalyzer::new(
            GenerationInvoker::new(capability, RetryConfig::none()),
            KnowledgeContext::sentinel(),
            AnalyzeConfig {
                retry: RetryConfig::none(),
                ..AnalyzeConfig::default()
            },
        )
    }

    fn echo_capability() -> Arc<ScriptedCapability> {
        Arc::new(ScriptedCapability::new(|prompt, _| {
            Ok(analysis_json(issue_in(prompt), "SDG 11"))
        }))
    }

    fn issues(texts: &[&str]) -> Vec<IssueText> {
        texts.iter().map(|t| IssueText::new(*t).unwrap()).collect()
    }

    #[tokio::test]
    async fn outcomes_match_inputs_in_order() {
        let capability = echo_capability();
        let items = issues(&["trash overflow", "water leak near park", "pothole"]);

        let report = analyzer(capability.clone())
            .run(&items, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.results.len(), items.len());
        for (outcome, item) in report.results.iter().zip(&items) {
            assert_eq!(outcome.original_text(), item.as_str());
            assert_eq!(outcome.analysis().unwrap().issue, item.as_str());
        }
        assert_eq!(capability.calls(), 3);
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_the_others() {
        for k in 0..4 {
            let capability = Arc::new(ScriptedCapability::new(move |prompt, call| {
                if call == k {
                    Err(SdgScanError::transport("HTTP 503", true))
                } else {
                    Ok(analysis_json(issue_in(prompt), "SDG 6"))
                }
            }));
            let items = issues(&["a", "b", "c", "d"]);

            let report = analyzer(capability).run(&items, &SilentProgress).await.unwrap();

            assert_eq!(report.results.len(), 4);
            assert_eq!(report.failed(), 1);
            for (i, outcome) in report.results.iter().enumerate() {
                assert_eq!(outcome.original_text(), items[i].as_str());
                if i == k {
                    assert!(outcome.error().unwrap().contains("HTTP 503"));
                } else {
                    assert!(outcome.is_success(), "item {i} should succeed when {k} fails");
                }
            }
        }
    }

    #[tokio::test]
    async fn malformed_output_is_contained() {
        let capability = Arc::new(ScriptedCapability::new(|prompt, _| {
            let issue = issue_in(prompt);
            if issue == "bad" {
                Ok("I think this is SDG 11.".into())
            } else {
                Ok(format!("```json\n{}\n```", analysis_json(issue, "SDG 12")))
            }
        }));
        let items = issues(&["good", "bad", "also good"]);

        let report = analyzer(capability).run(&items, &SilentProgress).await.unwrap();

        assert!(report.results[0].is_success());
        assert!(report.results[1].error().unwrap().contains("malformed model output"));
        assert!(report.results[2].is_success());
        assert_eq!(report.results[2].analysis().unwrap().sdg, "SDG 12");
    }

    #[tokio::test]
    async fn unavailable_capability_short_circuits() {
        let capability = Arc::new(ScriptedCapability::unavailable());
        let items = issues(&["a", "b"]);

        let err = analyzer(capability.clone())
            .run(&items, &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, SdgScanError::CapabilityUnavailable(_)));
        assert_eq!(capability.calls(), 0);
    }

    #[tokio::test]
    async fn unavailable_capability_skips_image_description() {
        let capability = Arc::new(ScriptedCapability::unavailable());
        let submission = Submission {
            text: Some("pothole".into()),
            image: Some(ImageInput::from_bytes(b"GIF89a".to_vec())),
            audio: None,
        };

        let err = analyzer(capability.clone())
            .analyze_submission(&submission, &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, SdgScanError::CapabilityUnavailable(_)));
        assert_eq!(capability.calls(), 0);
        assert_eq!(capability.image_calls(), 0);
    }

    #[tokio::test]
    async fn quota_is_enforced_before_any_call() {
        let capability = echo_capability();
        let texts: Vec<String> = (0..11).map(|i| format!("issue {i}")).collect();
        let items: Vec<IssueText> = texts.iter().map(|t| IssueText::new(t.as_str()).unwrap()).collect();

        let err = analyzer(capability.clone())
            .run(&items, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, SdgScanError::QuotaExceeded { count: 11, .. }));

        let submission = Submission::from_text(serde_json::to_string(&texts).unwrap());
        let err = analyzer(capability.clone())
            .analyze_submission(&submission, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, SdgScanError::QuotaExceeded { .. }));

        assert_eq!(capability.calls(), 0);
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let capability = echo_capability();
        let err = analyzer(capability).run(&[], &SilentProgress).await.unwrap_err();
        assert!(matches!(err, SdgScanError::Validation { .. }));
    }

    #[tokio::test]
    async fn json_list_submission_end_to_end() {
        let capability = echo_capability();
        let submission = Submission::from_text(r#"["trash overflow", "water leak near park"]"#);

        let report = analyzer(capability.clone())
            .analyze_submission(&submission, &SilentProgress)
            .await
            .unwrap();

        let texts: Vec<&str> = report.results.iter().map(|o| o.original_text()).collect();
        assert_eq!(texts, vec!["trash overflow", "water leak near park"]);
        assert_eq!(capability.calls(), 2);
    }

    #[tokio::test]
    async fn streetlight_example_end_to_end() {
        let capability = Arc::new(ScriptedCapability::new(|_, _| {
            Ok(r#"{"issue":"broken streetlight","sdg":"SDG 11","severity":"Medium","summary":"...","recommendation":"...","explanation":"..."}"#.into())
        }));
        let submission = Submission::from_text(r#""broken streetlight on 5th ave""#);

        let report = analyzer(capability.clone())
            .analyze_submission(&submission, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].analysis().unwrap().sdg, "SDG 11");
        let prompt = &capability.prompts()[0];
        assert!(prompt.contains(r#""broken streetlight on 5th ave""#));
        for code in ["SDG 6", "SDG 11", "SDG 12", "SDG 13"] {
            assert!(prompt.contains(code));
        }
    }

    #[tokio::test]
    async fn mixed_channels_are_analyzed_in_arrival_order() {
        let capability = Arc::new(
            ScriptedCapability::new(|prompt, _| Ok(analysis_json(issue_in(prompt), "SDG 11")))
                .with_image_responder(|_| Ok("Litter along a canal.".into())),
        );
        let submission = Submission {
            text: Some("pothole".into()),
            image: Some(ImageInput::from_bytes(b"GIF89a".to_vec())),
            audio: Some(vec![0; 8]),
        };

        let report = analyzer(capability.clone())
            .analyze_submission(&submission, &SilentProgress)
            .await
            .unwrap();

        let texts: Vec<&str> = report.results.iter().map(|o| o.original_text()).collect();
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[0], "pothole");
        assert_eq!(texts[1], "[Image Analysis]: Litter along a canal.");
        assert!(texts[2].starts_with("[Audio received"));
        assert_eq!(capability.image_calls(), 1);
        assert_eq!(capability.calls(), 3);
    }

    #[tokio::test]
    async fn strict_mode_rejects_unknown_sdg_per_item() {
        let capability = Arc::new(ScriptedCapability::new(|prompt, _| {
            let issue = issue_in(prompt);
            let sdg = if issue == "odd" { "SDG 3" } else { "SDG 13" };
            Ok(analysis_json(issue, sdg))
        }));
        let analyzer = BatchAnalyzer::new(
            GenerationInvoker::new(capability, RetryConfig::none()),
            KnowledgeContext::sentinel(),
            AnalyzeConfig {
                strict: true,
                ..AnalyzeConfig::default()
            },
        );

        let report = analyzer
            .run(&issues(&["heat wave", "odd"]), &SilentProgress)
            .await
            .unwrap();

        assert!(report.results[0].is_success());
        assert!(report.results[1].error().unwrap().contains("SDG 3"));
    }

    #[tokio::test]
    async fn mid_batch_auth_failure_is_recorded_per_item() {
        let capability = Arc::new(ScriptedCapability::new(|prompt, call| {
            if call == 0 {
                Ok(analysis_json(issue_in(prompt), "SDG 11"))
            } else {
                Err(SdgScanError::CapabilityUnavailable("API key rejected".into()))
            }
        }));
        let items = issues(&["a", "b", "c"]);

        let report = analyzer(capability).run(&items, &SilentProgress).await.unwrap();

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.results[1].original_text(), "b");
        assert!(report.results[2].error().unwrap().contains("API key rejected"));
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl AnalysisProgress for RecordingProgress {
        fn batch_started(&self, total: usize) {
            self.events.lock().unwrap().push(format!("start {total}"));
        }
        fn item_started(&self, index: usize, _total: usize, _issue: &IssueText) {
            self.events.lock().unwrap().push(format!("item {index}"));
        }
        fn item_finished(&self, index: usize, _total: usize, outcome: &AnalysisOutcome) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done {index} {}", outcome.is_success()));
        }
        fn batch_finished(&self, report: &BatchReport) {
            self.events
                .lock()
                .unwrap()
                .push(format!("finish {}", report.results.len()));
        }
    }

    #[tokio::test]
    async fn progress_is_reported_per_item() {
        let progress = RecordingProgress::default();
        analyzer(echo_capability())
            .run(&issues(&["a", "b"]), &progress)
            .await
            .unwrap();

        assert_eq!(
            *progress.events.lock().unwrap(),
            vec!["start 2", "item 0", "done 0 true", "item 1", "done 1 true", "finish 2"]
        );
    }
}
