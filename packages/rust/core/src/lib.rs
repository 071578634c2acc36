//! Intake and grounded analysis pipeline for SdgScan.
//!
//! This crate turns a user submission into an ordered batch of issue texts,
//! grounds each one in the knowledge context, asks the generation capability
//! for a structured classification, and collects per-item outcomes.

pub mod intake;
pub mod invoker;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod response;

#[cfg(test)]
mod test_support;

pub use intake::Submission;
pub use invoker::GenerationInvoker;
pub use pipeline::{AnalysisProgress, BatchAnalyzer, SilentProgress};
pub use prompt::{AnalysisPrompt, compose};
pub use response::{RawModelOutput, ValidationMode, parse_analysis, strip_fences};
