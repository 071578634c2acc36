//! Shared types, error model, and configuration for SdgScan.
//!
//! This crate is the foundation depended on by all other SdgScan crates.
//! It provides:
//! - [`SdgScanError`] is the unified error type
//! - Domain types ([`IssueText`], [`IssueAnalysis`], [`AnalysisOutcome`], [`BatchReport`])
//! - Configuration ([`AppConfig`], [`AnalyzeConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AnalyzeConfig, AppConfig, DefaultsConfig, GeminiConfig, KnowledgeConfig, RetryConfig,
    ValidationConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_api_key, validate_config,
};
pub use error::{Result, SdgScanError};
pub use types::{
    AnalysisOutcome, BatchId, BatchReport, ErrorReport, IssueAnalysis, IssueText, SdgCategory,
    Severity,
};
