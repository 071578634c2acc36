//! Application configuration for SdgScan.
//!
//! User config lives at `~/.sdgscan/sdgscan.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SdgScanError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sdgscan.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sdgscan";

// ---------------------------------------------------------------------------
// Config structs (matching sdgscan.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Gemini settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Retry policy for transient generation failures.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Grounding documents.
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Output validation.
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Maximum number of issue entries per request.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
        }
    }
}

fn default_max_items() -> usize {
    10
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for issue analysis.
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used to caption uploaded images.
    #[serde(default = "default_model")]
    pub vision_model: String,

    /// REST API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            vision_model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn default_timeout_secs() -> u64 {
    60
}

/// `[retry]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for a single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        let ms = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    8_000
}

/// `[knowledge]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Directory (or single file) holding the grounding documents.
    #[serde(default = "default_knowledge_path")]
    pub path: String,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            path: default_knowledge_path(),
        }
    }
}

fn default_knowledge_path() -> String {
    "data/knowledge".into()
}

/// `[validation]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Reject analyses whose `sdg` or `severity` is outside the allowed sets.
    #[serde(default)]
    pub strict: bool,
}

// ---------------------------------------------------------------------------
// Analyze config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime analysis configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct AnalyzeConfig {
    /// Maximum number of normalized issues per request.
    pub max_items: usize,
    /// Retry policy for the generation call.
    pub retry: RetryConfig,
    /// Strict enum validation of `sdg` / `severity`.
    pub strict: bool,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for AnalyzeConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_items: config.defaults.max_items,
            retry: config.retry.clone(),
            strict: config.validation.strict,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sdgscan/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SdgScanError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sdgscan/sdgscan.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SdgScanError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        SdgScanError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject values the pipeline cannot run with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.defaults.max_items == 0 {
        return Err(SdgScanError::config("defaults.max_items must be at least 1"));
    }
    if config.retry.max_attempts == 0 {
        return Err(SdgScanError::config("retry.max_attempts must be at least 1"));
    }
    url::Url::parse(&config.gemini.base_url).map_err(|e| {
        SdgScanError::config(format!(
            "gemini.base_url '{}' is not a valid URL: {e}",
            config.gemini.base_url
        ))
    })?;
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SdgScanError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SdgScanError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SdgScanError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the Gemini API key from the configured env var.
///
/// Returns `None` when the variable is unset or empty; callers decide whether
/// that is fatal.
pub fn resolve_api_key(config: &AppConfig) -> Option<String> {
    std::env::var(&config.gemini.api_key_env)
        .ok()
        .filter(|val| !val.trim().is_empty())
}
