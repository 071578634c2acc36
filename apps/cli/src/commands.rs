//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use sdgscan_core::{AnalysisProgress, BatchAnalyzer, GenerationInvoker, Submission};
use sdgscan_knowledge::KnowledgeProvider;
use sdgscan_provider::{GeminiProvider, ImageInput};
use sdgscan_shared::{
    AnalysisOutcome, AnalyzeConfig, AppConfig, BatchReport, ErrorReport, IssueText, SdgScanError,
    init_config, load_config, load_config_from, resolve_api_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SdgScan: classify local sustainability reports against the UN SDGs.
#[derive(Parser)]
#[command(
    name = "sdgscan",
    version,
    about = "Classify local sustainability reports into SDG categories with grounded recommendations.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.sdgscan/sdgscan.toml.
    #[arg(long, global = true, env = "SDGSCAN_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Analyze reported issues and print the JSON report.
    Analyze {
        /// Issue text, or a JSON list of issue texts.
        #[arg(short, long)]
        text: Option<String>,

        /// Photo of the issue (PNG, JPEG, GIF or WEBP).
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Voice recording of the issue (not transcribed).
        #[arg(short, long)]
        audio: Option<PathBuf>,

        /// Knowledge directory or file (overrides config).
        #[arg(short, long)]
        knowledge: Option<String>,

        /// Reject analyses whose SDG or severity is outside the allowed sets.
        #[arg(long)]
        strict: bool,

        /// Print the report on one line.
        #[arg(long)]
        compact: bool,
    },

    /// Inspect the grounding knowledge base.
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Knowledge subcommands.
#[derive(Subcommand)]
pub(crate) enum KnowledgeAction {
    /// Print the assembled knowledge context.
    Show {
        /// Knowledge directory or file (overrides config).
        #[arg(short, long)]
        path: Option<String>,

        /// Only list the document names.
        #[arg(long)]
        names: bool,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr; stdout carries reports.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sdgscan=info",
        1 => "sdgscan=debug",
        _ => "sdgscan=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Analyze {
            text,
            image,
            audio,
            knowledge,
            strict,
            compact,
        } => {
            let request = AnalyzeRequest {
                text,
                image,
                audio,
                knowledge,
                strict,
                compact,
            };
            cmd_analyze(config_path.as_deref(), request).await
        }
        Command::Knowledge { action } => match action {
            KnowledgeAction::Show { path, names } => {
                cmd_knowledge_show(config_path.as_deref(), path.as_deref(), names)
            }
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

struct AnalyzeRequest {
    text: Option<String>,
    image: Option<PathBuf>,
    audio: Option<PathBuf>,
    knowledge: Option<String>,
    strict: bool,
    compact: bool,
}

async fn cmd_analyze(config_path: Option<&Path>, request: AnalyzeRequest) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(path) = request.knowledge {
        config.knowledge.path = path;
    }
    if request.strict {
        config.validation.strict = true;
    }

    let submission = Submission {
        text: request.text,
        image: request
            .image
            .as_deref()
            .map(read_file)
            .transpose()?
            .map(ImageInput::from_bytes),
        audio: request.audio.as_deref().map(read_file).transpose()?,
    };

    let provider = GeminiProvider::new(&config.gemini, resolve_api_key(&config))?;
    let knowledge = KnowledgeProvider::new(&config.knowledge.path);
    let analyzer = BatchAnalyzer::new(
        GenerationInvoker::new(Arc::new(provider), config.retry.clone()),
        knowledge.get_context().clone(),
        AnalyzeConfig::from(&config),
    );

    info!(
        model = %config.gemini.model,
        knowledge = %knowledge.location().display(),
        documents = analyzer.knowledge().document_names().len(),
        "analyzing submission"
    );

    let reporter = CliProgress::new();
    let result = analyzer.analyze_submission(&submission, &reporter).await;
    reporter.finish();

    match result {
        Ok(report) => {
            print_json(&report, request.compact)?;
            print_summary(&report);
            Ok(())
        }
        Err(e @ SdgScanError::CapabilityUnavailable(_)) => {
            print_json(&ErrorReport::from(&e), request.compact)?;
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| SdgScanError::io(path, e).into())
}

fn print_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{json}");
    Ok(())
}

fn print_summary(report: &BatchReport) {
    eprintln!();
    eprintln!("  Analyzed: {}", report.results.len());
    eprintln!("  Succeeded: {}", report.succeeded());
    eprintln!("  Failed:    {}", report.failed());
    eprintln!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        spinner.set_message("Preparing submission");
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl AnalysisProgress for CliProgress {
    fn batch_started(&self, total: usize) {
        self.spinner.set_message(format!("Analyzing {total} issue(s)"));
    }

    fn item_started(&self, index: usize, total: usize, issue: &IssueText) {
        self.spinner.set_message(format!(
            "Analyzing [{}/{total}] {}",
            index + 1,
            preview(issue.as_str(), 60)
        ));
    }

    fn item_finished(&self, index: usize, total: usize, outcome: &AnalysisOutcome) {
        if let Some(error) = outcome.error() {
            self.spinner
                .println(format!("  [{}/{total}] failed: {error}", index + 1));
        }
    }

    fn batch_finished(&self, _report: &BatchReport) {
        self.spinner.set_message("Done");
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    match line.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &line[..idx]),
        None => line.to_string(),
    }
}

// ---------------------------------------------------------------------------
// knowledge / config
// ---------------------------------------------------------------------------

fn cmd_knowledge_show(config_path: Option<&Path>, path: Option<&str>, names: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    let provider = KnowledgeProvider::new(path.unwrap_or(&config.knowledge.path));
    let context = provider.get_context();

    if context.is_degraded() {
        eprintln!(
            "  No grounding documents found at '{}'.",
            provider.location().display()
        );
    }

    if names {
        for name in context.document_names() {
            println!("{name}");
        }
    } else {
        println!("{}", context.as_str());
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Created config at {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let rendered =
        toml::to_string_pretty(&config).map_err(|e| eyre!("failed to render config: {e}"))?;
    println!("{rendered}");

    let key_state = if resolve_api_key(&config).is_some() {
        "set"
    } else {
        "NOT set"
    };
    println!("# {} is {key_state}", config.gemini.api_key_env);
    Ok(())
}
