//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use dialoguegen_core::generator::DialogueGenerator;
use dialoguegen_core::pipeline::{
    Pipeline, PipelineFailure, ProgressReporter, RunContext, RunOverrides, RunReport, Stage,
};
use dialoguegen_extractor::{CommandConverter, TextExtractor};
use dialoguegen_llm::{GeminiProvider, LlmClient, RetrySettings};
use dialoguegen_shared::{AppConfig, init_config, load_config, load_config_from, validate_api_key};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// DialogueGen: lesson documents in, dialogue corpus out.
#[derive(Parser)]
#[command(
    name = "dialoguegen",
    version,
    about = "Generate short two-speaker dialogues from lesson documents.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.dialoguegen/dialoguegen.toml.
    #[arg(long, global = true, env = "DIALOGUEGEN_CONFIG")]
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
    /// Run the pipeline once over the input directory.
    Generate {
        /// Directory holding the lesson documents.
        #[arg(short, long)]
        input_dir: Option<PathBuf>,

        /// Directory the artifact is written to.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Model key from [model.models].
        #[arg(short, long)]
        model: Option<String>,

        /// Treat documents that fail extraction as empty instead of aborting.
        #[arg(long)]
        skip_failed: bool,

        /// Print the generated dialogues after saving.
        #[arg(long)]
        print: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
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

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "dialoguegen=info",
        1 => "dialoguegen=debug",
        _ => "dialoguegen=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
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
        Command::Generate {
            input_dir,
            output_dir,
            model,
            skip_failed,
            print,
        } => {
            let overrides = RunOverrides {
                input_dir,
                output_dir,
                model_key: model,
            };
            cmd_generate(config_path.as_deref(), overrides, skip_failed, print).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_deref()).await,
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
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_generate(
    config_path: Option<&Path>,
    overrides: RunOverrides,
    skip_failed: bool,
    print: bool,
) -> Result<()> {
    // Validate API key before doing anything
    let config = resolve_config(config_path)?;
    let api_key = validate_api_key(&config)?;

    let mut ctx = RunContext::from_config(&config, overrides);
    ctx.skip_failed_documents |= skip_failed;

    let provider = GeminiProvider::new(
        api_key,
        config.model.base_url.clone(),
        Duration::from_secs(config.model.request_timeout_secs),
    )?;
    let llm = LlmClient::new(
        Arc::new(provider),
        Arc::clone(&ctx.rate_limiter),
        config.model.models.clone(),
        RetrySettings::from(&config.llm_retry),
    );
    let converter = CommandConverter::from_command_line(&config.extraction.converter_command);
    let extractor = TextExtractor::new(
        Arc::new(converter),
        &config.extraction.supported_extensions,
    );

    info!(
        input = %ctx.input_dir.display(),
        output = %ctx.output_dir.display(),
        model = %ctx.model_key,
        "starting generation run"
    );

    let pipeline = Pipeline::new(ctx, extractor, DialogueGenerator::new(llm));
    let reporter = CliProgress::new();
    let report = pipeline.run(&reporter).await?;

    if print {
        for record in &report.records {
            println!("{record}");
        }
    }

    // Print summary
    println!();
    println!("  Dialogues generated successfully!");
    println!("  Run:       {}", report.run_id);
    println!("  Dialogues: {}", report.record_count());
    println!(
        "  Documents: {} ({} empty)",
        report.documents, report.empty_documents
    );
    println!("  Artifact:  {}", report.artifact_path.display());
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
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
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, stage: Stage) {
        let message = match stage {
            Stage::Validating => "Validating input",
            Stage::Extracting => "Extracting text",
            Stage::Combining => "Combining documents",
            Stage::Generating => "Generating dialogues",
            Stage::Persisting => "Saving artifact",
        };
        self.spinner.set_message(message);
    }

    fn document_extracted(&self, path: &Path, done: usize, total: usize) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.spinner
            .set_message(format!("Extracting [{done}/{total}] {name}"));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }

    fn failed(&self, _failure: &PipelineFailure) {
        self.spinner.finish_and_clear();
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
