//! Application configuration for DialogueGen.
//!
//! User config lives at `~/.dialoguegen/dialoguegen.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DialogueGenError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "dialoguegen.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".dialoguegen";

// ---------------------------------------------------------------------------
// Config structs (matching dialoguegen.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input and output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Generation model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Process-wide call budget for the model.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Retry/backoff inside the LLM client.
    #[serde(default)]
    pub llm_retry: LlmRetryConfig,

    /// Per-stage retry policies for the pipeline.
    #[serde(default)]
    pub stages: StagesConfig,

    /// Document extraction settings.
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Flat directory of lesson documents.
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Directory that receives one JSON artifact per run.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("data/input")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("data/output")
}

/// `[model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model key used when the caller does not pick one.
    #[serde(default = "default_model_key")]
    pub default_model_key: String,

    /// Base URL of the generation API.
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    /// Per-request timeout for the remote call.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Model key → provider model identifier.
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model_key: default_model_key(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            models: default_models(),
        }
    }
}

impl ModelConfig {
    /// Resolve a model key to the provider's model identifier.
    pub fn resolve(&self, model_key: &str) -> Option<&str> {
        self.models.get(model_key).map(String::as_str)
    }
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_model_key() -> String {
    "gemini-flash".into()
}
fn default_base_url() -> Url {
    Url::parse("https://generativelanguage.googleapis.com/v1beta/")
        .unwrap_or_else(|_| unreachable!("default base URL is valid"))
}
fn default_request_timeout() -> u64 {
    120
}
fn default_models() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("gemini-flash".to_string(), "gemini-2.0-flash".to_string()),
        ("gemini-flash-lite".to_string(), "gemini-2.0-flash-lite".to_string()),
        ("gemini-pro".to_string(), "gemini-1.5-pro".to_string()),
    ])
}

/// `[rate_limit]` section: at most `calls` per rolling `period_secs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_calls")]
    pub calls: u32,

    #[serde(default = "default_rate_period")]
    pub period_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            calls: default_rate_calls(),
            period_secs: default_rate_period(),
        }
    }
}

fn default_rate_calls() -> u32 {
    10
}
fn default_rate_period() -> u64 {
    60
}

/// `[llm_retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRetryConfig {
    /// Total attempts against the remote model, including the first.
    #[serde(default = "default_llm_attempts")]
    pub max_attempts: u32,

    /// Exponential backoff base.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff delay.
    #[serde(default = "default_backoff_cap")]
    pub backoff_cap_ms: u64,
}

impl Default for LlmRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_llm_attempts(),
            backoff_base_ms: default_backoff_base(),
            backoff_cap_ms: default_backoff_cap(),
        }
    }
}

fn default_llm_attempts() -> u32 {
    3
}
fn default_backoff_base() -> u64 {
    1_000
}
fn default_backoff_cap() -> u64 {
    30_000
}

/// Attempts and fixed delay for one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRetryConfig {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay between attempts.
    #[serde(default)]
    pub delay_secs: u64,
}

impl StageRetryConfig {
    const fn new(attempts: u32, delay_secs: u64) -> Self {
        Self {
            attempts,
            delay_secs,
        }
    }
}

/// `[stages]` section. Validation is never retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagesConfig {
    #[serde(default = "default_extract_stage")]
    pub extract: StageRetryConfig,

    #[serde(default = "default_combine_stage")]
    pub combine: StageRetryConfig,

    #[serde(default = "default_generate_stage")]
    pub generate: StageRetryConfig,

    #[serde(default = "default_persist_stage")]
    pub persist: StageRetryConfig,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            extract: default_extract_stage(),
            combine: default_combine_stage(),
            generate: default_generate_stage(),
            persist: default_persist_stage(),
        }
    }
}

fn default_extract_stage() -> StageRetryConfig {
    StageRetryConfig::new(2, 10)
}
fn default_combine_stage() -> StageRetryConfig {
    StageRetryConfig::new(2, 0)
}
fn default_generate_stage() -> StageRetryConfig {
    StageRetryConfig::new(2, 15)
}
fn default_persist_stage() -> StageRetryConfig {
    StageRetryConfig::new(2, 0)
}

/// `[extraction]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Extensions handed to the converter; anything else is skipped.
    #[serde(default = "default_supported_extensions")]
    pub supported_extensions: Vec<String>,

    /// External document-to-text program, invoked as `<cmd> <path>`.
    #[serde(default = "default_converter_command")]
    pub converter_command: String,

    /// Maximum documents converted at once.
    #[serde(default = "default_extract_concurrency")]
    pub concurrency: usize,

    /// Treat a document that still fails after its retries as an empty
    /// unit instead of failing the run.
    #[serde(default)]
    pub skip_failed_documents: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            supported_extensions: default_supported_extensions(),
            converter_command: default_converter_command(),
            concurrency: default_extract_concurrency(),
            skip_failed_documents: false,
        }
    }
}

fn default_supported_extensions() -> Vec<String> {
    ["pdf", "docx", "ppt", "pptx"].map(String::from).to_vec()
}
fn default_converter_command() -> String {
    "markitdown".into()
}
fn default_extract_concurrency() -> usize {
    4
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.dialoguegen/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DialogueGenError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.dialoguegen/dialoguegen.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| DialogueGenError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        DialogueGenError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    config.validate()?;
    Ok(config)
}

impl AppConfig {
    /// Reject values that would make a run impossible.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.calls == 0 || self.rate_limit.period_secs == 0 {
            return Err(DialogueGenError::config(
                "rate_limit.calls and rate_limit.period_secs must be positive",
            ));
        }
        if self.llm_retry.max_attempts == 0 {
            return Err(DialogueGenError::config("llm_retry.max_attempts must be at least 1"));
        }
        let stages = [
            ("extract", &self.stages.extract),
            ("combine", &self.stages.combine),
            ("generate", &self.stages.generate),
            ("persist", &self.stages.persist),
        ];
        for (name, stage) in stages {
            if stage.attempts == 0 {
                return Err(DialogueGenError::config(format!(
                    "stages.{name}.attempts must be at least 1"
                )));
            }
        }
        if self.extraction.concurrency == 0 {
            return Err(DialogueGenError::config("extraction.concurrency must be at least 1"));
        }
        if self.model.resolve(&self.model.default_model_key).is_none() {
            return Err(DialogueGenError::config(format!(
                "default model key '{}' is not listed in [model.models]",
                self.model.default_model_key
            )));
        }
        Ok(())
    }
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DialogueGenError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DialogueGenError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DialogueGenError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API key from the configured env var, failing if unset or empty.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.model.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(DialogueGenError::config(format!(
            "Generation API key not found. Set the {var_name} environment variable."
        ))),
    }
}
