//! Error types for DialogueGen.
//!
//! Library crates use [`DialogueGenError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all DialogueGen operations.
#[derive(Debug, thiserror::Error)]
pub enum DialogueGenError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A path handed to the extractor is not an existing regular file.
    #[error("invalid input {path:?}: {reason}")]
    InvalidInput { path: PathBuf, reason: String },

    /// The input directory is missing or holds no regular files.
    #[error("no input in {dir:?}: {reason}")]
    NoInput { dir: PathBuf, reason: String },

    /// The document converter failed on a supported file.
    #[error("extraction failed for {path:?}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// The combined corpus has no content to send to the model.
    #[error("corpus is empty, refusing to call the model")]
    EmptyInput,

    /// The model response parsed but held zero dialogue records.
    #[error("no dialogues were generated")]
    NoDialoguesGenerated,

    /// Non-transient provider fault (bad request, auth, unknown model).
    #[error("LLM invocation failed for model {model}: {message}")]
    LlmInvocation { model: String, message: String },

    /// Every attempt hit a transient provider fault.
    #[error("LLM unavailable for model {model} after {attempts} attempts: {last_error}")]
    LlmExhausted {
        model: String,
        attempts: u32,
        last_error: String,
    },

    /// The model output did not parse or validate. `raw` keeps the full
    /// response text for diagnosis.
    #[error("response format error: {reason}")]
    ResponseFormat { reason: String, raw: String },

    /// Writing the generation artifact failed.
    #[error("failed to persist dialogues to {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The persistence writer was handed zero records.
    #[error("no dialogues to save")]
    NothingToSave,

    /// Filesystem I/O error outside the persistence writer.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DialogueGenError>;

impl DialogueGenError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an invalid-input error for `path`.
    pub fn invalid_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a no-input error for directory `dir`.
    pub fn no_input(dir: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::NoInput {
            dir: dir.into(),
            reason: reason.into(),
        }
    }

    /// Create an extraction error carrying the failing path.
    pub fn extraction(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a response-format error that keeps the raw model output.
    pub fn response_format(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::ResponseFormat {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap an artifact write failure with its target path.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Whether a pipeline stage may re-run after this error.
    ///
    /// Bad requests and malformed inputs fail the same way on every attempt,
    /// so only faults that can plausibly clear up are retried.
    pub fn is_stage_retryable(&self) -> bool {
        matches!(
            self,
            Self::Extraction { .. }
                | Self::LlmExhausted { .. }
                | Self::ResponseFormat { .. }
                | Self::NoDialoguesGenerated
                | Self::Persistence { .. }
                | Self::Io { .. }
        )
    }
}
