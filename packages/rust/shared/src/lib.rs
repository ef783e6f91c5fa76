//! Shared types, error model, and configuration for DialogueGen.
//!
//! This crate is the foundation depended on by all other DialogueGen crates.
//! It provides:
//! - [`DialogueGenError`]: the unified error type
//! - Domain types ([`DialogueRecord`], [`Utterance`], [`DocumentRef`], [`RunId`])
//! - Configuration ([`AppConfig`], section structs, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ExtractionConfig, LlmRetryConfig, ModelConfig, PathsConfig, RateLimitConfig,
    StageRetryConfig, StagesConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, validate_api_key,
};
pub use error::{DialogueGenError, Result};
pub use types::{DialogueRecord, DocumentFormat, DocumentRef, RunId, Utterance};
