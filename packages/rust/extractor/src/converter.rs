//! Document-to-text conversion capability.
//!
//! The default [`CommandConverter`] shells out to an external converter
//! (`markitdown` unless configured otherwise) and reads the text from stdout.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Failure raised by a [`DocumentConverter`]. Opaque to the extractor.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("failed to launch converter `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("converter `{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("converter output is not valid UTF-8")]
    InvalidUtf8,

    #[error("{0}")]
    Other(String),
}

/// Turns a supported document into plain text.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, path: &Path) -> Result<String, ConvertError>;
}

/// Runs `<command> [args..] <path>` and captures stdout.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    command: String,
    args: Vec<String>,
}

impl CommandConverter {
    /// Build from a command line such as `"markitdown"` or `"pandoc -t plain"`.
    pub fn from_command_line(command_line: &str) -> Self {
        let mut parts = command_line.split_whitespace().map(String::from);
        let command = parts.next().unwrap_or_default();
        Self {
            command,
            args: parts.collect(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl DocumentConverter for CommandConverter {
    async fn convert(&self, path: &Path) -> Result<String, ConvertError> {
        debug!(command = %self.command, path = %path.display(), "running converter");

        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ConvertError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::Failed {
                command: self.command.clone(),
                status: output.status.to_string(),
                stderr: stderr.trim().chars().take(500).collect(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| ConvertError::InvalidUtf8)
    }
}
