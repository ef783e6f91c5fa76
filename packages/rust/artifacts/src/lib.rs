//! Generation artifact writer.
//!
//! Each successful run produces one pretty-printed JSON file named from the
//! wall-clock time, e.g. `generated_dialogues_20260118_142501_123456.json`.
//! Writes go to a hidden temp file first and are renamed into place, so a
//! failed write never leaves a partial artifact behind.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, instrument, warn};

use dialoguegen_shared::{DialogueGenError, DialogueRecord, Result};

/// Artifact file name prefix.
const ARTIFACT_PREFIX: &str = "generated_dialogues_";

/// Timestamp layout with microsecond resolution.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// Writes dialogue records into an output directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Persist `records` and return the artifact path.
    ///
    /// Fails with `NothingToSave` on an empty slice and `Persistence` on any
    /// I/O failure. Does not check for name collisions.
    #[instrument(skip_all, fields(dir = %self.output_dir.display(), records = records.len()))]
    pub fn save(&self, records: &[DialogueRecord]) -> Result<PathBuf> {
        if records.is_empty() {
            return Err(DialogueGenError::NothingToSave);
        }

        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| DialogueGenError::persistence(&self.output_dir, e))?;

        let filename = artifact_file_name(&Local::now().format(TIMESTAMP_FORMAT).to_string());
        let target = self.output_dir.join(&filename);
        let temp = self.output_dir.join(format!(".{filename}.tmp"));

        let json = serde_json::to_string_pretty(records)
            .map_err(|e| DialogueGenError::persistence(&target, e.into()))?;

        if let Err(e) = std::fs::write(&temp, json) {
            remove_temp(&temp);
            return Err(DialogueGenError::persistence(&target, e));
        }
        debug!(path = %temp.display(), "wrote temp artifact");

        if let Err(e) = std::fs::rename(&temp, &target) {
            remove_temp(&temp);
            return Err(DialogueGenError::persistence(&target, e));
        }

        info!(path = %target.display(), "dialogues saved");
        Ok(target)
    }
}

/// Read an artifact back into records.
pub fn load(path: &Path) -> Result<Vec<DialogueRecord>> {
    let content = std::fs::read_to_string(path).map_err(|e| DialogueGenError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        DialogueGenError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })
}

fn artifact_file_name(timestamp: &str) -> String {
    format!("{ARTIFACT_PREFIX}{timestamp}.json")
}

fn remove_temp(temp: &Path) {
    if temp.exists() {
        if let Err(e) = std::fs::remove_file(temp) {
            warn!(path = %temp.display(), error = %e, "failed to remove temp artifact");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
