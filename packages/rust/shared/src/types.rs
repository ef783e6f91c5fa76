//! Core domain types for DialogueGen runs.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// DocumentRef
// ---------------------------------------------------------------------------

/// Format tag inferred from a file extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Ppt,
    Pptx,
    /// Any other extension, lowercased. Empty when the file has none.
    Other(String),
}

impl DocumentFormat {
    /// Infer the format from a path's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "ppt" => Self::Ppt,
            "pptx" => Self::Pptx,
            _ => Self::Other(ext),
        }
    }

    /// The lowercased extension this format was inferred from.
    pub fn extension(&self) -> &str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Ppt => "ppt",
            Self::Pptx => "pptx",
            Self::Other(ext) => ext,
        }
    }
}

/// A discovered input document. Created at directory-scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub path: PathBuf,
    pub format: DocumentFormat,
}

impl DocumentRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = DocumentFormat::from_path(&path);
        Self { path, format }
    }
}

// ---------------------------------------------------------------------------
// Dialogue records
// ---------------------------------------------------------------------------

/// One line of a dialogue.
///
/// On the wire this is a single-key object: `{"A": "marhaban"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub speaker_id: String,
    pub utterance: String,
}

impl Utterance {
    pub fn new(speaker_id: impl Into<String>, utterance: impl Into<String>) -> Self {
        Self {
            speaker_id: speaker_id.into(),
            utterance: utterance.into(),
        }
    }
}

impl Serialize for Utterance {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.speaker_id, &self.utterance)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Utterance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct UtteranceVisitor;

        impl<'de> Visitor<'de> for UtteranceVisitor {
            type Value = Utterance;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a single-key object mapping a speaker to an utterance")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Utterance, A::Error> {
                let (speaker_id, utterance): (String, String) = map
                    .next_entry()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;

                if map.next_key::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::custom(
                        "utterance object must have exactly one speaker key",
                    ));
                }

                Ok(Utterance {
                    speaker_id,
                    utterance,
                })
            }
        }

        deserializer.deserialize_map(UtteranceVisitor)
    }
}

/// A generated topic plus its ordered speaker exchanges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueRecord {
    pub topic: String,
    pub dialogue: Vec<Utterance>,
}

impl fmt::Display for DialogueRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Topic: {}", self.topic)?;
        for line in &self.dialogue {
            writeln!(f, "  {}: {}", line.speaker_id, line.utterance)?;
        }
        Ok(())
    }
}
