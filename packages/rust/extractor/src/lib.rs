//! Plain-text extraction from lesson documents.
//!
//! The [`TextExtractor`] decides whether a file is worth converting and hands
//! supported formats to a [`DocumentConverter`]. Unsupported formats yield an
//! empty string so one stray file never aborts a batch.

mod converter;

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use dialoguegen_shared::{DialogueGenError, DocumentFormat, DocumentRef, Result};

pub use converter::{CommandConverter, ConvertError, DocumentConverter};

/// Routes documents to the converter by extension.
#[derive(Clone)]
pub struct TextExtractor {
    converter: Arc<dyn DocumentConverter>,
    /// Lowercased extensions without the leading dot.
    supported: Vec<String>,
}

impl TextExtractor {
    pub fn new(converter: Arc<dyn DocumentConverter>, supported_extensions: &[String]) -> Self {
        let supported = supported_extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Self {
            converter,
            supported,
        }
    }

    /// Whether `format` is handed to the converter.
    pub fn supports(&self, format: &DocumentFormat) -> bool {
        self.supported.iter().any(|e| e == format.extension())
    }

    /// Extract plain text from `path`.
    ///
    /// Returns `""` for unsupported formats. Fails with `InvalidInput` when
    /// `path` is not a regular file and with `Extraction` when the converter
    /// fails. No retries happen here.
    pub async fn extract(&self, path: &Path) -> Result<String> {
        self.extract_document(&DocumentRef::new(path)).await
    }

    /// Same as [`extract`](Self::extract) for an already classified document.
    #[instrument(skip_all, fields(path = %doc.path.display()))]
    pub async fn extract_document(&self, doc: &DocumentRef) -> Result<String> {
        let path = doc.path.as_path();
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| DialogueGenError::invalid_input(path, e.to_string()))?;
        if !meta.is_file() {
            return Err(DialogueGenError::invalid_input(path, "not a regular file"));
        }

        if !self.supports(&doc.format) {
            warn!(extension = doc.format.extension(), "unsupported document format, skipping");
            return Ok(String::new());
        }

        match self.converter.convert(path).await {
            Ok(text) => {
                info!(chars = text.chars().count(), "extracted text");
                Ok(text)
            }
            Err(e) => {
                error!(error = %e, "document conversion failed");
                Err(DialogueGenError::extraction(path, e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Converter double that echoes the file name, or fails on demand.
    struct FakeConverter {
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeConverter {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl DocumentConverter for FakeConverter {
        async fn convert(&self, path: &Path) -> std::result::Result<String, ConvertError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ConvertError::Other("corrupt archive".into()));
            }
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            Ok(format!("text of {name}"))
        }
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "dg-extractor-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn default_extensions() -> Vec<String> {
        ["pdf", "docx", "ppt", "pptx"].map(String::from).to_vec()
    }

    #[tokio::test]
    async fn supported_file_is_converted() {
        let dir = temp_dir();
        let path = dir.join("Lesson1.PDF");
        std::fs::write(&path, b"%PDF").unwrap();

        let converter = FakeConverter::new(false);
        let extractor = TextExtractor::new(converter.clone(), &default_extensions());
        let text = extractor.extract(&path).await.unwrap();

        assert_eq!(text, "text of Lesson1.PDF");
        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn unsupported_file_is_skipped_without_conversion() {
        let dir = temp_dir();
        let path = dir.join("notes.txt");
        std::fs::write(&path, b"plain").unwrap();

        let converter = FakeConverter::new(false);
        let extractor = TextExtractor::new(converter.clone(), &default_extensions());
        let text = extractor.extract(&path).await.unwrap();

        assert!(text.is_empty());
        assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_file_is_invalid_input() {
        let extractor = TextExtractor::new(FakeConverter::new(false), &default_extensions());
        let err = extractor
            .extract(Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, DialogueGenError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn directory_is_invalid_input() {
        let dir = temp_dir();
        let extractor = TextExtractor::new(FakeConverter::new(false), &default_extensions());
        let err = extractor.extract(&dir).await.unwrap_err();
        assert!(matches!(err, DialogueGenError::InvalidInput { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn converter_failure_is_wrapped_with_path() {
        let dir = temp_dir();
        let path = dir.join("deck.pptx");
        std::fs::write(&path, b"PK").unwrap();

        let extractor = TextExtractor::new(FakeConverter::new(true), &default_extensions());
        let err = extractor.extract(&path).await.unwrap_err();

        match err {
            DialogueGenError::Extraction { path: p, message } => {
                assert_eq!(p, path);
                assert!(message.contains("corrupt archive"));
            }
            other => panic!("expected Extraction, got {other:?}"),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn document_format_decides_routing() {
        let dir = temp_dir();
        let path = dir.join("export.bin");
        std::fs::write(&path, b"%PDF").unwrap();
        let doc = DocumentRef {
            path: path.clone(),
            format: DocumentFormat::Pdf,
        };

        let converter = FakeConverter::new(false);
        let extractor = TextExtractor::new(converter.clone(), &default_extensions());

        assert_eq!(extractor.extract_document(&doc).await.unwrap(), "text of export.bin");
        assert!(extractor.extract(&path).await.unwrap().is_empty());
        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn configured_extensions_are_normalized() {
        let extractor = TextExtractor::new(
            FakeConverter::new(false),
            &[".PDF".to_string(), "Txt".to_string()],
        );
        assert!(extractor.supports(&DocumentFormat::Pdf));
        assert!(extractor.supports(&DocumentFormat::Other("txt".into())));
        assert!(!extractor.supports(&DocumentFormat::Docx));
    }
}
