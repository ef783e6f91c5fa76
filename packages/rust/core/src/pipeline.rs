//! End-to-end generation run: validate → extract → combine → generate → persist.
//!
//! Each stage runs under its own [`RetryPolicy`]. The first stage failure
//! that survives its retries ends the run as a [`PipelineFailure`] naming
//! the stage; nothing is persisted on failure.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use dialoguegen_artifacts::ArtifactWriter;
use dialoguegen_extractor::TextExtractor;
use dialoguegen_llm::RateLimiter;
use dialoguegen_shared::{
    AppConfig, DialogueGenError, DialogueRecord, DocumentRef, Result, RunId,
};

use crate::corpus;
use crate::generator::DialogueGenerator;
use crate::retry::RetryPolicy;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validating,
    Extracting,
    Combining,
    Generating,
    Persisting,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Extracting => "extracting",
            Self::Combining => "combining",
            Self::Generating => "generating",
            Self::Persisting => "persisting",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run that ended in failure, with the stage it failed in.
#[derive(Debug, thiserror::Error)]
#[error("run failed while {stage}: {source}")]
pub struct PipelineFailure {
    pub stage: Stage,
    #[source]
    pub source: DialogueGenError,
}

impl PipelineFailure {
    fn at(stage: Stage) -> impl FnOnce(DialogueGenError) -> Self {
        move |source| Self { stage, source }
    }
}

/// Retry policy for every retried stage. Validation is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePolicies {
    pub extract: RetryPolicy,
    pub combine: RetryPolicy,
    pub generate: RetryPolicy,
    pub persist: RetryPolicy,
}

impl Default for StagePolicies {
    fn default() -> Self {
        Self {
            extract: RetryPolicy::none(),
            combine: RetryPolicy::none(),
            generate: RetryPolicy::none(),
            persist: RetryPolicy::none(),
        }
    }
}

/// Per-invocation values that override the loaded config.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub model_key: Option<String>,
}

/// Everything one run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Forwarded to the LLM client unchanged.
    pub model_key: String,
    pub policies: StagePolicies,
    /// Maximum documents converted at once.
    pub extract_concurrency: usize,
    pub skip_failed_documents: bool,
    /// Shared by every LLM call made from this process.
    pub rate_limiter: Arc<RateLimiter>,
}

impl RunContext {
    /// Build a context from `config`, applying `overrides` on top.
    pub fn from_config(config: &AppConfig, overrides: RunOverrides) -> Self {
        Self {
            input_dir: overrides
                .input_dir
                .unwrap_or_else(|| config.paths.input_dir.clone()),
            output_dir: overrides
                .output_dir
                .unwrap_or_else(|| config.paths.output_dir.clone()),
            model_key: overrides
                .model_key
                .unwrap_or_else(|| config.model.default_model_key.clone()),
            policies: StagePolicies {
                extract: (&config.stages.extract).into(),
                combine: (&config.stages.combine).into(),
                generate: (&config.stages.generate).into(),
                persist: (&config.stages.persist).into(),
            },
            extract_concurrency: config.extraction.concurrency.max(1),
            skip_failed_documents: config.extraction.skip_failed_documents,
            rate_limiter: Arc::new(RateLimiter::new(
                config.rate_limit.calls,
                Duration::from_secs(config.rate_limit.period_secs),
            )),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub artifact_path: PathBuf,
    pub records: Vec<DialogueRecord>,
    /// Regular files found in the input directory.
    pub documents: usize,
    /// Documents that contributed no text (unsupported, empty, or skipped after failure).
    pub empty_documents: usize,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a stage.
    fn stage(&self, stage: Stage);
    /// Called each time a document finishes extraction.
    fn document_extracted(&self, path: &Path, done: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, report: &RunReport);
    /// Called when the run fails.
    fn failed(&self, failure: &PipelineFailure);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: Stage) {}
    fn document_extracted(&self, _path: &Path, _done: usize, _total: usize) {}
    fn done(&self, _report: &RunReport) {}
    fn failed(&self, _failure: &PipelineFailure) {}
}

/// A configured generation run.
pub struct Pipeline {
    ctx: RunContext,
    extractor: TextExtractor,
    generator: DialogueGenerator,
    writer: ArtifactWriter,
}

impl Pipeline {
    pub fn new(ctx: RunContext, extractor: TextExtractor, generator: DialogueGenerator) -> Self {
        let writer = ArtifactWriter::new(&ctx.output_dir);
        Self {
            ctx,
            extractor,
            generator,
            writer,
        }
    }

    /// Execute one run, start to finish. Every call gets a fresh [`RunId`].
    pub async fn run(
        &self,
        progress: &dyn ProgressReporter,
    ) -> std::result::Result<RunReport, PipelineFailure> {
        self.run_with_id(RunId::new(), progress).await
    }

    #[instrument(skip_all, fields(run_id = %run_id, input = %self.ctx.input_dir.display()))]
    async fn run_with_id(
        &self,
        run_id: RunId,
        progress: &dyn ProgressReporter,
    ) -> std::result::Result<RunReport, PipelineFailure> {
        info!("starting run");
        let result = self.run_stages(run_id, progress).await;
        match &result {
            Ok(report) => {
                info!(
                    artifact = %report.artifact_path.display(),
                    records = report.record_count(),
                    documents = report.documents,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "run complete"
                );
                progress.done(report);
            }
            Err(failure) => {
                error!(stage = %failure.stage, error = %failure.source, "run failed");
                progress.failed(failure);
            }
        }
        result
    }

    async fn run_stages(
        &self,
        run_id: RunId,
        progress: &dyn ProgressReporter,
    ) -> std::result::Result<RunReport, PipelineFailure> {
        let start = Instant::now();
        let policies = self.ctx.policies;

        // --- Validate ---
        progress.stage(Stage::Validating);
        let documents = list_documents(&self.ctx.input_dir)
            .await
            .map_err(PipelineFailure::at(Stage::Validating))?;
        info!(documents = documents.len(), "input validated");

        // --- Extract ---
        progress.stage(Stage::Extracting);
        let units = self
            .extract_all(&documents, progress)
            .await
            .map_err(PipelineFailure::at(Stage::Extracting))?;
        let empty_documents = units.iter().filter(|u| u.is_empty()).count();

        // --- Combine ---
        progress.stage(Stage::Combining);
        let corpus_text = policies
            .combine
            .run(Stage::Combining, || async { Ok(corpus::combine(&units)) })
            .await
            .map_err(PipelineFailure::at(Stage::Combining))?;

        // --- Generate ---
        progress.stage(Stage::Generating);
        let records = policies
            .generate
            .run(Stage::Generating, || {
                self.generator
                    .generate_dialogues(&corpus_text, &self.ctx.model_key)
            })
            .await
            .map_err(PipelineFailure::at(Stage::Generating))?;

        // --- Persist ---
        progress.stage(Stage::Persisting);
        let artifact_path = policies
            .persist
            .run(Stage::Persisting, || async { self.writer.save(&records) })
            .await
            .map_err(PipelineFailure::at(Stage::Persisting))?;

        Ok(RunReport {
            run_id,
            artifact_path,
            records,
            documents: documents.len(),
            empty_documents,
            elapsed: start.elapsed(),
        })
    }

    /// Extract every document concurrently, keeping listing order.
    ///
    /// Each document gets its own extract-stage retries. The first document
    /// that still fails aborts the rest unless `skip_failed_documents` is set.
    async fn extract_all(
        &self,
        documents: &[DocumentRef],
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<String>> {
        let total = documents.len();
        let semaphore = Arc::new(Semaphore::new(self.ctx.extract_concurrency.max(1)));
        let policy = self.ctx.policies.extract;
        let mut tasks = JoinSet::new();

        for (index, doc) in documents.iter().enumerate() {
            let extractor = self.extractor.clone();
            let semaphore = Arc::clone(&semaphore);
            let doc = doc.clone();

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        policy
                            .run(Stage::Extracting, || extractor.extract_document(&doc))
                            .await
                    }
                    Err(_) => Err(DialogueGenError::extraction(&doc.path, "extraction cancelled")),
                };
                (index, result)
            });
        }

        let mut units: Vec<Option<String>> = vec![None; total];
        let mut done = 0;

        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined.map_err(|e| {
                let message = format!("extraction task failed: {e}");
                DialogueGenError::extraction(&self.ctx.input_dir, message)
            })?;
            let path = &documents[index].path;

            let text = match result {
                Ok(text) => text.trim().to_string(),
                Err(e) if self.ctx.skip_failed_documents => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping document after failed extraction"
                    );
                    String::new()
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            };

            done += 1;
            progress.document_extracted(path, done, total);
            units[index] = Some(text);
        }

        Ok(units.into_iter().map(Option::unwrap_or_default).collect())
    }
}

/// Regular files directly inside `dir`, sorted by file name.
///
/// Fails with `NoInput` when `dir` is missing, not a directory, or holds no
/// regular files. Subdirectories are ignored.
pub async fn list_documents(dir: &Path) -> Result<Vec<DocumentRef>> {
    let meta = tokio::fs::metadata(dir)
        .await
        .map_err(|e| DialogueGenError::no_input(dir, e.to_string()))?;
    if !meta.is_dir() {
        return Err(DialogueGenError::no_input(dir, "not a directory"));
    }

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| DialogueGenError::io(dir, e))?;
    let mut paths = Vec::new();

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| DialogueGenError::io(dir, e))?
    {
        let path = entry.path();
        match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => paths.push(path),
            Ok(_) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "unreadable entry, ignoring"),
        }
    }

    if paths.is_empty() {
        return Err(DialogueGenError::no_input(dir, "directory contains no files"));
    }

    paths.sort();
    Ok(paths.into_iter().map(DocumentRef::new).collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
