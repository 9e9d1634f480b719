//! The embedding-generation processor: drives one source archive through
//! phrase detection, training, and result packing.
//!
//! The surrounding pipeline (front end, dataset bookkeeping) talks to the
//! processor through the [`JobContext`] collaborator trait.  The processor
//! owns nothing beyond its run: the source archive is read-only, the staging
//! area lives exactly as long as the run, and the result archive is written
//! once after all members are processed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use log::info;

use crate::archive::{ResultArchive, SourceArchive};
use crate::cancel::CancelToken;
use crate::config::{PhraseConfig, TrainParams};
use crate::error::{IntervecError, Result};
use crate::metrics::{FileMetrics, RunMetrics};
use crate::model::KeyedVectors;
use crate::phrases::PhraseModel;
use crate::staging::StagingArea;
use crate::tokens::TokenStream;
use crate::trainer::Word2VecTrainer;

/// Collaborator handle the processor reports through but does not own.
pub trait JobContext {
    /// Readable source archive path.
    fn source_path(&self) -> &Path;
    /// Writable destination archive path.
    fn results_path(&self) -> &Path;
    /// Directory the run-scoped staging area is created under.
    fn staging_base(&self) -> &Path;
    /// Human-readable status sink.
    fn update_status(&self, text: &str);
    /// Fractional progress sink, `0.0..=1.0`.
    fn update_progress(&self, fraction: f32);
    /// Interruption flag polled at the pipeline's suspension points.
    fn cancel_token(&self) -> CancelToken;
    /// Terminal report of the number of model files produced.
    fn finish(&self, models: usize);
}

/// Converts an archive of per-interval token files into an archive of
/// trained embedding models.
#[derive(Debug, Clone)]
pub struct EmbeddingProcessor {
    params: TrainParams,
    phrases: PhraseConfig,
}

impl EmbeddingProcessor {
    /// Creates a processor with validated parameters.
    pub fn new(params: TrainParams, phrases: PhraseConfig) -> Result<Self> {
        params.validate()?;
        phrases.validate()?;
        Ok(Self { params, phrases })
    }

    /// Returns the training parameters in effect for this processor.
    #[must_use]
    pub fn params(&self) -> &TrainParams {
        &self.params
    }

    /// Executes one run.
    ///
    /// Members are processed in the source archive's listing order, one at a
    /// time: stream once for phrase detection, stream again through the
    /// phrase transform for training, serialise the vectors to staging, then
    /// delete the staged token file.  The result archive is only written
    /// after every member completed; any failure aborts the whole run and no
    /// partial archive is produced.  The staging directory is removed on all
    /// exit paths.
    pub fn run(&self, ctx: &dyn JobContext) -> Result<RunMetrics> {
        let start = Instant::now();
        let cancel = ctx.cancel_token();
        ctx.update_status("Processing token sets");

        let mut source = SourceArchive::open(ctx.source_path())?;
        let names = source.names()?;
        let trainer = Word2VecTrainer::new(self.params.clone())?;
        let staging = StagingArea::new(ctx.staging_base())?;
        let mut metrics = RunMetrics::new(names.len());

        for (idx, name) in names.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(IntervecError::Interrupted("processing token sets"));
            }

            let staged = source.extract(name, staging.path())?;
            let outcome = self.process_member(name, &staged, &trainer, &staging, ctx, &cancel);
            // The extracted token file is deleted whether or not the passes
            // succeeded, bounding staging growth to one member at a time.
            let removed = staging.remove(&staged);
            let file_metrics = outcome?;
            removed?;

            metrics.files.push(file_metrics);
            ctx.update_progress((idx + 1) as f32 / names.len() as f32);
        }

        ctx.update_status("Compressing generated models");
        let mut result = ResultArchive::create(ctx.results_path())?;
        for model_path in staging.model_files()? {
            let member = model_path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| {
                    IntervecError::Internal(format!("unreadable staged model name {model_path:?}"))
                })?
                .to_owned();
            result.add_file(&model_path, &member)?;
            staging.remove(&model_path)?;
            metrics.models += 1;
        }
        result.finish()?;
        staging.close()?;

        metrics.total_duration = start.elapsed();
        info!(
            "produced {} models from {} token sets in {:.2?}",
            metrics.models,
            names.len(),
            metrics.total_duration
        );
        ctx.update_status("Finished");
        ctx.finish(metrics.models);
        Ok(metrics)
    }

    /// Both passes over one staged token file, ending with a staged model.
    fn process_member(
        &self,
        name: &str,
        staged: &Path,
        trainer: &Word2VecTrainer,
        staging: &StagingArea,
        ctx: &dyn JobContext,
        cancel: &CancelToken,
    ) -> Result<FileMetrics> {
        let member_start = Instant::now();
        let base = model_base_name(name);

        ctx.update_status(&format!(
            "Extracting common phrases from token set {name}..."
        ));
        let phrase_pass = TokenStream::open(staged, cancel.clone())?;
        let phrase_model = PhraseModel::train(phrase_pass, &self.phrases)?;

        ctx.update_status(&format!("Training embedding model for token set {name}..."));
        let mut sentences = Vec::new();
        let mut phrase_merges = 0;
        for tokens in TokenStream::open(staged, cancel.clone())? {
            let tokens = tokens?;
            let merged = phrase_model.transform(&tokens);
            phrase_merges += tokens.len() - merged.len();
            sentences.push(merged);
        }

        let model: KeyedVectors = trainer.train(&sentences)?;
        model.save(staging.model_path(&base))?;

        Ok(FileMetrics {
            name: name.to_owned(),
            token_lists: sentences.len(),
            phrase_merges,
            vocab_size: model.len(),
            elapsed: member_start.elapsed(),
        })
    }
}

/// Model base name for an archive member: the basename without its
/// file-type suffix (`2020-08-01.json` becomes `2020-08-01`).
fn model_base_name(member: &str) -> String {
    let base = member.rsplit('/').next().unwrap_or(member);
    Path::new(base)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(base)
        .to_owned()
}

/// [`JobContext`] implementation for local runs (CLI, tests): status goes to
/// the log, progress and the finish count are observable in-process.
#[derive(Debug)]
pub struct LocalJob {
    source: PathBuf,
    results: PathBuf,
    staging_base: PathBuf,
    cancel: CancelToken,
    progress_milli: AtomicUsize,
    finished: Mutex<Option<usize>>,
}

impl LocalJob {
    /// Creates a job handle over the given paths.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(source: P, results: P, staging_base: P) -> Self {
        Self {
            source: source.into(),
            results: results.into(),
            staging_base: staging_base.into(),
            cancel: CancelToken::new(),
            progress_milli: AtomicUsize::new(0),
            finished: Mutex::new(None),
        }
    }

    /// Last reported progress fraction.
    #[must_use]
    pub fn progress(&self) -> f32 {
        self.progress_milli.load(Ordering::Relaxed) as f32 / 1000.0
    }

    /// Final model count, once [`JobContext::finish`] has been called.
    #[must_use]
    pub fn finished(&self) -> Option<usize> {
        *self.finished.lock().expect("finish flag poisoned")
    }

    /// Handle the driver can use to interrupt the run from another thread.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }
}

impl JobContext for LocalJob {
    fn source_path(&self) -> &Path {
        &self.source
    }

    fn results_path(&self) -> &Path {
        &self.results
    }

    fn staging_base(&self) -> &Path {
        &self.staging_base
    }

    fn update_status(&self, text: &str) {
        info!("{text}");
    }

    fn update_progress(&self, fraction: f32) {
        let clamped = fraction.clamp(0.0, 1.0);
        self.progress_milli
            .store((clamped * 1000.0) as usize, Ordering::Relaxed);
    }

    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn finish(&self, models: usize) {
        *self.finished.lock().expect("finish flag poisoned") = Some(models);
    }
}
