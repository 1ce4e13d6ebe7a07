//! One indexing run: corpus read, vectorize, index sync, flag reconcile.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::context::PipelineContext;
use crate::corpus::FlagReconciler;
use crate::document::{DocumentId, RunMode};
use crate::error::PipelineError;
use crate::index::{IndexSync, WriteFailure};
use crate::vector::VectorizeMode;

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    /// Documents fetched from the corpus
    pub candidates: usize,
    /// Ids confirmed written to the index
    pub written: Vec<DocumentId>,
    /// Documents whose write failed
    pub failed: Vec<WriteFailure>,
    /// Entries removed before a full rewrite
    pub cleared: u64,
    pub reduction_width: usize,
    pub padding: usize,
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
}

impl RunReport {
    fn new(mode: RunMode, started_at: DateTime<Utc>) -> Self {
        Self {
            mode,
            started_at,
            candidates: 0,
            written: Vec::new(),
            failed: Vec::new(),
            cleared: 0,
            reduction_width: 0,
            padding: 0,
            duration: Duration::ZERO,
        }
    }
}

fn serialize_duration<S: serde::Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(d.as_millis() as u64)
}

/// How a run request ended.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunReport),
    /// Another run held the token; nothing was read or written.
    Skipped,
    Failed(PipelineError),
}

impl RunOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Runs the indexing pipeline under the shared run token.
#[derive(Debug, Clone)]
pub struct IndexPipeline {
    ctx: Arc<PipelineContext>,
}

impl IndexPipeline {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.ctx
    }

    /// Runs once in `mode`, or skips immediately if another run is active.
    ///
    /// Failures end the run; the token and the corpus connection are
    /// released on every path.
    pub fn run(&self, mode: RunMode) -> RunOutcome {
        let Some(_guard) = self.ctx.coordinator.try_acquire(mode) else {
            info!(%mode, "Another run is in progress, skipping");
            return RunOutcome::Skipped;
        };

        info!(%mode, "Run started");
        match self.execute(mode) {
            Ok(report) => {
                info!(
                    %mode,
                    candidates = report.candidates,
                    written = report.written.len(),
                    failed = report.failed.len(),
                    duration_ms = report.duration.as_millis() as u64,
                    "Run completed"
                );
                RunOutcome::Completed(report)
            }
            Err(err) => {
                error!(%mode, code = %err.status_code(), "Run failed: {err}");
                RunOutcome::Failed(err)
            }
        }
    }

    fn execute(&self, mode: RunMode) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let mut report = RunReport::new(mode, Utc::now());

        let mut connection = self.ctx.corpus.connect()?;
        let candidates = connection.fetch_candidates(mode)?;
        report.candidates = candidates.len();
        info!(%mode, candidates = candidates.len(), "Fetched candidates");

        let sync = IndexSync::new(self.ctx.index.as_ref(), self.ctx.vectorizer.target());
        let synced = match mode {
            RunMode::Full => {
                // Fit before clearing so a fit failure leaves index and
                // models as they were
                let fitted = self.ctx.vectorizer.fit_batch(&candidates)?;
                report.cleared = sync.clear_for_rebuild()?;
                FlagReconciler::new(connection.as_mut()).clear_all()?;

                let Some(batch) = fitted else {
                    info!(cleared = report.cleared, "No eligible documents, index left empty");
                    report.duration = started.elapsed();
                    return Ok(report);
                };

                // The new pair goes live only once no old vectors remain
                let vectorized = self.ctx.vectorizer.publish(batch)?;
                report.reduction_width = vectorized.reduction_width;
                report.padding = vectorized.padding;
                sync.write(&vectorized.documents, mode)
            }
            RunMode::Incremental => {
                if candidates.is_empty() {
                    report.duration = started.elapsed();
                    return Ok(report);
                }
                let vectorized = self
                    .ctx
                    .vectorizer
                    .vectorize(&candidates, VectorizeMode::TransformOnly)?;
                report.reduction_width = vectorized.reduction_width;
                report.padding = vectorized.padding;
                sync.sync(&vectorized.documents, mode)?
            }
        };

        FlagReconciler::new(connection.as_mut()).mark_indexed(&synced.written)?;

        if let Some(err) = synced.aborted {
            warn!(
                written = synced.written.len(),
                "Index became unreachable mid-run, flagged completed writes only"
            );
            return Err(err.into());
        }

        report.written = synced.written;
        report.failed = synced.failed;
        report.duration = started.elapsed();
        Ok(report)
    }
}
