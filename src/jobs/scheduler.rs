//! Periodic triggering of Full and Incremental runs.
//!
//! One worker thread per mode, each driven by its own ticker. Both workers
//! go through the same [`IndexPipeline`] and therefore the same run token,
//! so a tick that lands while the other mode is running is skipped.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::document::RunMode;
use crate::error::PipelineError;
use crate::jobs::{IndexPipeline, RunOutcome};

/// Per-worker counters, returned when the worker stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub ticks: u64,
    pub completed: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Longest run of consecutive skipped ticks
    pub longest_skip_streak: u32,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    pipeline: IndexPipeline,
    incremental_interval: Duration,
    full_interval: Duration,
    full_on_start: bool,
    skip_warn_threshold: u32,
    max_ticks: Option<u64>,
}

impl Scheduler {
    pub fn new(pipeline: IndexPipeline, config: &SchedulerConfig) -> Self {
        Self {
            pipeline,
            incremental_interval: config.incremental_interval(),
            full_interval: config.full_interval(),
            full_on_start: config.full_on_start,
            skip_warn_threshold: config.skip_warn_threshold.max(1),
            max_ticks: None,
        }
    }

    /// Stops each worker after `ticks` ticks instead of running until
    /// shutdown.
    #[must_use]
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    /// Starts both workers. If configured and no model pair exists yet, a
    /// Full run happens first, on the calling thread.
    pub fn start(self) -> SchedulerHandle {
        if self.full_on_start && !self.pipeline.context().vectorizer.store().exists() {
            info!("No fitted model pair, running initial full index");
            guarded_run(&self.pipeline, RunMode::Full);
        }

        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let workers = [
            (RunMode::Incremental, self.incremental_interval),
            (RunMode::Full, self.full_interval),
        ]
        .into_iter()
        .map(|(mode, interval)| {
            let worker = Worker {
                pipeline: self.pipeline.clone(),
                mode,
                interval,
                skip_warn_threshold: self.skip_warn_threshold,
                max_ticks: self.max_ticks,
                shutdown: shutdown_rx.clone(),
            };
            let handle = thread::Builder::new()
                .name(format!("artvec-{mode}"))
                .spawn(move || worker.run());
            (mode, handle)
        })
        .filter_map(|(mode, handle)| match handle {
            Ok(handle) => Some((mode, handle)),
            Err(e) => {
                error!(%mode, "Failed to spawn scheduler worker: {e}");
                None
            }
        })
        .collect();

        info!(
            incremental_secs = self.incremental_interval.as_secs(),
            full_secs = self.full_interval.as_secs(),
            "Scheduler started"
        );

        SchedulerHandle {
            shutdown: Some(shutdown_tx),
            workers,
        }
    }
}

/// Running scheduler. Dropping it signals the workers to stop without
/// waiting for them.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: Option<Sender<()>>,
    workers: Vec<(RunMode, JoinHandle<WorkerStats>)>,
}

impl SchedulerHandle {
    /// Signals the workers to stop and waits for them. A run in progress
    /// finishes first.
    pub fn shutdown(mut self) -> Vec<(RunMode, WorkerStats)> {
        self.shutdown.take();
        self.join()
    }

    /// Waits for the workers to stop on their own (only returns when a tick
    /// limit is set).
    pub fn join(self) -> Vec<(RunMode, WorkerStats)> {
        self.workers
            .into_iter()
            .filter_map(|(mode, handle)| match handle.join() {
                Ok(stats) => Some((mode, stats)),
                Err(_) => {
                    error!(%mode, "Scheduler worker panicked");
                    None
                }
            })
            .collect()
    }
}

struct Worker {
    pipeline: IndexPipeline,
    mode: RunMode,
    interval: Duration,
    skip_warn_threshold: u32,
    max_ticks: Option<u64>,
    shutdown: Receiver<()>,
}

impl Worker {
    fn run(self) -> WorkerStats {
        let ticker = tick(self.interval);
        let mut stats = WorkerStats::default();
        let mut skip_streak = 0u32;

        loop {
            select! {
                recv(ticker) -> _ => {}
                recv(self.shutdown) -> _ => break,
            }

            stats.ticks += 1;
            match guarded_run(&self.pipeline, self.mode) {
                RunOutcome::Completed(_) => {
                    stats.completed += 1;
                    skip_streak = 0;
                }
                RunOutcome::Skipped => {
                    stats.skipped += 1;
                    skip_streak += 1;
                    stats.longest_skip_streak = stats.longest_skip_streak.max(skip_streak);
                    if skip_streak == self.skip_warn_threshold {
                        warn!(
                            mode = %self.mode,
                            skipped = skip_streak,
                            "Consecutive runs skipped while another run holds the token, index freshness is delayed"
                        );
                    }
                }
                RunOutcome::Failed(_) => {
                    stats.failed += 1;
                    skip_streak = 0;
                }
            }

            if self.max_ticks.is_some_and(|max| stats.ticks >= max) {
                break;
            }
        }

        debug!(mode = %self.mode, ?stats, "Scheduler worker stopped");
        stats
    }
}

/// Runs once, turning a panic inside the run into a failed outcome so the
/// worker keeps ticking. The run token is released by unwinding.
fn guarded_run(pipeline: &IndexPipeline, mode: RunMode) -> RunOutcome {
    match catch_unwind(AssertUnwindSafe(|| pipeline.run(mode))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(%mode, "Run panicked: {message}");
            RunOutcome::Failed(PipelineError::Panicked { message })
        }
    }
}
