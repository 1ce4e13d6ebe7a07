//! Run exclusivity shared by Full and Incremental runs.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::document::RunMode;

/// Single token guarding "a pipeline run is in progress".
///
/// Acquisition never blocks: a caller that loses the race skips its run.
/// Full and Incremental share the token because both read and write the
/// same model store and index.
#[derive(Debug, Default)]
pub struct JobCoordinator {
    running: AtomicBool,
    active: Mutex<Option<RunMode>>,
}

impl JobCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the token for a run of `mode`, or returns `None` if another
    /// run holds it. The token returns when the guard drops.
    pub fn try_acquire(&self, mode: RunMode) -> Option<RunGuard<'_>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(%mode, active = ?*self.active.lock(), "Run token busy");
            return None;
        }
        *self.active.lock() = Some(mode);
        Some(RunGuard {
            coordinator: self,
            mode,
        })
    }

    /// Whether a run currently holds the token.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mode of the run holding the token.
    pub fn active_mode(&self) -> Option<RunMode> {
        *self.active.lock()
    }
}

/// Proof of holding the run token. Releases it on drop, including during
/// unwinding.
#[derive(Debug)]
pub struct RunGuard<'a> {
    coordinator: &'a JobCoordinator,
    mode: RunMode,
}

impl RunGuard<'_> {
    pub fn mode(&self) -> RunMode {
        self.mode
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.coordinator.active.lock() = None;
        self.coordinator.running.store(false, Ordering::SeqCst);
    }
}
