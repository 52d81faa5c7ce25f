//! Run Locking System
//!
//! An explicit in-progress flag that prevents a second run from starting while
//! one is in flight, including a run re-entered from inside the executor.
//! The flag is only ever taken through [`RunGuard`], which releases it on drop,
//! so every exit path (success, error or panic unwinding) clears it. The guard
//! also owns the run stage: a run that is still mid-sequence when the guard
//! drops is marked `Reverted`.
//!
//! ```plain
//! Lock State Machine:
//!
//!        ┌──────────┐   RunGuard::acquire   ┌─────────┐
//!        │ Unlocked ├──────────────────────►│ Locked  │
//!        └──────────┘                       └────┬────┘
//!             ▲        drop(RunGuard)            │
//!             └──────────────────────────────────┘
//! ```

use std::cell::{Cell, RefCell};

use tracing::{debug, warn};

use crate::utils::error::{OrchestratorError, OrchestratorResult};

use super::stage::RunStage;

/// Runtime lock
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Lock {
    /// Current lock state
    pub is_locked: bool,
    /// Timestamp of the last successful acquisition, in seconds
    pub last_locked_at: Option<u64>,
}

impl Lock {
    /// Attempts to acquire the lock.
    ///
    /// # Returns
    /// * `Ok(())` - Lock successfully acquired
    /// * `Err(OrchestratorError::Locked)` - A run is already in progress
    pub fn try_lock(&mut self, now: u64) -> OrchestratorResult<()> {
        if self.is_locked {
            return Err(OrchestratorError::Locked);
        }
        self.is_locked = true;
        self.last_locked_at = Some(now);
        Ok(())
    }

    /// Releases the lock.
    pub fn unlock(&mut self) -> &mut Self {
        self.is_locked = false;
        self
    }
}

/// Scoped ownership of a [`Lock`] and of the run stage.
/// The lock is released when the guard goes out of scope.
pub struct RunGuard<'a> {
    lock: &'a RefCell<Lock>,
    stage: &'a Cell<RunStage>,
}

impl<'a> RunGuard<'a> {
    pub fn acquire(
        lock: &'a RefCell<Lock>,
        stage: &'a Cell<RunStage>,
        now: u64,
    ) -> OrchestratorResult<Self> {
        lock.borrow_mut().try_lock(now)?;
        debug!(at = now, "Run lock acquired");
        Ok(Self { lock, stage })
    }

    /// Starts a fresh run from `Idle`, whatever the previous run left behind.
    pub fn begin(&self) {
        self.stage.set(RunStage::Idle);
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let stage = self.stage.get();
        if stage != RunStage::Idle && !stage.is_terminal() {
            warn!(?stage, "Run abandoned mid-sequence");
            self.stage.set(RunStage::Reverted);
        }

        let mut lock = self.lock.borrow_mut();
        lock.unlock();
        debug!(locked_at = ?lock.last_locked_at, "Run lock released");
    }
}
