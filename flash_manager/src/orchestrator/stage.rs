//! Run state machine
//!
//! ```plain
//! Idle → LoanRequested → CollateralDeposited → Borrowed → Dispatched
//!      → Verified → Repaid → Unwound → Completed
//!
//! any stage except Reverted ──► Reverted
//! ```

use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum RunStage {
    #[default]
    Idle,
    LoanRequested,
    CollateralDeposited,
    Borrowed,
    Dispatched,
    Verified,
    Repaid,
    Unwound,
    Completed,
    Reverted,
}

impl RunStage {
    /// The linear successor of this stage
    pub fn next(self) -> Option<RunStage> {
        match self {
            RunStage::Idle => Some(RunStage::LoanRequested),
            RunStage::LoanRequested => Some(RunStage::CollateralDeposited),
            RunStage::CollateralDeposited => Some(RunStage::Borrowed),
            RunStage::Borrowed => Some(RunStage::Dispatched),
            RunStage::Dispatched => Some(RunStage::Verified),
            RunStage::Verified => Some(RunStage::Repaid),
            RunStage::Repaid => Some(RunStage::Unwound),
            RunStage::Unwound => Some(RunStage::Completed),
            RunStage::Completed | RunStage::Reverted => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunStage::Completed | RunStage::Reverted)
    }

    pub fn can_transition_to(self, to: RunStage) -> bool {
        match to {
            // Settlement can still fail after `Completed`
            RunStage::Reverted => self != RunStage::Reverted,
            RunStage::Idle => self.is_terminal() || self == RunStage::Idle,
            _ => self.next() == Some(to),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_path_reaches_completed() {
        let mut stage = RunStage::Idle;
        let mut steps = 0;
        while let Some(next) = stage.next() {
            assert!(stage.can_transition_to(next));
            stage = next;
            steps += 1;
        }
        assert_eq!(stage, RunStage::Completed);
        assert_eq!(steps, 8);
    }

    #[test]
    fn test_no_skipping_steps() {
        assert!(!RunStage::LoanRequested.can_transition_to(RunStage::Borrowed));
        assert!(!RunStage::Borrowed.can_transition_to(RunStage::CollateralDeposited));
        assert!(!RunStage::Idle.can_transition_to(RunStage::Completed));
    }

    #[test]
    fn test_every_stage_can_revert_once() {
        assert!(RunStage::Idle.can_transition_to(RunStage::Reverted));
        assert!(RunStage::Dispatched.can_transition_to(RunStage::Reverted));
        assert!(RunStage::Unwound.can_transition_to(RunStage::Reverted));
        assert!(RunStage::Completed.can_transition_to(RunStage::Reverted));
        assert!(!RunStage::Reverted.can_transition_to(RunStage::Reverted));
    }

    #[test]
    fn test_terminal_stages_reset_to_idle() {
        assert!(RunStage::Completed.can_transition_to(RunStage::Idle));
        assert!(RunStage::Reverted.can_transition_to(RunStage::Idle));
        assert!(!RunStage::Borrowed.can_transition_to(RunStage::Idle));
    }
}
