//! Task lifecycle shared by every kernel.
//!
//! A task moves through `validation → pre_processing → run → post_processing`.
//! Validation answers with a plain `bool`; the other phases return a
//! [`TaskError`] when staging or communication fails. Calling the phases out
//! of order is logged but not prevented: running an unvalidated task gives
//! undefined numeric results, not an error.

use stratum_compute::CommError;
use thiserror::Error;

use crate::staging::StagingError;
use crate::types::MatrixError;

/// Errors that can occur in the phases after validation.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("Communication error: {0}")]
    Comm(#[from] CommError),

    #[error("Matrix error: {0}")]
    Matrix(#[from] MatrixError),

    #[error("Task `{0}` has nothing to publish; run() has not completed")]
    NoResult(&'static str),
}

/// Lifecycle position of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Stage {
    #[default]
    Created,
    Validated,
    PreProcessed,
    Run,
    PostProcessed,
}

impl Stage {
    /// The stage a task must at least have reached before entering `self`.
    fn prerequisite(self) -> Stage {
        match self {
            Stage::Created | Stage::Validated => Stage::Created,
            Stage::PreProcessed => Stage::Validated,
            Stage::Run => Stage::PreProcessed,
            Stage::PostProcessed => Stage::Run,
        }
    }
}

/// Records the current [`Stage`] of a task and complains about skipped phases.
#[derive(Debug, Clone)]
pub struct StageTracker {
    task: &'static str,
    stage: Stage,
}

impl StageTracker {
    pub fn new(task: &'static str) -> Self {
        Self {
            task,
            stage: Stage::Created,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Move to `next`, warning when its prerequisite phase was skipped.
    pub fn enter(&mut self, next: Stage) {
        if self.stage < next.prerequisite() {
            log::warn!(
                "{}: entering {:?} from {:?}; results are undefined",
                self.task,
                next,
                self.stage
            );
        }
        log::debug!("{}: {:?} -> {:?}", self.task, self.stage, next);
        self.stage = next;
    }
}

/// The four-phase contract every kernel implements.
pub trait Task {
    /// Short identifier used in logs and perf reports.
    fn name(&self) -> &'static str;

    /// Current lifecycle stage.
    fn stage(&self) -> Stage;

    /// Check the task data. Repeated calls on unchanged input agree.
    fn validation(&mut self) -> bool;

    /// Stage raw input buffers into typed fields.
    fn pre_processing(&mut self) -> Result<(), TaskError>;

    /// Compute. May be repeated after a single `pre_processing`.
    fn run(&mut self) -> Result<(), TaskError>;

    /// Publish the result into the output buffers.
    fn post_processing(&mut self) -> Result<(), TaskError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(Stage::Created < Stage::Validated);
        assert!(Stage::Validated < Stage::PreProcessed);
        assert!(Stage::PreProcessed < Stage::Run);
        assert!(Stage::Run < Stage::PostProcessed);
    }

    #[test]
    fn test_tracker_follows_calls() {
        let mut tracker = StageTracker::new("test");
        assert_eq!(tracker.stage(), Stage::Created);
        tracker.enter(Stage::Validated);
        tracker.enter(Stage::PreProcessed);
        tracker.enter(Stage::Run);
        tracker.enter(Stage::Run);
        tracker.enter(Stage::PostProcessed);
        assert_eq!(tracker.stage(), Stage::PostProcessed);
    }

    #[test]
    fn test_tracker_does_not_guard_skipped_phases() {
        let mut tracker = StageTracker::new("test");
        tracker.enter(Stage::Run);
        assert_eq!(tracker.stage(), Stage::Run);
    }
}
