use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::db::{DataResult, NextProblem};
use crate::services::progress::ProgressTracker;
use crate::services::selector::ProblemSelector;

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    /// A live decision was already pending; nothing ran.
    Skipped,
    Selected(NextProblem),
    /// Selection failed and an error marker now sits in `next`.
    Failed(String),
}

/// One mutex per (course, learner), created on first use.
#[derive(Default)]
pub struct LearnerLocks {
    locks: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl LearnerLocks {
    pub fn handle(&self, course_id: &str, learner_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(
            locks
                .entry((course_id.to_string(), learner_id.to_string()))
                .or_default(),
        )
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs selection at most once per pending decision and keeps selection
/// failures out of the triggering request.
#[derive(Clone)]
pub struct SelectionCoordinator {
    progress: ProgressTracker,
    selector: ProblemSelector,
    locks: Arc<LearnerLocks>,
}

impl SelectionCoordinator {
    pub fn new(progress: ProgressTracker, selector: ProblemSelector) -> Self {
        Self {
            progress,
            selector,
            locks: Arc::new(LearnerLocks::default()),
        }
    }

    pub fn selector(&self) -> &ProblemSelector {
        &self.selector
    }

    /// Runs `f` while holding the learner's lock. Unrelated learners never
    /// wait on each other.
    pub fn with_learner_lock<T>(&self, course_id: &str, learner_id: &str, f: impl FnOnce() -> T) -> T {
        let handle = self.locks.handle(course_id, learner_id);
        let _guard = handle.lock();
        f()
    }

    pub fn ensure_next(&self, course_id: &str, learner_id: &str) -> DataResult<SelectionOutcome> {
        self.with_learner_lock(course_id, learner_id, || self.run_selection(course_id, learner_id))
    }

    /// Caller must hold the learner's lock.
    pub(crate) fn run_selection(&self, course_id: &str, learner_id: &str) -> DataResult<SelectionOutcome> {
        let progress = self.progress.progress(course_id, learner_id)?;
        if !progress.needs_selection() {
            tracing::debug!(course_id, learner_id, "selection not required");
            return Ok(SelectionOutcome::Skipped);
        }

        match self.selector.choose_next(course_id, learner_id) {
            Ok(next) => {
                self.progress.set_next(course_id, learner_id, next.clone())?;
                Ok(SelectionOutcome::Selected(next))
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(course_id, learner_id, error = %err, "problem selection failed, storing error marker");
                self.progress
                    .set_next(course_id, learner_id, NextProblem::error(message.clone()))?;
                Ok(SelectionOutcome::Failed(message))
            }
        }
    }

    /// Enrollment seeding: the nominated first item if available, else a
    /// regular selection run. Caller must hold the learner's lock.
    pub(crate) fn seed_first(&self, course_id: &str, learner_id: &str) -> DataResult<SelectionOutcome> {
        match self.selector.choose_first(course_id, learner_id) {
            Ok(Some(first)) => {
                tracing::info!(course_id, learner_id, problem = %first.name, "first pretest problem selected");
                let next = NextProblem::Problem(first);
                self.progress.set_next(course_id, learner_id, next.clone())?;
                Ok(SelectionOutcome::Selected(next))
            }
            Ok(None) => {
                tracing::info!(course_id, learner_id, "no nominated first problem, running selection");
                self.run_selection(course_id, learner_id)
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(course_id, learner_id, error = %err, "first problem selection failed");
                self.progress
                    .set_next(course_id, learner_id, NextProblem::error(message.clone()))?;
                Ok(SelectionOutcome::Failed(message))
            }
        }
    }

    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }
}
