use std::sync::Arc;

use crate::db::{
    DataError, DataResult, LearnerProgress, Membership, NextProblem, Problem, Storage,
};
use crate::services::catalog::ProblemCatalog;

#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Per-learner current/next pointers plus course membership.
#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<dyn Storage>,
    catalog: ProblemCatalog,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn Storage>, catalog: ProblemCatalog) -> Self {
        Self { store, catalog }
    }

    /// Adds the learner to in_progress with an empty {current, next} record.
    pub fn enroll(&self, course_id: &str, learner_id: &str) -> DataResult<()> {
        if learner_id.trim().is_empty() {
            return Err(DataError::Constraint("learner id must not be empty".into()));
        }
        self.store.enroll(course_id, learner_id)?;
        self.store
            .insert_progress(course_id, LearnerProgress::new(learner_id))?;
        tracing::info!(course_id, learner_id, "learner enrolled");
        Ok(())
    }

    pub fn progress(&self, course_id: &str, learner_id: &str) -> DataResult<LearnerProgress> {
        self.store.progress(course_id, learner_id)
    }

    pub fn get_current(&self, course_id: &str, learner_id: &str) -> DataResult<Option<Problem>> {
        Ok(self.progress(course_id, learner_id)?.current)
    }

    pub fn get_next(&self, course_id: &str, learner_id: &str) -> DataResult<Option<NextProblem>> {
        Ok(self.progress(course_id, learner_id)?.next)
    }

    /// Problems must exist in the catalog; error markers and the terminal
    /// sentinel are written as-is.
    pub fn set_next(&self, course_id: &str, learner_id: &str, next: NextProblem) -> DataResult<()> {
        if let NextProblem::Problem(problem) = &next {
            let known = self.catalog.problem(course_id, &problem.name)?;
            if &known != problem {
                return Err(DataError::Constraint(format!(
                    "problem {} does not match the catalog entry",
                    problem.name
                )));
            }
        }
        self.store.update_progress(course_id, learner_id, &mut |progress| {
            progress.next = Some(next.clone());
            Ok(())
        })?;
        Ok(())
    }

    pub fn advance(&self, course_id: &str, learner_id: &str) -> Result<Problem, ProgressError> {
        self.advance_matching(course_id, learner_id, None)?
            .ok_or_else(|| ProgressError::InvalidTransition("nothing to advance to".into()))
    }

    /// Rotation rule: when an event names the problem pending in `next`,
    /// that problem becomes current first. Returns whether a rotation ran.
    pub fn advance_if_next(&self, course_id: &str, learner_id: &str, problem_name: &str) -> DataResult<bool> {
        match self.advance_matching(course_id, learner_id, Some(problem_name)) {
            Ok(advanced) => Ok(advanced.is_some()),
            Err(ProgressError::Data(err)) => Err(err),
            Err(ProgressError::InvalidTransition(_)) => Ok(false),
        }
    }

    fn advance_matching(
        &self,
        course_id: &str,
        learner_id: &str,
        expected: Option<&str>,
    ) -> Result<Option<Problem>, ProgressError> {
        let mut rejection: Option<String> = None;
        let mut skipped = false;
        let result = self.store.update_progress(course_id, learner_id, &mut |progress| {
            match &progress.next {
                Some(NextProblem::Problem(problem)) => {
                    if expected.is_some_and(|name| name != problem.name) {
                        skipped = true;
                        return Ok(());
                    }
                    progress.current = Some(problem.clone());
                    progress.next = None;
                    Ok(())
                }
                other => {
                    let reason = match other {
                        None => "next problem is not set".to_string(),
                        Some(NextProblem::Error { error }) => format!("next problem is an error marker: {error}"),
                        Some(_) => "course is complete, no next problem".to_string(),
                    };
                    rejection = Some(reason.clone());
                    Err(DataError::Constraint(reason))
                }
            }
        });

        match result {
            Ok(_) if skipped => Ok(None),
            Ok(progress) => {
                tracing::debug!(course_id, learner_id, "advanced to next problem");
                Ok(progress.current)
            }
            Err(err) => match rejection {
                Some(reason) => Err(ProgressError::InvalidTransition(reason)),
                None => Err(err.into()),
            },
        }
    }

    pub fn membership(&self, course_id: &str) -> DataResult<Membership> {
        self.store.membership(course_id)
    }

    pub fn is_finished(&self, course_id: &str, learner_id: &str) -> DataResult<bool> {
        Ok(self.membership(course_id)?.is_finished(learner_id))
    }
}
