//! Event layer: what happens when the tutor reports a response, a page load
//! or a new enrollment.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::db::{DataError, NextProblem, Problem, Storage};
use crate::services::catalog::ProblemCatalog;
use crate::services::completion::{completion_status, CompletionPolicy};
use crate::services::coordinator::{SelectionCoordinator, SelectionOutcome};
use crate::services::interaction_log::{InteractionLog, RecordOutcome};
use crate::services::mastery::{Bkt, MasteryEstimator};
use crate::services::parameters::{ParameterScope, ParameterService};
use crate::services::progress::{ProgressError, ProgressTracker};
use crate::services::random::{RandomSource, SeededRandom, ThreadRandom};
use crate::services::selector::{ProblemSelector, SelectionConfig, SelectionError};

#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

#[derive(Debug, Clone)]
pub struct ResponseInput {
    pub problem: String,
    pub correct: bool,
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseReceipt {
    pub rotated: bool,
    pub record: RecordOutcome,
    pub selection: SelectionOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearnerStatus {
    pub current: Option<Problem>,
    pub next: Option<NextProblem>,
    /// `next` holds a usable decision: a problem or the terminal sentinel.
    pub okay: bool,
    pub done_with_current: bool,
    pub done_with_course: bool,
}

/// Collaborators the tutor is assembled from.
pub struct TutorParts {
    pub selection: SelectionConfig,
    pub completion: CompletionPolicy,
    pub parameters: ParameterScope,
    pub estimator: Arc<dyn MasteryEstimator>,
    pub random: Arc<dyn RandomSource>,
}

impl TutorParts {
    pub fn from_config(config: &Config) -> Self {
        let random: Arc<dyn RandomSource> = match config.random_seed {
            Some(seed) => Arc::new(SeededRandom::new(seed)),
            None => Arc::new(ThreadRandom),
        };
        Self {
            selection: config.selection.clone(),
            completion: config.completion.clone(),
            parameters: config.parameter_scope,
            estimator: Arc::new(Bkt),
            random,
        }
    }
}

#[derive(Clone)]
pub struct TutorService {
    catalog: ProblemCatalog,
    log: InteractionLog,
    progress: ProgressTracker,
    parameters: ParameterService,
    coordinator: SelectionCoordinator,
    completion: CompletionPolicy,
}

impl TutorService {
    pub fn new(store: Arc<dyn Storage>, parts: TutorParts) -> Self {
        let catalog = ProblemCatalog::new(Arc::clone(&store));
        let log = InteractionLog::new(Arc::clone(&store), catalog.clone());
        let progress = ProgressTracker::new(Arc::clone(&store), catalog.clone());
        let parameters = ParameterService::new(Arc::clone(&store), parts.parameters, Arc::clone(&parts.random));
        let selector = ProblemSelector::new(
            Arc::clone(&store),
            parameters.clone(),
            parts.estimator,
            parts.random,
            parts.selection,
        );
        let coordinator = SelectionCoordinator::new(progress.clone(), selector);
        Self {
            catalog,
            log,
            progress,
            parameters,
            coordinator,
            completion: parts.completion,
        }
    }

    pub fn catalog(&self) -> &ProblemCatalog {
        &self.catalog
    }

    pub fn log(&self) -> &InteractionLog {
        &self.log
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn parameters(&self) -> &ParameterService {
        &self.parameters
    }

    pub fn coordinator(&self) -> &SelectionCoordinator {
        &self.coordinator
    }

    pub fn selector(&self) -> &ProblemSelector {
        self.coordinator.selector()
    }

    /// Enrolls the learner, hands out a pooled parameter set if the course
    /// has one, and seeds `next`.
    pub fn enroll(&self, course_id: &str, learner_id: &str) -> Result<SelectionOutcome, TutorError> {
        self.catalog.course(course_id)?;
        self.coordinator.with_learner_lock(course_id, learner_id, || -> Result<_, TutorError> {
            self.progress.enroll(course_id, learner_id)?;
            self.parameters.assign_from_pool(course_id, learner_id)?;
            Ok(self.coordinator.seed_first(course_id, learner_id)?)
        })
    }

    /// Logs a response. A selection failure leaves an error marker in
    /// `next` but does not fail the call. A rejected response leaves
    /// progress untouched.
    pub fn record_response(
        &self,
        course_id: &str,
        learner_id: &str,
        input: ResponseInput,
    ) -> Result<ResponseReceipt, TutorError> {
        // unknown learners never get a lock entry
        self.progress.progress(course_id, learner_id)?;
        self.coordinator.with_learner_lock(course_id, learner_id, || -> Result<_, TutorError> {
            self.log.check_response(course_id, &input.problem, input.attempt)?;
            let rotated = self.progress.advance_if_next(course_id, learner_id, &input.problem)?;
            let record = self.log.record_response(
                course_id,
                learner_id,
                &input.problem,
                input.correct,
                input.attempt,
                input.timestamp,
            )?;
            tracing::info!(
                course_id,
                learner_id,
                problem = %input.problem,
                correct = input.correct,
                attempt = input.attempt,
                stored = record.stored,
                "response recorded"
            );
            let selection = self.coordinator.run_selection(course_id, learner_id)?;
            Ok(ResponseReceipt {
                rotated,
                record,
                selection,
            })
        })
    }

    /// Logs a page load. Page loads do not drive selection even when
    /// rotation empties `next`: that slot waits for the response so the
    /// decision sees it. Selection only reruns here to retry a stored error
    /// marker.
    pub fn record_page_load(
        &self,
        course_id: &str,
        learner_id: &str,
        problem: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<SelectionOutcome, TutorError> {
        self.progress.progress(course_id, learner_id)?;
        self.coordinator.with_learner_lock(course_id, learner_id, || -> Result<_, TutorError> {
            self.catalog.problem(course_id, problem)?;
            let rotated = self.progress.advance_if_next(course_id, learner_id, problem)?;
            self.log.record_page_load(course_id, learner_id, problem, timestamp)?;
            tracing::debug!(course_id, learner_id, problem, rotated, "page load recorded");

            let pending = self.progress.get_next(course_id, learner_id)?;
            if pending.as_ref().is_some_and(NextProblem::is_error) {
                return Ok(self.coordinator.run_selection(course_id, learner_id)?);
            }
            Ok(SelectionOutcome::Skipped)
        })
    }

    pub fn status(&self, course_id: &str, learner_id: &str) -> Result<LearnerStatus, TutorError> {
        let progress = self.progress.progress(course_id, learner_id)?;
        let finished = self.progress.is_finished(course_id, learner_id)?;
        let course = self.catalog.course(course_id)?;
        let history = self.log.history(course_id, learner_id)?;
        let completion = completion_status(
            progress.current.as_ref(),
            finished,
            &course,
            &history,
            &self.completion,
        );
        let okay = progress.next.as_ref().is_some_and(|next| !next.is_error());
        Ok(LearnerStatus {
            current: progress.current,
            next: progress.next,
            okay,
            done_with_current: completion.done_with_current,
            done_with_course: completion.done_with_course,
        })
    }
}
