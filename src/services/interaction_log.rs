use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::db::{
    Course, DataError, DataResult, Interaction, Problem, ProblemCategory, Storage,
};
use crate::services::catalog::{ProblemCatalog, ProblemFilter};

/// Result of logging a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordOutcome {
    /// `false` when the same (problem, attempt) was already on file.
    pub stored: bool,
    /// The learner moved from in_progress to finished on this call.
    pub finished: bool,
}

/// Everything a learner has done in one course, ordered as it was logged.
#[derive(Debug, Clone, Default)]
pub struct LearnerHistory {
    interactions: Vec<Interaction>,
}

impl LearnerHistory {
    pub fn new(interactions: Vec<Interaction>) -> Self {
        Self { interactions }
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    pub fn responses(&self) -> impl Iterator<Item = &Interaction> {
        self.interactions.iter().filter(|i| i.is_response())
    }

    /// First-attempt responses in timestamp order; ties keep log order.
    pub fn first_attempts(&self) -> Vec<&Interaction> {
        let mut firsts: Vec<&Interaction> =
            self.interactions.iter().filter(|i| i.is_first_attempt()).collect();
        firsts.sort_by_key(|i| i.timestamp);
        firsts
    }

    /// Correctness of first attempts, optionally restricted to one skill.
    pub fn trajectory(&self, skill: Option<&str>) -> Vec<bool> {
        self.first_attempts()
            .into_iter()
            .filter(|i| skill.map_or(true, |skill| i.problem.has_skill(skill)))
            .map(|i| i.is_correct())
            .collect()
    }

    pub fn answered(&self) -> HashSet<&str> {
        self.responses().map(|i| i.problem.name.as_str()).collect()
    }

    pub fn remaining(&self, course: &Course, filter: ProblemFilter<'_>) -> Vec<Problem> {
        let answered = self.answered();
        course
            .problems
            .iter()
            .filter(|problem| filter.matches(problem))
            .filter(|problem| !answered.contains(problem.name.as_str()))
            .cloned()
            .collect()
    }

    pub fn has_response_in(&self, category: ProblemCategory) -> bool {
        self.responses().any(|i| i.problem.category == category)
    }

    pub fn responses_to<'a>(&'a self, problem_name: &'a str) -> impl Iterator<Item = &'a Interaction> + 'a {
        self.responses().filter(move |i| i.problem.name == problem_name)
    }
}

/// Append-only record of responses and page loads.
#[derive(Clone)]
pub struct InteractionLog {
    store: Arc<dyn Storage>,
    catalog: ProblemCatalog,
}

impl InteractionLog {
    pub fn new(store: Arc<dyn Storage>, catalog: ProblemCatalog) -> Self {
        Self { store, catalog }
    }

    pub fn record_response(
        &self,
        course_id: &str,
        learner_id: &str,
        problem_name: &str,
        correct: bool,
        attempt: u32,
        timestamp: DateTime<Utc>,
    ) -> DataResult<RecordOutcome> {
        let problem = self.check_response(course_id, problem_name, attempt)?;
        let interaction = Interaction::response(learner_id, problem, correct, attempt, timestamp);
        if !self.store.append_interaction(course_id, interaction)? {
            tracing::debug!(course_id, learner_id, problem = problem_name, attempt, "duplicate response ignored");
            return Ok(RecordOutcome::default());
        }

        let course = self.store.course(course_id)?;
        let remaining_post = self
            .history(course_id, learner_id)?
            .remaining(&course, ProblemFilter::category(ProblemCategory::Posttest));
        let finished = remaining_post.is_empty() && self.store.mark_finished(course_id, learner_id)?;
        if finished {
            tracing::info!(course_id, learner_id, "learner finished course");
        }

        Ok(RecordOutcome {
            stored: true,
            finished,
        })
    }

    /// Rejects what `record_response` would reject, without writing.
    pub fn check_response(&self, course_id: &str, problem_name: &str, attempt: u32) -> DataResult<Problem> {
        if attempt < 1 {
            return Err(DataError::Constraint("attempt numbers start at 1".into()));
        }
        self.catalog.problem(course_id, problem_name)
    }

    /// Duplicates are kept; page loads never feed correctness statistics.
    pub fn record_page_load(
        &self,
        course_id: &str,
        learner_id: &str,
        problem_name: &str,
        timestamp: DateTime<Utc>,
    ) -> DataResult<()> {
        let problem = self.catalog.problem(course_id, problem_name)?;
        self.store
            .append_interaction(course_id, Interaction::page_load(learner_id, problem, timestamp))?;
        Ok(())
    }

    pub fn history(&self, course_id: &str, learner_id: &str) -> DataResult<LearnerHistory> {
        Ok(LearnerHistory::new(self.store.interactions(course_id, learner_id)?))
    }

    pub fn trajectory(&self, course_id: &str, learner_id: &str) -> DataResult<Vec<bool>> {
        Ok(self.history(course_id, learner_id)?.trajectory(None))
    }

    pub fn skill_trajectory(&self, course_id: &str, skill: &str, learner_id: &str) -> DataResult<Vec<bool>> {
        Ok(self.history(course_id, learner_id)?.trajectory(Some(skill)))
    }

    pub fn remaining(
        &self,
        course_id: &str,
        learner_id: &str,
        filter: ProblemFilter<'_>,
    ) -> DataResult<Vec<Problem>> {
        let course = self.store.course(course_id)?;
        Ok(self.history(course_id, learner_id)?.remaining(&course, filter))
    }
}
