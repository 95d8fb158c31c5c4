//! Problem selection.
//!
//! Phases are derived from the learner's log on every call:
//!
//! - PRETEST while any pretest problem is unanswered,
//! - POSTTEST once a posttest response exists, or when no tracked skill
//!   below its threshold has practice left,
//! - MAIN otherwise, drawing from the unanswered practice problems of every
//!   skill whose estimated mastery is below threshold,
//! - DONE when the posttest is exhausted.
//!
//! Every draw is uniform over the eligible candidates.

use std::sync::Arc;

use serde::Serialize;

use crate::db::{Course, DataError, NextProblem, ParameterKey, Problem, ProblemCategory, Storage};
use crate::services::catalog::ProblemFilter;
use crate::services::interaction_log::LearnerHistory;
use crate::services::mastery::MasteryEstimator;
use crate::services::parameters::ParameterService;
use crate::services::random::{choose, RandomSource};

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("no parameter set for skill '{skill}' (key {key:?})")]
    UnresolvedParameters { skill: String, key: ParameterKey },
    #[error("invalid parameter scope: {0}")]
    InvalidScope(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error(transparent)]
    Data(#[from] DataError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Pretest,
    Main,
    Posttest,
    Done,
}

/// Mastery estimate for one tracked skill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillEstimate {
    pub skill: String,
    pub probability: f64,
    pub threshold: f64,
    pub remaining: usize,
}

impl SkillEstimate {
    pub fn below_threshold(&self) -> bool {
        self.probability < self.threshold
    }
}

#[derive(Debug, Clone)]
pub struct SelectionConfig {
    /// Pretest item `choose_first` hands out without a random draw.
    pub first_problem: Option<String>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            first_problem: Some("Pre_assessment_0".to_string()),
        }
    }
}

#[derive(Clone)]
pub struct ProblemSelector {
    store: Arc<dyn Storage>,
    parameters: ParameterService,
    estimator: Arc<dyn MasteryEstimator>,
    random: Arc<dyn RandomSource>,
    config: SelectionConfig,
}

impl ProblemSelector {
    pub fn new(
        store: Arc<dyn Storage>,
        parameters: ParameterService,
        estimator: Arc<dyn MasteryEstimator>,
        random: Arc<dyn RandomSource>,
        config: SelectionConfig,
    ) -> Self {
        Self {
            store,
            parameters,
            estimator,
            random,
            config,
        }
    }

    fn load(&self, course_id: &str, learner_id: &str) -> Result<(Course, LearnerHistory), SelectionError> {
        let course = self.store.course(course_id)?;
        let history = LearnerHistory::new(self.store.interactions(course_id, learner_id)?);
        Ok((course, history))
    }

    pub fn choose_next(&self, course_id: &str, learner_id: &str) -> Result<NextProblem, SelectionError> {
        let (course, history) = self.load(course_id, learner_id)?;
        let candidates = self.candidates(&course, &history, learner_id)?;
        let next = match choose(self.random.as_ref(), &candidates.problems) {
            Some(problem) => NextProblem::Problem(problem.clone()),
            None => NextProblem::done(),
        };
        match &next {
            NextProblem::Problem(problem) => tracing::info!(
                course_id,
                learner_id,
                phase = ?candidates.phase,
                pool = candidates.problems.len(),
                problem = %problem.name,
                "next problem selected"
            ),
            _ => tracing::info!(course_id, learner_id, "course complete, nothing left to select"),
        }
        Ok(next)
    }

    /// The nominated first pretest item, while it is still unanswered.
    pub fn choose_first(&self, course_id: &str, learner_id: &str) -> Result<Option<Problem>, SelectionError> {
        let Some(first) = self.config.first_problem.as_deref() else {
            return Ok(None);
        };
        let (course, history) = self.load(course_id, learner_id)?;
        Ok(history
            .remaining(&course, ProblemFilter::category(ProblemCategory::Pretest))
            .into_iter()
            .find(|problem| problem.name == first))
    }

    pub fn phase(&self, course_id: &str, learner_id: &str) -> Result<Phase, SelectionError> {
        let (course, history) = self.load(course_id, learner_id)?;
        Ok(self.candidates(&course, &history, learner_id)?.phase)
    }

    /// Per-skill estimates over the tracked skills, in catalog order.
    pub fn estimates(&self, course_id: &str, learner_id: &str) -> Result<Vec<SkillEstimate>, SelectionError> {
        let (course, history) = self.load(course_id, learner_id)?;
        self.skill_estimates(&course, &history, learner_id)
    }

    /// The eligible pool for the learner's current phase. An empty pool
    /// means the course is done.
    pub fn candidates(
        &self,
        course: &Course,
        history: &LearnerHistory,
        learner_id: &str,
    ) -> Result<Candidates, SelectionError> {
        let pretest = history.remaining(course, ProblemFilter::category(ProblemCategory::Pretest));
        if !pretest.is_empty() {
            return Ok(Candidates::new(Phase::Pretest, pretest));
        }

        if !history.has_response_in(ProblemCategory::Posttest) {
            let mut pool: Vec<Problem> = Vec::new();
            for estimate in self.skill_estimates(course, history, learner_id)? {
                if !estimate.below_threshold() {
                    continue;
                }
                let filter = ProblemFilter::skill(&estimate.skill).with_category(ProblemCategory::Normal);
                let remaining = history.remaining(course, filter);
                tracing::debug!(
                    course_id = %course.course_id,
                    learner_id,
                    skill = %estimate.skill,
                    probability = estimate.probability,
                    added = remaining.len(),
                    "skill under threshold"
                );
                for problem in remaining {
                    if !pool.iter().any(|p| p.name == problem.name) {
                        pool.push(problem);
                    }
                }
            }
            if !pool.is_empty() {
                return Ok(Candidates::new(Phase::Main, pool));
            }
        }

        let posttest = history.remaining(course, ProblemFilter::category(ProblemCategory::Posttest));
        if posttest.is_empty() {
            Ok(Candidates::new(Phase::Done, Vec::new()))
        } else {
            Ok(Candidates::new(Phase::Posttest, posttest))
        }
    }

    fn skill_estimates(
        &self,
        course: &Course,
        history: &LearnerHistory,
        learner_id: &str,
    ) -> Result<Vec<SkillEstimate>, SelectionError> {
        course
            .tracked_skills()
            .map(|skill| {
                let params = self.parameters.resolve(&course.course_id, learner_id, skill)?;
                let probability = self.estimator.estimate(&history.trajectory(Some(skill)), &params);
                let remaining = history
                    .remaining(course, ProblemFilter::skill(skill).with_category(ProblemCategory::Normal))
                    .len();
                Ok(SkillEstimate {
                    skill: skill.clone(),
                    probability,
                    threshold: params.threshold,
                    remaining,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Candidates {
    pub phase: Phase,
    pub problems: Vec<Problem>,
}

impl Candidates {
    fn new(phase: Phase, problems: Vec<Problem>) -> Self {
        Self { phase, problems }
    }
}
