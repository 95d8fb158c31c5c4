//! Records held by the storage collaborator.
//!
//! Field names on the wire follow the shapes the tutor front-end already
//! consumes: problems carry `pretest`/`posttest` flags, the pending `next`
//! slot is either a problem, `{"done": true}` or `{"error": "..."}`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Skill placeholder for items that are not gated by mastery.
pub const SENTINEL_SKILL: &str = "None";

// ============================================================
// Problem
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemCategory {
    Pretest,
    Posttest,
    Normal,
}

impl ProblemCategory {
    pub fn is_assessment(self) -> bool {
        matches!(self, Self::Pretest | Self::Posttest)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pretest => "pretest",
            Self::Posttest => "posttest",
            Self::Normal => "normal",
        }
    }
}

/// A practice or assessment item. Identity is the name within its course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProblemRecord", into = "ProblemRecord")]
pub struct Problem {
    pub name: String,
    pub url: String,
    pub skills: BTreeSet<String>,
    pub category: ProblemCategory,
}

impl Problem {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        skills: impl IntoIterator<Item = impl Into<String>>,
        category: ProblemCategory,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            skills: skills.into_iter().map(Into::into).collect(),
            category,
        }
    }

    pub fn has_skill(&self, skill: &str) -> bool {
        self.skills.contains(skill)
    }

    pub fn is_pretest(&self) -> bool {
        self.category == ProblemCategory::Pretest
    }

    pub fn is_posttest(&self) -> bool {
        self.category == ProblemCategory::Posttest
    }

    pub fn is_normal(&self) -> bool {
        self.category == ProblemCategory::Normal
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProblemRecord {
    #[serde(rename = "problem_name")]
    name: String,
    #[serde(rename = "tutor_url")]
    url: String,
    skills: Vec<String>,
    #[serde(default)]
    pretest: bool,
    #[serde(default)]
    posttest: bool,
}

impl TryFrom<ProblemRecord> for Problem {
    type Error = String;

    fn try_from(record: ProblemRecord) -> Result<Self, Self::Error> {
        let category = match (record.pretest, record.posttest) {
            (true, true) => {
                return Err(format!(
                    "problem {} cannot be both pretest and posttest",
                    record.name
                ))
            }
            (true, false) => ProblemCategory::Pretest,
            (false, true) => ProblemCategory::Posttest,
            (false, false) => ProblemCategory::Normal,
        };
        if record.skills.is_empty() {
            return Err(format!("problem {} has no skills", record.name));
        }
        Ok(Problem::new(record.name, record.url, record.skills, category))
    }
}

impl From<Problem> for ProblemRecord {
    fn from(problem: Problem) -> Self {
        Self {
            pretest: problem.is_pretest(),
            posttest: problem.is_posttest(),
            name: problem.name,
            url: problem.url,
            skills: problem.skills.into_iter().collect(),
        }
    }
}

// ============================================================
// Interaction log
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Response,
    PageLoad,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub learner_id: String,
    pub problem: Problem,
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

impl Interaction {
    pub fn response(
        learner_id: impl Into<String>,
        problem: Problem,
        correct: bool,
        attempt: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            learner_id: learner_id.into(),
            problem,
            kind: InteractionKind::Response,
            correct: Some(correct),
            attempt: Some(attempt),
            timestamp,
        }
    }

    pub fn page_load(
        learner_id: impl Into<String>,
        problem: Problem,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            learner_id: learner_id.into(),
            problem,
            kind: InteractionKind::PageLoad,
            correct: None,
            attempt: None,
            timestamp,
        }
    }

    pub fn is_response(&self) -> bool {
        self.kind == InteractionKind::Response
    }

    pub fn is_first_attempt(&self) -> bool {
        self.is_response() && self.attempt == Some(1)
    }

    pub fn is_correct(&self) -> bool {
        self.correct.unwrap_or(false)
    }

    /// Same learner, problem and attempt: the RESPONSE dedup key.
    pub fn same_response(&self, other: &Interaction) -> bool {
        self.is_response()
            && other.is_response()
            && self.learner_id == other.learner_id
            && self.problem.name == other.problem.name
            && self.attempt == other.attempt
    }
}

// ============================================================
// Progress
// ============================================================

/// Content of a learner's pending `next` slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NextProblem {
    Problem(Problem),
    Error { error: String },
    Done { done: bool },
}

impl NextProblem {
    pub fn done() -> Self {
        Self::Done { done: true }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    pub fn problem(&self) -> Option<&Problem> {
        match self {
            Self::Problem(problem) => Some(problem),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerProgress {
    pub learner_id: String,
    pub current: Option<Problem>,
    pub next: Option<NextProblem>,
}

impl LearnerProgress {
    pub fn new(learner_id: impl Into<String>) -> Self {
        Self {
            learner_id: learner_id.into(),
            current: None,
            next: None,
        }
    }

    /// A selection run is needed while nothing valid is pending.
    pub fn needs_selection(&self) -> bool {
        match &self.next {
            None => true,
            Some(next) => next.is_error(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub in_progress: Vec<String>,
    pub finished: Vec<String>,
}

impl Membership {
    pub fn is_finished(&self, learner_id: &str) -> bool {
        self.finished.iter().any(|id| id == learner_id)
    }

    pub fn is_enrolled(&self, learner_id: &str) -> bool {
        self.is_finished(learner_id) || self.in_progress.iter().any(|id| id == learner_id)
    }

    pub fn all(&self) -> Vec<String> {
        self.in_progress
            .iter()
            .chain(self.finished.iter())
            .cloned()
            .collect()
    }
}

// ============================================================
// Model parameters
// ============================================================

/// Two-state mastery model parameters plus the acceptance threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub pi: f64,
    pub pt: f64,
    pub pg: f64,
    pub ps: f64,
    pub threshold: f64,
}

impl ModelParams {
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("pi", self.pi),
            ("pt", self.pt),
            ("pg", self.pg),
            ("ps", self.ps),
            ("threshold", self.threshold),
        ] {
            if !(0.0..=1.0).contains(&value) || value.is_nan() {
                return Err(format!("{name} must be within [0, 1], got {value}"));
            }
        }
        Ok(())
    }
}

/// Scope a parameter set applies to. `course` is always part of the scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParameterKey {
    pub course_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
}

impl ParameterKey {
    pub fn course(course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            learner_id: None,
            skill: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterEntry {
    pub key: ParameterKey,
    pub params: ModelParams,
}

// ============================================================
// Course
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    pub name: String,
    pub start_time: i64,
    pub end_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub course_id: String,
    pub skills: Vec<String>,
    pub problems: Vec<Problem>,
    pub experiments: Vec<Experiment>,
    pub model_params: Vec<ModelParams>,
}

impl Course {
    pub fn new(course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            skills: Vec::new(),
            problems: Vec::new(),
            experiments: Vec::new(),
            model_params: Vec::new(),
        }
    }

    pub fn problem(&self, name: &str) -> Option<&Problem> {
        self.problems.iter().find(|p| p.name == name)
    }

    /// Skills whose mastery gates practice, i.e. everything but the sentinel.
    pub fn tracked_skills(&self) -> impl Iterator<Item = &String> {
        self.skills.iter().filter(|skill| skill.as_str() != SENTINEL_SKILL)
    }
}
