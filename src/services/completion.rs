//! Read-only completion projection.
//!
//! Nothing here is stored; both flags are recomputed from membership, the
//! catalog and the learner's log on every status read.

use std::collections::HashSet;
use std::str::FromStr;

use serde::Serialize;

use crate::db::{Course, Problem, ProblemCategory};
use crate::services::interaction_log::LearnerHistory;

/// When the early high-knowledge exit is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EarlyExitCheck {
    /// On every status read, whatever the learner has done since.
    #[default]
    Always,
    /// Only until the learner answers anything beyond the pretest.
    PretestOnly,
}

impl FromStr for EarlyExitCheck {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "pretest_only" | "pretest-only" => Ok(Self::PretestOnly),
            other => Err(format!("unknown early exit check: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionPolicy {
    /// Early exit when correct pretest answers exceed `floor(n * cutoff)`;
    /// `None` disables the rule.
    pub pretest_cutoff: Option<f64>,
    /// Pretest items left out of the tally and counted separately.
    pub attention_checks: Vec<String>,
    pub min_attention_correct: usize,
    pub early_exit: EarlyExitCheck,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self {
            pretest_cutoff: Some(0.5),
            attention_checks: Vec::new(),
            min_attention_correct: 0,
            early_exit: EarlyExitCheck::Always,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletionStatus {
    pub done_with_current: bool,
    pub done_with_course: bool,
}

pub fn completion_status(
    current: Option<&Problem>,
    finished: bool,
    course: &Course,
    history: &LearnerHistory,
    policy: &CompletionPolicy,
) -> CompletionStatus {
    CompletionStatus {
        done_with_current: done_with_current(current, history),
        done_with_course: done_with_course(finished, course, history, policy),
    }
}

/// Practice items need a correct first attempt; assessment items only need
/// one submission of any kind.
pub fn done_with_current(current: Option<&Problem>, history: &LearnerHistory) -> bool {
    let Some(current) = current else {
        return true;
    };
    let mut responses = history.responses_to(&current.name).peekable();
    if current.category.is_assessment() {
        return responses.peek().is_some();
    }
    responses.any(|i| i.is_first_attempt() && i.is_correct())
}

pub fn done_with_course(
    finished: bool,
    course: &Course,
    history: &LearnerHistory,
    policy: &CompletionPolicy,
) -> bool {
    finished || early_exit(course, history, policy)
}

fn early_exit(course: &Course, history: &LearnerHistory, policy: &CompletionPolicy) -> bool {
    let Some(cutoff) = policy.pretest_cutoff else {
        return false;
    };
    if policy.early_exit == EarlyExitCheck::PretestOnly
        && (history.has_response_in(ProblemCategory::Normal) || history.has_response_in(ProblemCategory::Posttest))
    {
        return false;
    }

    let is_attention = |name: &str| policy.attention_checks.iter().any(|a| a == name);
    let tallied = course
        .problems
        .iter()
        .filter(|p| p.is_pretest() && !is_attention(&p.name))
        .count();
    if tallied == 0 {
        return false;
    }

    let mut correct: HashSet<&str> = HashSet::new();
    let mut attention_correct: HashSet<&str> = HashSet::new();
    for interaction in history.first_attempts() {
        if !interaction.problem.is_pretest() || !interaction.is_correct() {
            continue;
        }
        let name = interaction.problem.name.as_str();
        if is_attention(name) {
            attention_correct.insert(name);
        } else {
            correct.insert(name);
        }
    }

    let needed = (tallied as f64 * cutoff).floor() as usize;
    correct.len() > needed && attention_correct.len() >= policy.min_attention_correct
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::db::Interaction;

    fn course(pretests: usize) -> Course {
        let mut course = Course::new("c1");
        course.skills = vec!["center".into()];
        for i in 0..pretests {
            course.problems.push(Problem::new(
                format!("Pre_assessment_{i}"),
                "u",
                ["center"],
                ProblemCategory::Pretest,
            ));
        }
        course.problems.push(Problem::new("b1", "u", ["center"], ProblemCategory::Normal));
        course.problems.push(Problem::new("post", "u", ["center"], ProblemCategory::Posttest));
        course
    }

    fn answers(course: &Course, results: &[(&str, bool, u32)]) -> LearnerHistory {
        let at = Utc.timestamp_opt(100, 0).unwrap();
        LearnerHistory::new(
            results
                .iter()
                .map(|(name, correct, attempt)| {
                    Interaction::response("u1", course.problem(name).unwrap().clone(), *correct, *attempt, at)
                })
                .collect(),
        )
    }

    fn pretest_answers(course: &Course, correct: usize) -> LearnerHistory {
        let names: Vec<String> = (0..14).map(|i| format!("Pre_assessment_{i}")).collect();
        let results: Vec<(&str, bool, u32)> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i < correct, 1))
            .collect();
        answers(course, &results)
    }

    #[test]
    fn nothing_current_is_done() {
        assert!(done_with_current(None, &LearnerHistory::default()));
    }

    #[test]
    fn practice_needs_correct_first_attempt() {
        let course = course(1);
        let b1 = course.problem("b1").unwrap();
        assert!(!done_with_current(Some(b1), &answers(&course, &[("b1", false, 1), ("b1", true, 2)])));
        assert!(done_with_current(Some(b1), &answers(&course, &[("b1", true, 1)])));
    }

    #[test]
    fn assessment_needs_any_submission_to_itself() {
        let course = course(2);
        let pre = course.problem("Pre_assessment_0").unwrap();
        assert!(!done_with_current(Some(pre), &answers(&course, &[("Pre_assessment_1", true, 1)])));
        assert!(done_with_current(Some(pre), &answers(&course, &[("Pre_assessment_0", false, 1)])));
    }

    #[test]
    fn more_than_half_correct_exits_early() {
        let course = course(14);
        let policy = CompletionPolicy::default();
        assert!(!done_with_course(false, &course, &pretest_answers(&course, 7), &policy));
        assert!(done_with_course(false, &course, &pretest_answers(&course, 8), &policy));
    }

    #[test]
    fn finished_is_always_done() {
        let course = course(14);
        assert!(done_with_course(true, &course, &LearnerHistory::default(), &CompletionPolicy::default()));
    }

    #[test]
    fn disabled_cutoff_never_exits_early() {
        let course = course(14);
        let policy = CompletionPolicy { pretest_cutoff: None, ..Default::default() };
        assert!(!done_with_course(false, &course, &pretest_answers(&course, 14), &policy));
    }

    #[test]
    fn attention_check_excluded_and_required() {
        let course = course(14);
        let policy = CompletionPolicy {
            attention_checks: vec!["Pre_assessment_13".into()],
            min_attention_correct: 1,
            ..Default::default()
        };
        // 13 tallied items: need more than 6 correct plus the attention item
        let mut results: Vec<(String, bool)> = (0..7).map(|i| (format!("Pre_assessment_{i}"), true)).collect();
        results.push(("Pre_assessment_13".into(), false));
        let history = answers(
            &course,
            &results.iter().map(|(n, c)| (n.as_str(), *c, 1)).collect::<Vec<_>>(),
        );
        assert!(!done_with_course(false, &course, &history, &policy));

        results.pop();
        results.push(("Pre_assessment_13".into(), true));
        let history = answers(
            &course,
            &results.iter().map(|(n, c)| (n.as_str(), *c, 1)).collect::<Vec<_>>(),
        );
        assert!(done_with_course(false, &course, &history, &policy));
    }

    #[test]
    fn pretest_only_check_stops_after_practice_starts() {
        let course = course(2);
        let policy = CompletionPolicy { early_exit: EarlyExitCheck::PretestOnly, ..Default::default() };
        let pretest = [("Pre_assessment_0", true, 1), ("Pre_assessment_1", true, 1)];
        assert!(done_with_course(false, &course, &answers(&course, &pretest), &policy));

        let with_practice = [pretest[0], pretest[1], ("b1", false, 1)];
        assert!(!done_with_course(false, &course, &answers(&course, &with_practice), &policy));
        let always = CompletionPolicy::default();
        assert!(done_with_course(false, &course, &answers(&course, &with_practice), &always));
    }

    #[test]
    fn parse_early_exit_check() {
        assert_eq!("always".parse::<EarlyExitCheck>().unwrap(), EarlyExitCheck::Always);
        assert_eq!("pretest_only".parse::<EarlyExitCheck>().unwrap(), EarlyExitCheck::PretestOnly);
        assert!("sometimes".parse::<EarlyExitCheck>().is_err());
    }
}
