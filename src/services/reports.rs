//! Read-only data projections for analysis: raw logs and trajectory
//! reports, per learner, per course and per experiment.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::db::{DataResult, Interaction, ProblemCategory};
use crate::services::catalog::ProblemCatalog;
use crate::services::interaction_log::InteractionLog;
use crate::services::progress::ProgressTracker;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InteractionData {
    pub all: Vec<Interaction>,
    pub by_skill: BTreeMap<String, Vec<Interaction>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trajectories {
    pub all: Vec<bool>,
    pub pretest: Vec<bool>,
    pub posttest: Vec<bool>,
    /// Practice items only.
    pub problems: Vec<bool>,
    pub by_skill: BTreeMap<String, Vec<bool>>,
}

/// Skill of each answered item, by phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrajectorySkills {
    pub pretest: Vec<String>,
    pub posttest: Vec<String>,
    pub problems: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrajectoryReport {
    pub data: InteractionData,
    pub trajectories: Trajectories,
    pub trajectory_skills: TrajectorySkills,
    pub pretest_length: BTreeMap<String, usize>,
    pub posttest_length: BTreeMap<String, usize>,
}

#[derive(Clone)]
pub struct ReportService {
    catalog: ProblemCatalog,
    log: InteractionLog,
    progress: ProgressTracker,
}

impl ReportService {
    pub fn new(catalog: ProblemCatalog, log: InteractionLog, progress: ProgressTracker) -> Self {
        Self { catalog, log, progress }
    }

    pub fn user_log(&self, course_id: &str, learner_id: &str) -> DataResult<Vec<Interaction>> {
        self.catalog.course(course_id)?;
        Ok(self.log.history(course_id, learner_id)?.interactions().to_vec())
    }

    pub fn problem_log(&self, course_id: &str, learner_id: &str, problem: &str) -> DataResult<Vec<Interaction>> {
        let mut log = self.user_log(course_id, learner_id)?;
        log.retain(|i| i.problem.name == problem);
        Ok(log)
    }

    pub fn course_log(&self, course_id: &str) -> DataResult<BTreeMap<String, Vec<Interaction>>> {
        let learners = self.progress.membership(course_id)?.all();
        self.per_learner(course_id, learners, |learner| self.user_log(course_id, learner))
    }

    /// Finished learners with at least one posttest response before the
    /// experiment's end time.
    pub fn experiment_subjects(&self, course_id: &str, experiment: &str) -> DataResult<Vec<String>> {
        let experiment = self.catalog.experiment(course_id, experiment)?;
        let finished = self.progress.membership(course_id)?.finished;
        let mut subjects = Vec::new();
        for learner in finished {
            let history = self.log.history(course_id, &learner)?;
            let tested_in_window = history
                .responses()
                .any(|i| i.problem.is_posttest() && i.timestamp.timestamp() < experiment.end_time);
            if tested_in_window {
                subjects.push(learner);
            }
        }
        Ok(subjects)
    }

    pub fn experiment_log(&self, course_id: &str, experiment: &str) -> DataResult<BTreeMap<String, Vec<Interaction>>> {
        let subjects = self.experiment_subjects(course_id, experiment)?;
        self.per_learner(course_id, subjects, |learner| self.user_log(course_id, learner))
    }

    pub fn user_trajectory(&self, course_id: &str, learner_id: &str) -> DataResult<TrajectoryReport> {
        let course = self.catalog.course(course_id)?;
        let history = self.log.history(course_id, learner_id)?;
        let firsts: Vec<Interaction> = history.first_attempts().into_iter().cloned().collect();

        let mut report = TrajectoryReport {
            data: InteractionData {
                all: firsts.clone(),
                ..Default::default()
            },
            trajectories: Trajectories {
                all: history.trajectory(None),
                pretest: correctness(&firsts, ProblemCategory::Pretest),
                posttest: correctness(&firsts, ProblemCategory::Posttest),
                problems: correctness(&firsts, ProblemCategory::Normal),
                ..Default::default()
            },
            trajectory_skills: TrajectorySkills {
                pretest: primary_skills(&firsts, ProblemCategory::Pretest),
                posttest: primary_skills(&firsts, ProblemCategory::Posttest),
                problems: primary_skills(&firsts, ProblemCategory::Normal),
            },
            ..Default::default()
        };

        for skill in &course.skills {
            let on_skill: Vec<Interaction> = firsts.iter().filter(|i| i.problem.has_skill(skill)).cloned().collect();
            report.data.by_skill.insert(skill.clone(), on_skill);
            report
                .trajectories
                .by_skill
                .insert(skill.clone(), history.trajectory(Some(skill)));
            report
                .pretest_length
                .insert(skill.clone(), self.catalog.pretest_count(course_id, skill)?);
            report
                .posttest_length
                .insert(skill.clone(), self.catalog.posttest_count(course_id, skill)?);
        }
        Ok(report)
    }

    pub fn course_trajectories(&self, course_id: &str) -> DataResult<BTreeMap<String, TrajectoryReport>> {
        let learners = self.progress.membership(course_id)?.all();
        self.per_learner(course_id, learners, |learner| self.user_trajectory(course_id, learner))
    }

    pub fn experiment_trajectories(
        &self,
        course_id: &str,
        experiment: &str,
    ) -> DataResult<BTreeMap<String, TrajectoryReport>> {
        let subjects = self.experiment_subjects(course_id, experiment)?;
        self.per_learner(course_id, subjects, |learner| self.user_trajectory(course_id, learner))
    }

    fn per_learner<T>(
        &self,
        course_id: &str,
        learners: Vec<String>,
        fetch: impl Fn(&str) -> DataResult<T>,
    ) -> DataResult<BTreeMap<String, T>> {
        tracing::debug!(course_id, learners = learners.len(), "collecting per-learner report");
        learners
            .into_iter()
            .map(|learner| fetch(&learner).map(|value| (learner, value)))
            .collect()
    }
}

fn correctness(firsts: &[Interaction], category: ProblemCategory) -> Vec<bool> {
    firsts
        .iter()
        .filter(|i| i.problem.category == category)
        .map(Interaction::is_correct)
        .collect()
}

fn primary_skills(firsts: &[Interaction], category: ProblemCategory) -> Vec<String> {
    firsts
        .iter()
        .filter(|i| i.problem.category == category)
        .filter_map(|i| i.problem.skills.iter().next().cloned())
        .collect()
}
