use std::sync::Arc;

use crate::db::{
    Course, DataError, DataResult, Experiment, Problem, ProblemCategory, Storage,
};

/// Registry of a course's skills and problems. Entries are only ever
/// appended.
#[derive(Clone)]
pub struct ProblemCatalog {
    store: Arc<dyn Storage>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProblemFilter<'a> {
    pub skill: Option<&'a str>,
    pub category: Option<ProblemCategory>,
}

impl<'a> ProblemFilter<'a> {
    pub fn skill(skill: &'a str) -> Self {
        Self {
            skill: Some(skill),
            category: None,
        }
    }

    pub fn category(category: ProblemCategory) -> Self {
        Self {
            skill: None,
            category: Some(category),
        }
    }

    pub fn with_category(mut self, category: ProblemCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn matches(&self, problem: &Problem) -> bool {
        self.skill.map_or(true, |skill| problem.has_skill(skill))
            && self.category.map_or(true, |category| problem.category == category)
    }
}

impl ProblemCatalog {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    pub fn create_course(&self, course_id: &str) -> DataResult<()> {
        if course_id.trim().is_empty() {
            return Err(DataError::Constraint("course id must not be empty".into()));
        }
        self.store.create_course(course_id)?;
        tracing::info!(course_id, "course created");
        Ok(())
    }

    pub fn course_ids(&self) -> Vec<String> {
        self.store.course_ids()
    }

    pub fn course(&self, course_id: &str) -> DataResult<Course> {
        self.store.course(course_id)
    }

    pub fn register_skill(&self, course_id: &str, skill: &str) -> DataResult<()> {
        if skill.trim().is_empty() {
            return Err(DataError::Constraint("skill name must not be empty".into()));
        }
        self.store.append_skill(course_id, skill)?;
        tracing::debug!(course_id, skill, "skill registered");
        Ok(())
    }

    pub fn skills(&self, course_id: &str) -> DataResult<Vec<String>> {
        Ok(self.store.course(course_id)?.skills)
    }

    pub fn register_problem(
        &self,
        course_id: &str,
        name: &str,
        url: &str,
        skills: Vec<String>,
        category: ProblemCategory,
    ) -> DataResult<Problem> {
        if name.trim().is_empty() {
            return Err(DataError::Constraint("problem name must not be empty".into()));
        }
        if skills.is_empty() {
            return Err(DataError::Constraint(format!("problem {name} needs at least one skill")));
        }
        let problem = Problem::new(name, url, skills, category);
        self.store.append_problem(course_id, problem.clone())?;
        tracing::debug!(course_id, problem = name, category = category.as_str(), "problem registered");
        Ok(problem)
    }

    pub fn problems(&self, course_id: &str, filter: ProblemFilter<'_>) -> DataResult<Vec<Problem>> {
        let course = self.store.course(course_id)?;
        Ok(course
            .problems
            .into_iter()
            .filter(|problem| filter.matches(problem))
            .collect())
    }

    pub fn problem(&self, course_id: &str, name: &str) -> DataResult<Problem> {
        self.store
            .course(course_id)?
            .problem(name)
            .cloned()
            .ok_or_else(|| DataError::NotFound(format!("problem {name}")))
    }

    pub fn count(&self, course_id: &str, filter: ProblemFilter<'_>) -> DataResult<usize> {
        Ok(self.problems(course_id, filter)?.len())
    }

    pub fn pretest_count(&self, course_id: &str, skill: &str) -> DataResult<usize> {
        self.count(course_id, ProblemFilter::skill(skill).with_category(ProblemCategory::Pretest))
    }

    pub fn posttest_count(&self, course_id: &str, skill: &str) -> DataResult<usize> {
        self.count(course_id, ProblemFilter::skill(skill).with_category(ProblemCategory::Posttest))
    }

    // ---- experiments ----

    pub fn add_experiment(&self, course_id: &str, experiment: Experiment) -> DataResult<()> {
        if experiment.end_time < experiment.start_time {
            return Err(DataError::Constraint(format!(
                "experiment {} ends before it starts",
                experiment.name
            )));
        }
        self.store.append_experiment(course_id, experiment)
    }

    pub fn experiments(&self, course_id: &str) -> DataResult<Vec<Experiment>> {
        Ok(self.store.course(course_id)?.experiments)
    }

    pub fn experiment(&self, course_id: &str, name: &str) -> DataResult<Experiment> {
        self.experiments(course_id)?
            .into_iter()
            .find(|e| e.name == name)
            .ok_or_else(|| DataError::NotFound(format!("experiment {name}")))
    }

    pub fn remove_experiment(&self, course_id: &str, name: &str) -> DataResult<()> {
        self.store.remove_experiment(course_id, name)
    }
}
