use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use super::{
    Course, DataError, DataResult, Experiment, Interaction, LearnerProgress, Membership,
    ModelParams, ParameterEntry, ParameterKey, Problem, Storage,
};

#[derive(Debug)]
struct CourseState {
    course: Course,
    logs: HashMap<String, Vec<Interaction>>,
    progress: HashMap<String, LearnerProgress>,
    membership: Membership,
}

impl CourseState {
    fn new(course_id: &str) -> Self {
        Self {
            course: Course::new(course_id),
            logs: HashMap::new(),
            progress: HashMap::new(),
            membership: Membership::default(),
        }
    }
}

/// Process-local store. All course state sits behind one lock so that each
/// trait call is a single atomic step.
#[derive(Debug, Default)]
pub struct MemoryStore {
    courses: RwLock<BTreeMap<String, CourseState>>,
    params: RwLock<BTreeMap<ParameterKey, ModelParams>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_course<T>(&self, course_id: &str, f: impl FnOnce(&CourseState) -> DataResult<T>) -> DataResult<T> {
        let courses = self.courses.read();
        let state = courses
            .get(course_id)
            .ok_or_else(|| DataError::NotFound(format!("course {course_id}")))?;
        f(state)
    }

    fn write_course<T>(
        &self,
        course_id: &str,
        f: impl FnOnce(&mut CourseState) -> DataResult<T>,
    ) -> DataResult<T> {
        let mut courses = self.courses.write();
        let state = courses
            .get_mut(course_id)
            .ok_or_else(|| DataError::NotFound(format!("course {course_id}")))?;
        f(state)
    }
}

impl Storage for MemoryStore {
    fn create_course(&self, course_id: &str) -> DataResult<()> {
        let mut courses = self.courses.write();
        if courses.contains_key(course_id) {
            return Err(DataError::DuplicateKey(format!("course {course_id}")));
        }
        courses.insert(course_id.to_string(), CourseState::new(course_id));
        Ok(())
    }

    fn course_ids(&self) -> Vec<String> {
        self.courses.read().keys().cloned().collect()
    }

    fn course(&self, course_id: &str) -> DataResult<Course> {
        self.read_course(course_id, |state| Ok(state.course.clone()))
    }

    fn append_skill(&self, course_id: &str, skill: &str) -> DataResult<()> {
        self.write_course(course_id, |state| {
            if state.course.skills.iter().any(|s| s == skill) {
                return Err(DataError::DuplicateKey(format!("skill {skill}")));
            }
            state.course.skills.push(skill.to_string());
            Ok(())
        })
    }

    fn append_problem(&self, course_id: &str, problem: Problem) -> DataResult<()> {
        self.write_course(course_id, |state| {
            let unknown: Vec<String> = problem
                .skills
                .iter()
                .filter(|skill| !state.course.skills.contains(skill))
                .cloned()
                .collect();
            if !unknown.is_empty() {
                return Err(DataError::UnknownSkill(unknown));
            }
            if state.course.problem(&problem.name).is_some() {
                return Err(DataError::DuplicateKey(format!("problem {}", problem.name)));
            }
            state.course.problems.push(problem);
            Ok(())
        })
    }

    fn append_experiment(&self, course_id: &str, experiment: Experiment) -> DataResult<()> {
        self.write_course(course_id, |state| {
            if state.course.experiments.iter().any(|e| e.name == experiment.name) {
                return Err(DataError::DuplicateKey(format!("experiment {}", experiment.name)));
            }
            state.course.experiments.push(experiment);
            Ok(())
        })
    }

    fn remove_experiment(&self, course_id: &str, name: &str) -> DataResult<()> {
        self.write_course(course_id, |state| {
            let before = state.course.experiments.len();
            state.course.experiments.retain(|e| e.name != name);
            if state.course.experiments.len() == before {
                return Err(DataError::NotFound(format!("experiment {name}")));
            }
            Ok(())
        })
    }

    fn store_model_params(
        &self,
        course_id: &str,
        params: Vec<ModelParams>,
        replace: bool,
    ) -> DataResult<()> {
        self.write_course(course_id, |state| {
            if replace {
                state.course.model_params = params;
            } else {
                for set in params {
                    if !state.course.model_params.contains(&set) {
                        state.course.model_params.push(set);
                    }
                }
            }
            Ok(())
        })
    }

    fn append_interaction(&self, course_id: &str, interaction: Interaction) -> DataResult<bool> {
        self.write_course(course_id, |state| {
            let log = state.logs.entry(interaction.learner_id.clone()).or_default();
            if interaction.is_response() && log.iter().any(|existing| existing.same_response(&interaction)) {
                return Ok(false);
            }
            log.push(interaction);
            Ok(true)
        })
    }

    fn interactions(&self, course_id: &str, learner_id: &str) -> DataResult<Vec<Interaction>> {
        self.read_course(course_id, |state| {
            Ok(state.logs.get(learner_id).cloned().unwrap_or_default())
        })
    }

    fn insert_progress(&self, course_id: &str, progress: LearnerProgress) -> DataResult<()> {
        self.write_course(course_id, |state| {
            if state.progress.contains_key(&progress.learner_id) {
                return Err(DataError::DuplicateKey(format!("progress {}", progress.learner_id)));
            }
            state.progress.insert(progress.learner_id.clone(), progress);
            Ok(())
        })
    }

    fn progress(&self, course_id: &str, learner_id: &str) -> DataResult<LearnerProgress> {
        self.read_course(course_id, |state| {
            state
                .progress
                .get(learner_id)
                .cloned()
                .ok_or_else(|| DataError::NotFound(format!("learner {learner_id}")))
        })
    }

    fn update_progress(
        &self,
        course_id: &str,
        learner_id: &str,
        update: &mut dyn FnMut(&mut LearnerProgress) -> DataResult<()>,
    ) -> DataResult<LearnerProgress> {
        self.write_course(course_id, |state| {
            let progress = state
                .progress
                .get_mut(learner_id)
                .ok_or_else(|| DataError::NotFound(format!("learner {learner_id}")))?;
            let mut draft = progress.clone();
            update(&mut draft)?;
            *progress = draft.clone();
            Ok(draft)
        })
    }

    fn enroll(&self, course_id: &str, learner_id: &str) -> DataResult<()> {
        self.write_course(course_id, |state| {
            if state.membership.is_enrolled(learner_id) {
                return Err(DataError::DuplicateKey(format!("learner {learner_id}")));
            }
            state.membership.in_progress.push(learner_id.to_string());
            Ok(())
        })
    }

    fn mark_finished(&self, course_id: &str, learner_id: &str) -> DataResult<bool> {
        self.write_course(course_id, |state| {
            let membership = &mut state.membership;
            let Some(pos) = membership.in_progress.iter().position(|id| id == learner_id) else {
                return Ok(false);
            };
            let id = membership.in_progress.remove(pos);
            membership.finished.push(id);
            Ok(true)
        })
    }

    fn membership(&self, course_id: &str) -> DataResult<Membership> {
        self.read_course(course_id, |state| Ok(state.membership.clone()))
    }

    fn get_params(&self, key: &ParameterKey) -> Option<ModelParams> {
        self.params.read().get(key).copied()
    }

    fn set_params(&self, key: ParameterKey, params: ModelParams) {
        self.params.write().insert(key, params);
    }

    fn all_params(&self) -> Vec<ParameterEntry> {
        self.params
            .read()
            .iter()
            .map(|(key, params)| ParameterEntry {
                key: key.clone(),
                params: *params,
            })
            .collect()
    }

    fn params_for_learner(&self, learner_id: &str) -> Vec<ParameterEntry> {
        self.params
            .read()
            .iter()
            .filter(|(key, _)| key.learner_id.as_deref() == Some(learner_id))
            .map(|(key, params)| ParameterEntry {
                key: key.clone(),
                params: *params,
            })
            .collect()
    }
}
