use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::db::{ModelParams, ParameterEntry, ParameterKey, Storage};
use crate::services::random::{choose, RandomSource};
use crate::services::selector::SelectionError;

/// Which ids, beyond the course, make up a parameter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterScope {
    pub per_learner: bool,
    pub per_skill: bool,
}

impl Default for ParameterScope {
    fn default() -> Self {
        Self {
            per_learner: true,
            per_skill: true,
        }
    }
}

impl FromStr for ParameterScope {
    type Err = SelectionError;

    /// Whitespace separated subset of `course`, `user`, `skill`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut scope = Self {
            per_learner: false,
            per_skill: false,
        };
        for part in raw.split_whitespace() {
            match part {
                "course" => {}
                "user" => scope.per_learner = true,
                "skill" => scope.per_skill = true,
                other => {
                    return Err(SelectionError::InvalidScope(format!(
                        "unknown parameter scope part: {other}"
                    )))
                }
            }
        }
        Ok(scope)
    }
}

impl fmt::Display for ParameterScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("course")?;
        if self.per_learner {
            f.write_str(" user")?;
        }
        if self.per_skill {
            f.write_str(" skill")?;
        }
        Ok(())
    }
}

impl ParameterScope {
    pub fn key(&self, course_id: &str, learner_id: &str, skill: &str) -> ParameterKey {
        ParameterKey {
            course_id: course_id.to_string(),
            learner_id: self.per_learner.then(|| learner_id.to_string()),
            skill: self.per_skill.then(|| skill.to_string()),
        }
    }

    /// Builds a key from caller-supplied parts; every part the scope needs
    /// must be present.
    pub fn compose(
        &self,
        course_id: Option<&str>,
        learner_id: Option<&str>,
        skill: Option<&str>,
    ) -> Result<ParameterKey, SelectionError> {
        fn present(value: Option<&str>) -> Option<&str> {
            value.filter(|v| !v.trim().is_empty())
        }

        let course_id = present(course_id)
            .ok_or_else(|| SelectionError::InvalidScope("course id is required".into()))?;
        let learner_id = match (self.per_learner, present(learner_id)) {
            (true, None) => {
                return Err(SelectionError::InvalidScope(format!(
                    "scope '{self}' requires a user id"
                )))
            }
            (true, Some(id)) => Some(id.to_string()),
            (false, _) => None,
        };
        let skill = match (self.per_skill, present(skill)) {
            (true, None) => {
                return Err(SelectionError::InvalidScope(format!(
                    "scope '{self}' requires a skill name"
                )))
            }
            (true, Some(name)) => Some(name.to_string()),
            (false, _) => None,
        };
        Ok(ParameterKey {
            course_id: course_id.to_string(),
            learner_id,
            skill,
        })
    }
}

/// Stored parameter sets and the per-course default pool.
#[derive(Clone)]
pub struct ParameterService {
    store: Arc<dyn Storage>,
    scope: ParameterScope,
    random: Arc<dyn RandomSource>,
}

impl ParameterService {
    pub fn new(store: Arc<dyn Storage>, scope: ParameterScope, random: Arc<dyn RandomSource>) -> Self {
        Self { store, scope, random }
    }

    pub fn scope(&self) -> ParameterScope {
        self.scope
    }

    /// Scoped key first, then the skill-wide and course-wide defaults.
    pub fn resolve(&self, course_id: &str, learner_id: &str, skill: &str) -> Result<ModelParams, SelectionError> {
        let scoped = self.scope.key(course_id, learner_id, skill);
        let skill_wide = ParameterKey {
            learner_id: None,
            ..scoped.clone()
        };
        let course_wide = ParameterKey::course(course_id);

        let found = [&scoped, &skill_wide, &course_wide]
            .into_iter()
            .find_map(|key| self.store.get_params(key));
        found.ok_or_else(|| SelectionError::UnresolvedParameters {
            skill: skill.to_string(),
            key: scoped,
        })
    }

    /// When the course has a default pool, a pool member replaces the
    /// supplied set.
    pub fn set_parameters(
        &self,
        course_id: Option<&str>,
        learner_id: Option<&str>,
        skill: Option<&str>,
        params: ModelParams,
    ) -> Result<ParameterKey, SelectionError> {
        let key = self.scope.compose(course_id, learner_id, skill)?;
        let params = self.pick_from_pool(&key.course_id)?.unwrap_or(params);
        params.validate().map_err(SelectionError::InvalidParameters)?;
        self.store.set_params(key.clone(), params);
        tracing::debug!(?key, "parameters stored");
        Ok(key)
    }

    /// Configures every skill of the course for one learner. Preference:
    /// the set this learner already uses in a sibling section of the course,
    /// then a random pool member, then `fallback`.
    pub fn configure_learner(
        &self,
        course_id: &str,
        learner_id: &str,
        fallback: Option<ModelParams>,
    ) -> Result<Vec<String>, SelectionError> {
        let skills = self.store.course(course_id)?.skills;
        let params = match self.sibling_section_params(course_id, learner_id) {
            Some(existing) => {
                tracing::debug!(course_id, learner_id, "reusing parameters from sibling course section");
                existing
            }
            None => match self.pick_from_pool(course_id)? {
                Some(pooled) => pooled,
                None => fallback.ok_or_else(|| SelectionError::UnresolvedParameters {
                    skill: "*".to_string(),
                    key: ParameterKey {
                        course_id: course_id.to_string(),
                        learner_id: Some(learner_id.to_string()),
                        skill: None,
                    },
                })?,
            },
        };
        params.validate().map_err(SelectionError::InvalidParameters)?;

        for skill in &skills {
            self.store
                .set_params(self.scope.key(course_id, learner_id, skill), params);
        }
        Ok(skills)
    }

    /// Enrollment hook: a random pool member for every skill, if the course
    /// has a pool at all.
    pub fn assign_from_pool(&self, course_id: &str, learner_id: &str) -> Result<Option<ModelParams>, SelectionError> {
        let Some(params) = self.pick_from_pool(course_id)? else {
            return Ok(None);
        };
        for skill in self.store.course(course_id)?.skills {
            self.store
                .set_params(self.scope.key(course_id, learner_id, &skill), params);
        }
        tracing::info!(course_id, learner_id, ?params, "assigned default parameter set");
        Ok(Some(params))
    }

    pub fn set_default_pool(
        &self,
        course_id: &str,
        pool: Vec<ModelParams>,
        replace: bool,
    ) -> Result<(), SelectionError> {
        for params in &pool {
            params.validate().map_err(SelectionError::InvalidParameters)?;
        }
        self.store.store_model_params(course_id, pool, replace)?;
        Ok(())
    }

    pub fn default_pool(&self, course_id: &str) -> Result<Vec<ModelParams>, SelectionError> {
        Ok(self.store.course(course_id)?.model_params)
    }

    pub fn all(&self) -> Vec<ParameterEntry> {
        self.store.all_params()
    }

    fn pick_from_pool(&self, course_id: &str) -> Result<Option<ModelParams>, SelectionError> {
        let pool = self.default_pool(course_id)?;
        Ok(choose(self.random.as_ref(), &pool).copied())
    }

    fn sibling_section_params(&self, course_id: &str, learner_id: &str) -> Option<ModelParams> {
        let main_course = course_id.split(':').next().unwrap_or(course_id);
        self.store
            .params_for_learner(learner_id)
            .into_iter()
            .find(|entry| entry.key.course_id.split(':').next() == Some(main_course))
            .map(|entry| entry.params)
    }
}
