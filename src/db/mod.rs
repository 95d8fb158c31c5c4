//! Storage collaborator.
//!
//! The tutor core never talks to a concrete database: every service receives
//! an `Arc<dyn Storage>`. Each trait call is atomic with respect to every
//! other call on the same store, which is what the per-learner mutation
//! guarantees are built on.

pub mod memory;
pub mod models;

pub use memory::MemoryStore;
pub use models::*;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("no such skill(s): {0:?}")]
    UnknownSkill(Vec<String>),
    #[error("constraint violated: {0}")]
    Constraint(String),
}

pub type DataResult<T> = Result<T, DataError>;

pub trait Storage: Send + Sync {
    // ---- courses ----
    fn create_course(&self, course_id: &str) -> DataResult<()>;
    fn course_ids(&self) -> Vec<String>;
    fn course(&self, course_id: &str) -> DataResult<Course>;
    fn append_skill(&self, course_id: &str, skill: &str) -> DataResult<()>;
    /// Rejects a duplicate problem name and any skill not yet registered.
    fn append_problem(&self, course_id: &str, problem: Problem) -> DataResult<()>;
    fn append_experiment(&self, course_id: &str, experiment: Experiment) -> DataResult<()>;
    fn remove_experiment(&self, course_id: &str, name: &str) -> DataResult<()>;
    /// Replaces the default parameter pool, or extends it skipping members
    /// already present.
    fn store_model_params(
        &self,
        course_id: &str,
        params: Vec<ModelParams>,
        replace: bool,
    ) -> DataResult<()>;

    // ---- interaction log ----
    /// Returns `false` when a RESPONSE with the same (learner, problem,
    /// attempt) already exists; nothing is written in that case.
    fn append_interaction(&self, course_id: &str, interaction: Interaction) -> DataResult<bool>;
    fn interactions(&self, course_id: &str, learner_id: &str) -> DataResult<Vec<Interaction>>;

    // ---- progress ----
    fn insert_progress(&self, course_id: &str, progress: LearnerProgress) -> DataResult<()>;
    fn progress(&self, course_id: &str, learner_id: &str) -> DataResult<LearnerProgress>;
    /// Read-modify-write of one progress record under the store's lock.
    fn update_progress(
        &self,
        course_id: &str,
        learner_id: &str,
        update: &mut dyn FnMut(&mut LearnerProgress) -> DataResult<()>,
    ) -> DataResult<LearnerProgress>;

    // ---- membership ----
    fn enroll(&self, course_id: &str, learner_id: &str) -> DataResult<()>;
    /// Moves the learner from in_progress to finished. Returns whether a
    /// move happened.
    fn mark_finished(&self, course_id: &str, learner_id: &str) -> DataResult<bool>;
    fn membership(&self, course_id: &str) -> DataResult<Membership>;

    // ---- generic parameter collection ----
    fn get_params(&self, key: &ParameterKey) -> Option<ModelParams>;
    fn set_params(&self, key: ParameterKey, params: ModelParams);
    fn all_params(&self) -> Vec<ParameterEntry>;
    fn params_for_learner(&self, learner_id: &str) -> Vec<ParameterEntry>;
}
