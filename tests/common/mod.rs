#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, TimeZone, Utc};

use adaptive_practice::config::Config;
use adaptive_practice::db::{MemoryStore, ModelParams, NextProblem, ParameterKey, ProblemCategory, Storage};
use adaptive_practice::services::completion::CompletionPolicy;
use adaptive_practice::services::mastery::Bkt;
use adaptive_practice::services::parameters::ParameterScope;
use adaptive_practice::services::random::SeededRandom;
use adaptive_practice::services::selector::SelectionConfig;
use adaptive_practice::services::tutor::{ResponseInput, TutorParts, TutorService};
use adaptive_practice::state::AppState;

pub const COURSE: &str = "stats101";

pub const DEFAULT_PARAMS: ModelParams = ModelParams {
    pi: 0.1,
    pt: 0.5,
    pg: 0.25,
    ps: 0.25,
    threshold: 0.99,
};

pub const SKILLS: [&str; 9] = [
    "center", "shape", "spread", "x_axis", "y_axis", "h_to_d", "d_to_h", "histogram", "None",
];

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn parts(seed: u64) -> TutorParts {
    TutorParts {
        selection: SelectionConfig::default(),
        completion: CompletionPolicy::default(),
        parameters: ParameterScope::default(),
        estimator: Arc::new(Bkt),
        random: Arc::new(SeededRandom::new(seed)),
    }
}

pub struct Harness {
    pub store: Arc<dyn Storage>,
    pub tutor: TutorService,
    clock: i64,
}

impl Harness {
    pub fn new(seed: u64) -> Self {
        let store: Arc<dyn Storage> = Arc::new(MemoryStore::new());
        let tutor = TutorService::new(Arc::clone(&store), parts(seed));
        Self { store, tutor, clock: 0 }
    }

    /// Scenario course: 14 pretest items, practice item `b3` on `center`,
    /// practice item `b5` on `shape`, filler practice on the sentinel skill
    /// and three posttest items. Pretest items 0..=3 cover `shape`, item 4
    /// covers `center`, the rest spread over the remaining skills.
    pub fn with_scenario_course(seed: u64) -> Self {
        let harness = Self::new(seed);
        let catalog = harness.tutor.catalog();
        catalog.create_course(COURSE).unwrap();
        for skill in SKILLS {
            catalog.register_skill(COURSE, skill).unwrap();
        }
        let others = ["spread", "x_axis", "y_axis", "h_to_d", "d_to_h", "histogram"];
        for i in 0..14 {
            let skill = match i {
                0..=3 => "shape",
                4 => "center",
                n => others[(n - 5) % others.len()],
            };
            catalog
                .register_problem(
                    COURSE,
                    &format!("Pre_assessment_{i}"),
                    &format!("https://tutor.example/pre/{i}"),
                    vec![skill.to_string()],
                    ProblemCategory::Pretest,
                )
                .unwrap();
        }
        catalog
            .register_problem(COURSE, "b3", "https://tutor.example/b3", vec!["center".into()], ProblemCategory::Normal)
            .unwrap();
        catalog
            .register_problem(COURSE, "b5", "https://tutor.example/b5", vec!["shape".into()], ProblemCategory::Normal)
            .unwrap();
        for name in ["b1", "b2", "b4"] {
            catalog
                .register_problem(
                    COURSE,
                    name,
                    &format!("https://tutor.example/{name}"),
                    vec!["None".into()],
                    ProblemCategory::Normal,
                )
                .unwrap();
        }
        for i in 0..3 {
            catalog
                .register_problem(
                    COURSE,
                    &format!("Post_assessment_{i}"),
                    &format!("https://tutor.example/post/{i}"),
                    vec!["center".into()],
                    ProblemCategory::Posttest,
                )
                .unwrap();
        }
        harness.store.set_params(ParameterKey::course(COURSE), DEFAULT_PARAMS);
        harness
    }

    pub fn answer(&mut self, learner: &str, problem: &str, correct: bool) {
        self.answer_attempt(learner, problem, correct, 1);
    }

    pub fn answer_attempt(&mut self, learner: &str, problem: &str, correct: bool, attempt: u32) {
        self.clock += 10;
        self.tutor
            .record_response(
                COURSE,
                learner,
                ResponseInput {
                    problem: problem.to_string(),
                    correct,
                    attempt,
                    timestamp: at(self.clock),
                },
            )
            .unwrap();
    }

    pub fn next(&self, learner: &str) -> Option<NextProblem> {
        self.tutor.progress().get_next(COURSE, learner).unwrap()
    }

    pub fn next_name(&self, learner: &str) -> Option<String> {
        self.next(learner)
            .and_then(|next| next.problem().map(|p| p.name.clone()))
    }

    /// Answers whatever `next` holds until it is no longer a pretest item.
    /// Returns how many pretest items were answered.
    pub fn run_pretest(&mut self, learner: &str, correct: impl Fn(&str) -> bool) -> usize {
        let mut answered = 0;
        while let Some(name) = self.next_name(learner) {
            if !name.starts_with("Pre_assessment_") {
                break;
            }
            let is_correct = correct(&name);
            self.answer(learner, &name, is_correct);
            answered += 1;
        }
        answered
    }
}

pub fn create_test_app() -> Router {
    let config = Config {
        random_seed: Some(7),
        ..Config::default()
    };
    adaptive_practice::create_app(&config)
}

pub fn app_with_state(state: AppState) -> Router {
    adaptive_practice::app_with_state(state)
}
