//! Property-based tests for problem selection and the interaction log.
//!
//! Covers:
//! - Pretest priority: no practice or posttest item while a pretest item is open
//! - Response dedup: one stored response per (learner, problem, attempt)
//! - Selection stays inside the eligible candidate set
//! - Mastery estimates stay within [0, 1]

use proptest::prelude::*;

use adaptive_practice::db::{ModelParams, NextProblem, ProblemCategory};
use adaptive_practice::services::mastery::{Bkt, MasteryEstimator};
use adaptive_practice::services::selector::Phase;
use adaptive_practice::services::tutor::ResponseInput;

mod common;

use common::{at, Harness, COURSE};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_probability() -> impl Strategy<Value = f64> {
    (0u64..=1000u64).prop_map(|v| v as f64 / 1000.0)
}

fn arb_params() -> impl Strategy<Value = ModelParams> {
    (arb_probability(), arb_probability(), arb_probability(), arb_probability(), arb_probability()).prop_map(
        |(pi, pt, pg, ps, threshold)| ModelParams {
            pi,
            pt,
            pg,
            ps,
            threshold,
        },
    )
}

/// Which of the 14 pretest items get answered (never all of them) and with
/// what correctness.
fn arb_partial_pretest() -> impl Strategy<Value = Vec<(usize, bool)>> {
    proptest::collection::btree_map(0usize..14, any::<bool>(), 0..14)
        .prop_map(|answers| answers.into_iter().collect())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn open_pretest_blocks_other_categories(
        seed in any::<u64>(),
        pretest in arb_partial_pretest(),
        practice in proptest::collection::vec(any::<bool>(), 0..4),
    ) {
        let mut harness = Harness::with_scenario_course(seed);
        harness.tutor.enroll(COURSE, "alice").unwrap();
        for (index, correct) in &pretest {
            harness.answer("alice", &format!("Pre_assessment_{index}"), *correct);
        }
        for (problem, correct) in ["b1", "b3", "Post_assessment_0", "b4"].iter().zip(&practice) {
            harness.answer("alice", problem, *correct);
        }

        let selector = harness.tutor.selector();
        prop_assert_eq!(selector.phase(COURSE, "alice").unwrap(), Phase::Pretest);
        for _ in 0..5 {
            match selector.choose_next(COURSE, "alice").unwrap() {
                NextProblem::Problem(problem) => prop_assert_eq!(problem.category, ProblemCategory::Pretest),
                other => prop_assert!(false, "unexpected decision {:?}", other),
            }
        }
    }

    #[test]
    fn repeated_response_is_stored_once(
        attempt in 1u32..5,
        repeats in 1usize..6,
        correct in any::<bool>(),
    ) {
        let harness = Harness::with_scenario_course(1);
        harness.tutor.enroll(COURSE, "alice").unwrap();

        let mut stored = 0;
        for i in 0..repeats {
            let receipt = harness
                .tutor
                .record_response(
                    COURSE,
                    "alice",
                    ResponseInput {
                        problem: "b3".into(),
                        correct,
                        attempt,
                        timestamp: at(i as i64),
                    },
                )
                .unwrap();
            if receipt.record.stored {
                stored += 1;
            }
        }

        prop_assert_eq!(stored, 1);
        let history = harness.tutor.log().history(COURSE, "alice").unwrap();
        prop_assert_eq!(history.responses_to("b3").count(), 1);
    }

    #[test]
    fn choice_is_member_of_candidates(seed in any::<u64>(), answered in 0usize..14) {
        let mut harness = Harness::with_scenario_course(seed);
        harness.tutor.enroll(COURSE, "alice").unwrap();
        for index in 0..answered {
            harness.answer("alice", &format!("Pre_assessment_{index}"), index % 2 == 0);
        }

        let course = harness.tutor.catalog().course(COURSE).unwrap();
        let history = harness.tutor.log().history(COURSE, "alice").unwrap();
        let selector = harness.tutor.selector();
        let candidates = selector.candidates(&course, &history, "alice").unwrap();
        for _ in 0..5 {
            let next = selector.choose_next(COURSE, "alice").unwrap();
            let name = next.problem().map(|p| p.name.clone()).unwrap();
            prop_assert!(candidates.problems.iter().any(|p| p.name == name));
        }
    }

    #[test]
    fn estimate_is_probability(
        params in arb_params(),
        trajectory in proptest::collection::vec(any::<bool>(), 0..30),
    ) {
        let estimate = Bkt.estimate(&trajectory, &params);
        prop_assert!((0.0..=1.0).contains(&estimate), "estimate {} out of range", estimate);
    }
}
