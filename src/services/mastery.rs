//! Mastery estimation.
//!
//! The selector only depends on [`MasteryEstimator`]; [`Bkt`] is the
//! two-state knowledge-tracing model used in production.

use crate::db::ModelParams;

pub trait MasteryEstimator: Send + Sync {
    /// Posterior probability, in [0, 1], that the skill is mastered after
    /// the given first-attempt trajectory.
    fn estimate(&self, trajectory: &[bool], params: &ModelParams) -> f64;
}

/// Bayesian knowledge tracing: condition on each observation (guess `pg`,
/// slip `ps`), then apply the learning transition `pt`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bkt;

impl Bkt {
    fn observe(p_mastered: f64, correct: bool, params: &ModelParams) -> f64 {
        let (if_mastered, if_not) = if correct {
            (p_mastered * (1.0 - params.ps), (1.0 - p_mastered) * params.pg)
        } else {
            (p_mastered * params.ps, (1.0 - p_mastered) * (1.0 - params.pg))
        };
        let evidence = if_mastered + if_not;
        // Impossible observation under the parameters: keep the prior.
        let posterior = if evidence > 0.0 { if_mastered / evidence } else { p_mastered };
        posterior + (1.0 - posterior) * params.pt
    }
}

impl MasteryEstimator for Bkt {
    fn estimate(&self, trajectory: &[bool], params: &ModelParams) -> f64 {
        trajectory
            .iter()
            .fold(params.pi, |p, &correct| Self::observe(p, correct, params))
            .clamp(0.0, 1.0)
    }
}
