//! Schedule evaluation.
//!
//! Scores a plan with the solver's own objective and computes the
//! summary counters the client displays. Pure: no state, no side effects.
//!
//! [`evaluate`] accepts a rendered [`Schedule`] (for example one read
//! back from storage), lowers it to a plan and scores that, so a stored
//! schedule always evaluates to the penalty the solver reported for it.

mod kpi;
mod penalty;

pub use kpi::ScheduleSummary;
pub use penalty::{penalty, score, PenaltyBreakdown};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EngineConfig;
use crate::instance::Instance;
use crate::models::{Schedule, Violation, WindowInput};
use crate::plan::{Plan, PlanError};
use crate::validation::ValidationError;

/// Full evaluation of one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub penalty: u64,
    /// Unweighted counts per category.
    pub breakdown: PenaltyBreakdown,
    /// Weighted contribution per category; sums to `penalty`.
    pub contributions: PenaltyBreakdown,
    pub summary: ScheduleSummary,
    /// Hard-constraint violations; empty for solver output.
    pub violations: Vec<Violation>,
}

/// `{"penalty": n}` response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResponse {
    pub penalty: u64,
}

impl Evaluation {
    pub fn to_response(&self) -> EvaluationResponse {
        EvaluationResponse {
            penalty: self.penalty,
        }
    }
}

/// Errors raised when evaluating a stored schedule.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("input is invalid ({} errors)", .0.len())]
    Invalid(Vec<ValidationError>),
    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Evaluates a plan against its instance.
pub fn evaluate_plan(instance: &Instance, plan: &Plan) -> Evaluation {
    let breakdown = score(instance, plan);
    let weights = &instance.penalty.weights;
    Evaluation {
        penalty: breakdown.total(weights),
        contributions: breakdown.weighted(weights),
        breakdown,
        summary: ScheduleSummary::calculate(instance, plan),
        violations: plan.violations(instance),
    }
}

/// Evaluates a rendered schedule against the input it was built from.
pub fn evaluate(
    input: &WindowInput,
    schedule: &Schedule,
    config: &EngineConfig,
) -> Result<Evaluation, EvaluationError> {
    let instance = Instance::compile(input, config).map_err(EvaluationError::Invalid)?;
    let plan = Plan::from_schedule(&instance, schedule)?;
    Ok(evaluate_plan(&instance, &plan))
}
