use serde::Serialize;
use thiserror::Error;

use super::engine::{adjust_projection, is_sustainable};
use super::types::{AdjustmentSet, BaselineProjection, Plan, ProjectionContext, ScenarioOverrides};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GoalType {
    /// Lowest `contribution_percent` that keeps the projection sustainable.
    RequiredContribution,
    /// Highest `expenses_percent` that keeps the projection sustainable.
    MaxExpenses,
}

#[derive(Debug, Clone, Copy)]
pub struct GoalSolveConfig {
    pub goal_type: GoalType,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl GoalSolveConfig {
    pub fn for_goal(goal_type: GoalType) -> Self {
        let (search_min, search_max) = match goal_type {
            GoalType::RequiredContribution => (0.0, 200.0),
            GoalType::MaxExpenses => (50.0, 150.0),
        };
        Self {
            goal_type,
            search_min,
            search_max,
            tolerance: 0.1,
            max_iterations: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub sustainable: bool,
    pub runway_years: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveResult {
    pub goal_type: GoalType,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub solved_value: Option<f64>,
    pub achieved_runway_years: Option<u32>,
    pub achieved_terminal_balance: Option<f64>,
    pub iterations: Vec<GoalSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum SolveError {
    #[error("search bounds must be finite")]
    NonFiniteBounds,
    #[error("search_max must be greater than search_min")]
    EmptySearchRange,
    #[error("tolerance must be > 0")]
    InvalidTolerance,
    #[error("max_iterations must be > 0")]
    NoIterations,
}

/// Inputs shared by every candidate the solver evaluates.
#[derive(Debug, Clone, Copy)]
pub struct SolveInputs<'a> {
    pub baseline: &'a BaselineProjection,
    pub plan: &'a Plan,
    pub overrides: &'a ScenarioOverrides,
    pub adjustments: &'a AdjustmentSet,
    pub context: &'a ProjectionContext,
}

#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    sustainable: bool,
    runway_years: u32,
    terminal_balance: f64,
}

pub fn solve_goal(
    inputs: SolveInputs<'_>,
    config: GoalSolveConfig,
) -> Result<GoalSolveResult, SolveError> {
    validate_config(config)?;

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let low_eval = evaluate_candidate(inputs, config.goal_type, config.search_min);
    let high_eval = evaluate_candidate(inputs, config.goal_type, config.search_max);

    let mut solved_value = None;
    let mut converged = false;
    let feasible;
    let message;

    // Contribution helps sustainability; expenses hurt it. Both are monotone in the candidate.
    let (easy_eval, hard_eval) = match config.goal_type {
        GoalType::RequiredContribution => (high_eval, low_eval),
        GoalType::MaxExpenses => (low_eval, high_eval),
    };

    if !easy_eval.sustainable {
        feasible = false;
        message = "No sustainable value found within the search bounds.".to_string();
    } else if hard_eval.sustainable {
        converged = true;
        feasible = true;
        solved_value = Some(match config.goal_type {
            GoalType::RequiredContribution => config.search_min,
            GoalType::MaxExpenses => config.search_max,
        });
        message = match config.goal_type {
            GoalType::RequiredContribution => {
                "Already sustainable at the lower contribution bound.".to_string()
            }
            GoalType::MaxExpenses => {
                "Upper expense bound is still sustainable; increase search max for a higher level."
                    .to_string()
            }
        };
    } else {
        // `good` always holds a sustainable value, `bad` an unsustainable one.
        let (mut good, mut bad) = match config.goal_type {
            GoalType::RequiredContribution => (config.search_max, config.search_min),
            GoalType::MaxExpenses => (config.search_min, config.search_max),
        };
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (good + bad) * 0.5;
            let eval = evaluate_candidate(inputs, config.goal_type, mid);
            iterations.push(GoalSolveIteration {
                iteration: it,
                lower_bound: good.min(bad),
                upper_bound: good.max(bad),
                candidate_value: mid,
                sustainable: eval.sustainable,
                runway_years: eval.runway_years,
            });

            if eval.sustainable {
                good = mid;
            } else {
                bad = mid;
            }

            if (good - bad).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        solved_value = Some(good);
        feasible = true;
        message = if converged {
            match config.goal_type {
                GoalType::RequiredContribution => "Solved required contribution.".to_string(),
                GoalType::MaxExpenses => "Solved maximum sustainable expenses.".to_string(),
            }
        } else {
            "Reached max iterations before tolerance was met; returning best estimate.".to_string()
        };
    }

    let achieved = solved_value.map(|value| evaluate_candidate(inputs, config.goal_type, value));

    Ok(GoalSolveResult {
        goal_type: config.goal_type,
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        solved_value,
        achieved_runway_years: achieved.map(|eval| eval.runway_years),
        achieved_terminal_balance: achieved.map(|eval| eval.terminal_balance),
        iterations,
        converged,
        feasible,
        message,
    })
}

fn evaluate_candidate(
    inputs: SolveInputs<'_>,
    goal_type: GoalType,
    candidate_value: f64,
) -> CandidateEval {
    let mut adjustments = *inputs.adjustments;
    match goal_type {
        GoalType::RequiredContribution => {
            adjustments.contribution_percent = candidate_value.max(0.0);
        }
        GoalType::MaxExpenses => adjustments.expenses_percent = candidate_value.max(0.0),
    }

    let projection = adjust_projection(
        inputs.baseline,
        inputs.plan,
        inputs.overrides,
        &adjustments,
        inputs.context,
    );
    CandidateEval {
        sustainable: is_sustainable(&projection, inputs.plan),
        runway_years: projection.runway_years,
        terminal_balance: projection
            .yearly_projections
            .last()
            .map(|row| row.ending_balance)
            .unwrap_or(0.0),
    }
}

fn validate_config(config: GoalSolveConfig) -> Result<(), SolveError> {
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err(SolveError::NonFiniteBounds);
    }
    if config.search_max <= config.search_min {
        return Err(SolveError::EmptySearchRange);
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(SolveError::InvalidTolerance);
    }
    if config.max_iterations == 0 {
        return Err(SolveError::NoIterations);
    }
    Ok(())
}
