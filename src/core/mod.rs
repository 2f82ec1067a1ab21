mod accumulation;
mod drawdown;
mod engine;
mod resolve;
mod solver;
mod types;

pub use accumulation::{
    AccumulationAssumptions, RetirementBalances, compounded_contribution_difference,
    contribution_adjusted_liquid, shift_retirement_date,
};
pub use drawdown::{
    DrawdownParams, DrawdownState, LiquidationState, advance_year, simulate_drawdown,
};
pub use engine::{
    MAX_RETIREMENT_AGE_OFFSET, MIN_RETIREMENT_AGE_OFFSET, RunwaySummary, adjust,
    adjust_projection, is_sustainable, summarize_runway, sweep_retirement_offsets,
};
pub use resolve::{
    AdjustedRates, EffectiveInputs, adjusted_rates, equity_split_return_rate, resolve_inputs,
};
pub use solver::{
    GoalSolveConfig, GoalSolveIteration, GoalSolveResult, GoalType, SolveError, SolveInputs,
    solve_goal,
};
pub use types::{
    AdjustedProjection, AdjustmentSet, BaselineProjection, DEFAULT_LIQUIDATION_THRESHOLD,
    OffsetResult, Plan, PreRetirementAccumulation, Projection, ProjectionContext,
    ScenarioOverrides, SweepResult, YearlyRow,
};
