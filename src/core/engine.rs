use tracing::debug;

use super::accumulation::{
    AccumulationAssumptions, contribution_adjusted_liquid, shift_retirement_date,
};
use super::drawdown::{DrawdownParams, DrawdownState, simulate_drawdown};
use super::resolve::{adjusted_rates, resolve_inputs};
use super::types::{
    AdjustedProjection, AdjustmentSet, BaselineProjection, OffsetResult, Plan, ProjectionContext,
    ScenarioOverrides, SweepResult, YearlyRow,
};

pub const MIN_RETIREMENT_AGE_OFFSET: i32 = -5;
pub const MAX_RETIREMENT_AGE_OFFSET: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunwaySummary {
    pub runway_years: u32,
    pub runway_months: u32,
    pub depletion_age: Option<u32>,
}

/// Derives an adjusted projection from a cached baseline. Returns `None` when there is no
/// baseline yet.
pub fn adjust(
    baseline: Option<&BaselineProjection>,
    plan: &Plan,
    overrides: &ScenarioOverrides,
    adjustments: &AdjustmentSet,
    context: &ProjectionContext,
) -> Option<AdjustedProjection> {
    baseline.map(|baseline| adjust_projection(baseline, plan, overrides, adjustments, context))
}

pub fn adjust_projection(
    baseline: &BaselineProjection,
    plan: &Plan,
    overrides: &ScenarioOverrides,
    adjustments: &AdjustmentSet,
    context: &ProjectionContext,
) -> AdjustedProjection {
    let effective = resolve_inputs(plan, overrides, adjustments, context);
    let rates = adjusted_rates(plan, &effective, adjustments, context);

    let assumptions = AccumulationAssumptions {
        base_annual_contribution: context.monthly_investment * 12.0,
        contribution_percent: adjustments.contribution_percent,
        years_to_retirement: baseline
            .pre_retirement_accumulation
            .map(|acc| acc.years_to_retirement)
            .unwrap_or(0),
        base_return_rate: rates.base_return_rate,
        housing_return_rate: plan.housing_return_rate,
    };
    let liquid = contribution_adjusted_liquid(baseline.liquid_assets, &assumptions);
    // The age floors at zero, so roll balances back only as far as the age actually moved.
    let applied_offset = effective.retirement_age as i32 - context.retirement_age as i32;
    let at_retirement = shift_retirement_date(
        liquid,
        baseline.non_spendable_at_retirement,
        applied_offset,
        &assumptions,
    );

    let params = DrawdownParams {
        retirement_age: effective.retirement_age,
        initial_liquid_assets: at_retirement.liquid,
        liquidation_threshold: adjustments.liquidation_threshold / 100.0,
        return_rate: rates.return_rate,
        housing_return_rate: plan.housing_return_rate,
        inflation_rate: rates.inflation_rate,
        guaranteed_income_monthly: effective.pension_monthly + effective.social_security_monthly,
        other_income_monthly: effective.other_income_monthly,
    };
    let annual_expenses = effective.monthly_expenses * adjustments.expenses_percent / 100.0 * 12.0;
    let initial = DrawdownState::new(
        at_retirement.liquid,
        at_retirement.non_spendable,
        annual_expenses,
    );

    let year_count = years_in_retirement(plan, context, effective.retirement_age);
    let (rows, final_state) = simulate_drawdown(initial, &params, year_count);
    let runway = summarize_runway(&rows, effective.retirement_age);

    debug!(
        retirement_age = effective.retirement_age,
        starting_balance = at_retirement.liquid,
        return_rate = rates.return_rate,
        runway_years = runway.runway_years,
        depletion_age = ?runway.depletion_age,
        "recomputed adjusted projection"
    );

    AdjustedProjection {
        yearly_projections: rows,
        runway_years: runway.runway_years,
        runway_months: runway.runway_months,
        depletion_age: runway.depletion_age,
        liquid_balance_at_liquidation: final_state.liquidation.balance_at_event(),
        liquidation_threshold_percent: Some(adjustments.liquidation_threshold),
        effective_retirement_age: Some(effective.retirement_age),
        adjusted_return_rate: Some(rates.return_rate),
        adjusted_inflation_rate: Some(rates.inflation_rate),
        retirement_shift_clamped: at_retirement.clamped,
        ..baseline.clone()
    }
}

/// Simulated years from retirement through life expectancy, both ends inclusive. The session's
/// life expectancy wins; the plan's is used when the context leaves it at zero.
fn years_in_retirement(plan: &Plan, context: &ProjectionContext, retirement_age: u32) -> u32 {
    let life_expectancy = match context.life_expectancy {
        0 => plan.life_expectancy,
        age => age,
    };
    if life_expectancy < retirement_age {
        return 0;
    }
    life_expectancy - retirement_age + 1
}

pub fn summarize_runway(rows: &[YearlyRow], retirement_age: u32) -> RunwaySummary {
    let depletion_year = rows.iter().position(|row| row.ending_balance <= 0.0);
    let runway_years = match depletion_year {
        Some(idx) => idx as u32 + 1,
        None => rows.len() as u32,
    };

    RunwaySummary {
        runway_years,
        runway_months: runway_years * 12,
        depletion_age: depletion_year.map(|idx| retirement_age + idx as u32 + 1),
    }
}

/// Whether a projection never depletes and ends at or above the plan's target balance.
pub fn is_sustainable(projection: &AdjustedProjection, plan: &Plan) -> bool {
    let target = plan.target_end_balance.unwrap_or(0.0);
    let terminal = projection
        .yearly_projections
        .last()
        .map(|row| row.ending_balance)
        .unwrap_or(projection.liquid_assets);
    projection.depletion_age.is_none() && terminal >= target
}

/// Evaluates every retirement-age offset in the slider range with the other sliders held.
pub fn sweep_retirement_offsets(
    baseline: &BaselineProjection,
    plan: &Plan,
    overrides: &ScenarioOverrides,
    adjustments: &AdjustmentSet,
    context: &ProjectionContext,
) -> SweepResult {
    let offsets = (MIN_RETIREMENT_AGE_OFFSET..=MAX_RETIREMENT_AGE_OFFSET)
        .map(|offset| {
            let candidate = AdjustmentSet {
                retirement_age_offset: offset,
                ..*adjustments
            };
            let projection = adjust_projection(baseline, plan, overrides, &candidate, context);
            offset_result(offset, &projection, plan)
        })
        .collect::<Vec<_>>();

    let earliest_sustainable_index = offsets.iter().position(|r| r.sustainable);

    SweepResult {
        offsets,
        earliest_sustainable_index,
    }
}

fn offset_result(offset: i32, projection: &AdjustedProjection, plan: &Plan) -> OffsetResult {
    let rows = &projection.yearly_projections;
    let first = rows.first();
    let last = rows.last();

    OffsetResult {
        retirement_age_offset: offset,
        retirement_age: projection.effective_retirement_age.unwrap_or_default(),
        starting_balance: first.map(|r| r.starting_balance).unwrap_or(0.0),
        runway_years: projection.runway_years,
        depletion_age: projection.depletion_age,
        terminal_balance: last.map(|r| r.ending_balance).unwrap_or(0.0),
        terminal_wealth: last.map(|r| r.total_wealth).unwrap_or(0.0),
        liquidation_age: rows.iter().find(|r| r.property_liquidated).map(|r| r.age),
        sustainable: is_sustainable(projection, plan),
    }
}
