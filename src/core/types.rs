use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIQUIDATION_THRESHOLD: f64 = 20.0;

/// Static household assumptions. Rates and allocations are fractions, amounts are monthly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Plan {
    pub monthly_expenses: f64,
    pub pension_monthly: f64,
    pub social_security_monthly: f64,
    /// Income tied to the illiquid asset (e.g. rent); stops once the property is sold.
    pub other_income_monthly: f64,
    pub equity_return_rate: f64,
    pub cash_return_rate: f64,
    pub housing_return_rate: f64,
    pub equity_allocation: f64,
    pub cash_allocation: f64,
    pub housing_allocation: f64,
    pub inflation_rate: f64,
    pub life_expectancy: u32,
    pub planning_horizon: Option<u32>,
    pub target_end_balance: Option<f64>,
}

/// Absolute replacements for plan fields. Never carries deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScenarioOverrides {
    pub pension_monthly: Option<f64>,
    pub social_security_monthly: Option<f64>,
    pub other_income_monthly: Option<f64>,
    pub inflation_rate: Option<f64>,
}

/// What-if sliders, all relative to the plan and baseline.
///
/// Percentages are whole percents (`100.0` means unchanged), offsets are percentage points
/// except `retirement_age_offset`, which is in years.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdjustmentSet {
    pub retirement_age_offset: i32,
    pub expenses_percent: f64,
    pub return_rate_offset: f64,
    pub inflation_offset: f64,
    pub contribution_percent: f64,
    pub equity_percent: Option<f64>,
    pub liquidation_threshold: f64,
}

impl Default for AdjustmentSet {
    fn default() -> Self {
        Self {
            retirement_age_offset: 0,
            expenses_percent: 100.0,
            return_rate_offset: 0.0,
            inflation_offset: 0.0,
            contribution_percent: 100.0,
            equity_percent: None,
            liquidation_threshold: DEFAULT_LIQUIDATION_THRESHOLD,
        }
    }
}

/// Session facts known alongside the baseline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectionContext {
    pub retirement_age: u32,
    pub life_expectancy: u32,
    pub plan_currency: String,
    pub monthly_investment: f64,
    pub blended_return_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreRetirementAccumulation {
    pub years_to_retirement: u32,
    pub starting_balance: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct YearlyRow {
    pub year: u32,
    pub age: u32,
    pub starting_balance: f64,
    pub investment: f64,
    pub income: f64,
    pub withdrawals: f64,
    pub ending_balance: f64,
    pub inflation_adjusted_expenses: f64,
    pub non_spendable_value: f64,
    pub total_wealth: f64,
    pub property_liquidated: bool,
}

/// A drawdown trajectory plus headline metrics.
///
/// The same shape serves as the cached baseline and as the adjusted result: adjusting copies
/// every field of the baseline and overwrites only the recomputed ones. Fields this crate does not
/// model (FI metrics and the like) ride along in `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Projection {
    pub liquid_assets: f64,
    pub non_spendable_at_retirement: f64,
    pub pre_retirement_accumulation: Option<PreRetirementAccumulation>,
    pub yearly_projections: Vec<YearlyRow>,
    pub runway_years: u32,
    pub runway_months: u32,
    pub depletion_age: Option<u32>,
    pub liquid_balance_at_liquidation: Option<f64>,
    pub liquidation_threshold_percent: Option<f64>,
    pub effective_retirement_age: Option<u32>,
    pub adjusted_return_rate: Option<f64>,
    pub adjusted_inflation_rate: Option<f64>,
    pub retirement_shift_clamped: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

pub type BaselineProjection = Projection;
pub type AdjustedProjection = Projection;

/// One row of a retirement-offset sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OffsetResult {
    pub retirement_age_offset: i32,
    pub retirement_age: u32,
    pub starting_balance: f64,
    pub runway_years: u32,
    pub depletion_age: Option<u32>,
    pub terminal_balance: f64,
    pub terminal_wealth: f64,
    pub liquidation_age: Option<u32>,
    pub sustainable: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResult {
    pub offsets: Vec<OffsetResult>,
    pub earliest_sustainable_index: Option<usize>,
}
