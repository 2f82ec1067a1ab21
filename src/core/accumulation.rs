//! Approximate pre-retirement adjustments.
//!
//! The baseline's accumulation model is not re-run. A changed contribution rate is modelled as a
//! constant annual difference compounded over the baseline's years to retirement, and a shifted
//! retirement date is rolled forward or backward one year at a time with a constant contribution.

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetirementBalances {
    pub liquid: f64,
    pub non_spendable: f64,
    /// Set when reverse compounding hit the zero floor before all years were consumed.
    pub clamped: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct AccumulationAssumptions {
    pub base_annual_contribution: f64,
    pub contribution_percent: f64,
    pub years_to_retirement: u32,
    pub base_return_rate: f64,
    pub housing_return_rate: f64,
}

impl AccumulationAssumptions {
    pub fn adjusted_annual_contribution(&self) -> f64 {
        self.base_annual_contribution * self.contribution_percent / 100.0
    }
}

/// Value at retirement of contributing `contribution_diff` more (or less) every year.
pub fn compounded_contribution_difference(
    contribution_diff: f64,
    years: u32,
    annual_return: f64,
) -> f64 {
    (0..years).fold(0.0, |value, _| (value + contribution_diff) * (1.0 + annual_return))
}

pub fn contribution_adjusted_liquid(
    baseline_liquid: f64,
    assumptions: &AccumulationAssumptions,
) -> f64 {
    if assumptions.contribution_percent == 100.0 || assumptions.years_to_retirement == 0 {
        return baseline_liquid;
    }

    let contribution_diff =
        assumptions.adjusted_annual_contribution() - assumptions.base_annual_contribution;
    baseline_liquid
        + compounded_contribution_difference(
            contribution_diff,
            assumptions.years_to_retirement,
            assumptions.base_return_rate,
        )
}

/// Rolls balances at the baseline retirement date to the shifted one.
pub fn shift_retirement_date(
    liquid: f64,
    non_spendable: f64,
    retirement_age_offset: i32,
    assumptions: &AccumulationAssumptions,
) -> RetirementBalances {
    let contribution = assumptions.adjusted_annual_contribution();
    let liquid_growth = 1.0 + assumptions.base_return_rate;
    let housing_growth = 1.0 + assumptions.housing_return_rate;

    let mut balances = RetirementBalances {
        liquid,
        non_spendable,
        clamped: false,
    };

    if retirement_age_offset > 0 {
        for _ in 0..retirement_age_offset {
            balances.liquid = balances.liquid * liquid_growth + contribution;
            balances.non_spendable *= housing_growth;
        }
    } else if retirement_age_offset < 0 {
        for _ in 0..retirement_age_offset.unsigned_abs() {
            let liquid = reverse_compound(balances.liquid - contribution, liquid_growth);
            let non_spendable = reverse_compound(balances.non_spendable, housing_growth);
            if liquid < 0.0 || non_spendable < 0.0 {
                balances.clamped = true;
            }
            balances.liquid = liquid.max(0.0);
            balances.non_spendable = non_spendable.max(0.0);
        }
        if balances.clamped {
            warn!(
                retirement_age_offset,
                "reverse compounding clamped a balance at zero; earlier retirement is understated"
            );
        }
    }

    balances
}

fn reverse_compound(value: f64, growth: f64) -> f64 {
    if growth <= 0.0 {
        return 0.0;
    }
    value / growth
}
