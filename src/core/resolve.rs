use super::types::{AdjustmentSet, Plan, ProjectionContext, ScenarioOverrides};

/// Plan values after scenario overrides, before any slider math.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveInputs {
    pub pension_monthly: f64,
    pub social_security_monthly: f64,
    pub other_income_monthly: f64,
    pub inflation_rate: f64,
    /// Expenses are scaled later by `expenses_percent`, never overridden here.
    pub monthly_expenses: f64,
    pub retirement_age: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustedRates {
    /// Blended rate after the equity/cash split, before `return_rate_offset`.
    pub base_return_rate: f64,
    pub return_rate: f64,
    pub inflation_rate: f64,
}

pub fn resolve_inputs(
    plan: &Plan,
    overrides: &ScenarioOverrides,
    adjustments: &AdjustmentSet,
    context: &ProjectionContext,
) -> EffectiveInputs {
    EffectiveInputs {
        pension_monthly: overrides.pension_monthly.unwrap_or(plan.pension_monthly),
        social_security_monthly: overrides
            .social_security_monthly
            .unwrap_or(plan.social_security_monthly),
        other_income_monthly: overrides
            .other_income_monthly
            .unwrap_or(plan.other_income_monthly),
        inflation_rate: overrides.inflation_rate.unwrap_or(plan.inflation_rate),
        monthly_expenses: plan.monthly_expenses,
        retirement_age: context
            .retirement_age
            .saturating_add_signed(adjustments.retirement_age_offset),
    }
}

/// Recomputes the blended rate with the equity slider redistributing only the liquid share.
/// Housing keeps its own allocation and rate.
pub fn equity_split_return_rate(plan: &Plan, equity_percent: f64) -> f64 {
    let equity_share = equity_percent / 100.0;
    let cash_share = (100.0 - equity_percent) / 100.0;
    let liquid_share = 1.0 - plan.housing_allocation;

    plan.equity_return_rate * equity_share * liquid_share
        + plan.cash_return_rate * cash_share * liquid_share
        + plan.housing_return_rate * plan.housing_allocation
}

pub fn adjusted_rates(
    plan: &Plan,
    effective: &EffectiveInputs,
    adjustments: &AdjustmentSet,
    context: &ProjectionContext,
) -> AdjustedRates {
    let base_return_rate = match adjustments.equity_percent {
        Some(equity_percent) => equity_split_return_rate(plan, equity_percent),
        None => context.blended_return_rate,
    };

    AdjustedRates {
        base_return_rate,
        return_rate: base_return_rate + adjustments.return_rate_offset / 100.0,
        inflation_rate: effective.inflation_rate + adjustments.inflation_offset / 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_plan() -> Plan {
        Plan {
            monthly_expenses: 5_000.0,
            pension_monthly: 1_000.0,
            social_security_monthly: 500.0,
            other_income_monthly: 200.0,
            equity_return_rate: 0.08,
            cash_return_rate: 0.02,
            housing_return_rate: 0.03,
            equity_allocation: 0.6,
            cash_allocation: 0.2,
            housing_allocation: 0.2,
            inflation_rate: 0.025,
            life_expectancy: 90,
            ..Plan::default()
        }
    }

    fn sample_context() -> ProjectionContext {
        ProjectionContext {
            retirement_age: 65,
            life_expectancy: 90,
            plan_currency: "USD".to_string(),
            monthly_investment: 1_000.0,
            blended_return_rate: 0.06,
        }
    }

    #[test]
    fn absent_overrides_fall_through_to_plan() {
        let plan = sample_plan();
        let effective = resolve_inputs(
            &plan,
            &ScenarioOverrides::default(),
            &AdjustmentSet::default(),
            &sample_context(),
        );

        assert_approx(effective.pension_monthly, 1_000.0);
        assert_approx(effective.social_security_monthly, 500.0);
        assert_approx(effective.other_income_monthly, 200.0);
        assert_approx(effective.inflation_rate, 0.025);
        assert_approx(effective.monthly_expenses, 5_000.0);
        assert_eq!(effective.retirement_age, 65);
    }

    #[test]
    fn overrides_replace_plan_values_including_zero() {
        let plan = sample_plan();
        let overrides = ScenarioOverrides {
            pension_monthly: Some(1_800.0),
            social_security_monthly: None,
            other_income_monthly: Some(0.0),
            inflation_rate: Some(0.04),
        };
        let effective = resolve_inputs(
            &plan,
            &overrides,
            &AdjustmentSet::default(),
            &sample_context(),
        );

        assert_approx(effective.pension_monthly, 1_800.0);
        assert_approx(effective.social_security_monthly, 500.0);
        assert_approx(effective.other_income_monthly, 0.0);
        assert_approx(effective.inflation_rate, 0.04);
    }

    #[test]
    fn retirement_age_offset_shifts_both_directions() {
        let plan = sample_plan();
        let context = sample_context();
        for (offset, expected) in [(-5, 60), (0, 65), (2, 67), (10, 75)] {
            let adjustments = AdjustmentSet {
                retirement_age_offset: offset,
                ..AdjustmentSet::default()
            };
            let effective =
                resolve_inputs(&plan, &ScenarioOverrides::default(), &adjustments, &context);
            assert_eq!(effective.retirement_age, expected, "offset {offset}");
        }
    }

    #[test]
    fn default_rates_use_session_blended_rate() {
        let plan = sample_plan();
        let context = sample_context();
        let adjustments = AdjustmentSet::default();
        let effective =
            resolve_inputs(&plan, &ScenarioOverrides::default(), &adjustments, &context);
        let rates = adjusted_rates(&plan, &effective, &adjustments, &context);

        assert_approx(rates.base_return_rate, 0.06);
        assert_approx(rates.return_rate, 0.06);
        assert_approx(rates.inflation_rate, 0.025);
    }

    #[test]
    fn offsets_are_percentage_points() {
        let plan = sample_plan();
        let context = sample_context();
        let adjustments = AdjustmentSet {
            return_rate_offset: -2.0,
            inflation_offset: 1.5,
            ..AdjustmentSet::default()
        };
        let effective =
            resolve_inputs(&plan, &ScenarioOverrides::default(), &adjustments, &context);
        let rates = adjusted_rates(&plan, &effective, &adjustments, &context);

        assert_approx(rates.base_return_rate, 0.06);
        assert_approx(rates.return_rate, 0.04);
        assert_approx(rates.inflation_rate, 0.04);
    }

    #[test]
    fn equity_split_keeps_housing_contribution_fixed() {
        let plan = sample_plan();
        // 0.08*0.7*0.8 + 0.02*0.3*0.8 + 0.03*0.2 = 0.0448 + 0.0048 + 0.006
        assert_approx(equity_split_return_rate(&plan, 70.0), 0.0556);
        // All cash: only the cash rate on the liquid share plus housing.
        assert_approx(equity_split_return_rate(&plan, 0.0), 0.02 * 0.8 + 0.006);
        assert_approx(equity_split_return_rate(&plan, 100.0), 0.08 * 0.8 + 0.006);
    }

    #[test]
    fn equity_override_replaces_base_rate_and_offset_still_applies() {
        let plan = sample_plan();
        let context = sample_context();
        let adjustments = AdjustmentSet {
            equity_percent: Some(70.0),
            return_rate_offset: 1.0,
            ..AdjustmentSet::default()
        };
        let effective =
            resolve_inputs(&plan, &ScenarioOverrides::default(), &adjustments, &context);
        let rates = adjusted_rates(&plan, &effective, &adjustments, &context);

        assert_approx(rates.base_return_rate, 0.0556);
        assert_approx(rates.return_rate, 0.0656);
    }

    #[test]
    fn inflation_offset_builds_on_overridden_inflation() {
        let plan = sample_plan();
        let context = sample_context();
        let overrides = ScenarioOverrides {
            inflation_rate: Some(0.03),
            ..ScenarioOverrides::default()
        };
        let adjustments = AdjustmentSet {
            inflation_offset: -2.0,
            ..AdjustmentSet::default()
        };
        let effective = resolve_inputs(&plan, &overrides, &adjustments, &context);
        let rates = adjusted_rates(&plan, &effective, &adjustments, &context);

        assert_approx(rates.inflation_rate, 0.01);
    }
}
