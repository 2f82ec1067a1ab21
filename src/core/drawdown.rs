use super::types::YearlyRow;

/// One-way property sale latch. Once `Liquidated`, there is no transition back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiquidationState {
    Pending,
    Liquidated { age: u32, balance_at_event: f64 },
}

impl LiquidationState {
    pub fn is_liquidated(self) -> bool {
        matches!(self, LiquidationState::Liquidated { .. })
    }

    pub fn liquidation_age(self) -> Option<u32> {
        match self {
            LiquidationState::Pending => None,
            LiquidationState::Liquidated { age, .. } => Some(age),
        }
    }

    pub fn balance_at_event(self) -> Option<f64> {
        match self {
            LiquidationState::Pending => None,
            LiquidationState::Liquidated {
                balance_at_event, ..
            } => Some(balance_at_event),
        }
    }
}

/// Fixed inputs for every year of the drawdown.
#[derive(Debug, Clone, Copy)]
pub struct DrawdownParams {
    pub retirement_age: u32,
    pub initial_liquid_assets: f64,
    /// Fraction of `initial_liquid_assets`; `0.2` means sell below 20%.
    pub liquidation_threshold: f64,
    pub return_rate: f64,
    pub housing_return_rate: f64,
    pub inflation_rate: f64,
    pub guaranteed_income_monthly: f64,
    pub other_income_monthly: f64,
}

impl DrawdownParams {
    fn liquidation_floor(&self) -> f64 {
        self.initial_liquid_assets * self.liquidation_threshold
    }

    fn annual_income(&self, liquidation: LiquidationState) -> f64 {
        let other = if liquidation.is_liquidated() {
            0.0
        } else {
            self.other_income_monthly
        };
        (self.guaranteed_income_monthly + other) * 12.0
    }
}

/// State carried from one simulated year to the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawdownState {
    pub balance: f64,
    pub non_spendable: f64,
    pub annual_expenses: f64,
    pub liquidation: LiquidationState,
}

impl DrawdownState {
    pub fn new(balance: f64, non_spendable: f64, annual_expenses: f64) -> Self {
        Self {
            balance,
            non_spendable,
            annual_expenses,
            liquidation: LiquidationState::Pending,
        }
    }
}

/// Advances one year of retirement. `year_index` is zero-based from the retirement year.
pub fn advance_year(
    state: DrawdownState,
    params: &DrawdownParams,
    year_index: u32,
) -> (DrawdownState, YearlyRow) {
    let age = params.retirement_age + year_index;
    let mut next = state;

    let floor = params.liquidation_floor();
    if !next.liquidation.is_liquidated()
        && next.non_spendable > 0.0
        && next.balance > 0.0
        && next.balance < floor
    {
        next.liquidation = LiquidationState::Liquidated {
            age,
            balance_at_event: next.balance,
        };
        next.balance += next.non_spendable;
        next.non_spendable = 0.0;
    }

    let starting_balance = next.balance.max(0.0);
    let investment = starting_balance * params.return_rate;
    let income = params.annual_income(next.liquidation);
    let withdrawals = if next.balance > 0.0 {
        (next.annual_expenses - income).max(0.0)
    } else {
        0.0
    };
    let expenses_this_year = next.annual_expenses;

    next.balance = next.balance + investment - withdrawals;
    if !next.liquidation.is_liquidated() {
        next.non_spendable *= 1.0 + params.housing_return_rate;
    }
    next.annual_expenses *= 1.0 + params.inflation_rate;

    let ending_balance = next.balance.max(0.0);
    let non_spendable_value = next.non_spendable.max(0.0);
    let row = YearlyRow {
        year: year_index + 1,
        age,
        starting_balance,
        investment,
        income,
        withdrawals,
        ending_balance,
        inflation_adjusted_expenses: expenses_this_year,
        non_spendable_value,
        total_wealth: ending_balance + non_spendable_value,
        property_liquidated: next.liquidation.liquidation_age() == Some(age),
    };

    (next, row)
}

/// Runs `year_count` years from `initial`, returning the rows and the final state.
pub fn simulate_drawdown(
    initial: DrawdownState,
    params: &DrawdownParams,
    year_count: u32,
) -> (Vec<YearlyRow>, DrawdownState) {
    (0..year_count).fold(
        (Vec::with_capacity(year_count as usize), initial),
        |(mut rows, state), year_index| {
            let (next, row) = advance_year(state, params, year_index);
            rows.push(row);
            (rows, next)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_params() -> DrawdownParams {
        DrawdownParams {
            retirement_age: 65,
            initial_liquid_assets: 500_000.0,
            liquidation_threshold: 0.2,
            return_rate: 0.06,
            housing_return_rate: 0.03,
            inflation_rate: 0.0,
            guaranteed_income_monthly: 1_500.0,
            other_income_monthly: 200.0,
        }
    }

    #[test]
    fn first_year_matches_hand_calculation() {
        let params = sample_params();
        let state = DrawdownState::new(500_000.0, 200_000.0, 60_000.0);
        let (next, row) = advance_year(state, &params, 0);

        assert_eq!(row.year, 1);
        assert_eq!(row.age, 65);
        assert_approx(row.starting_balance, 500_000.0);
        assert_approx(row.investment, 30_000.0);
        assert_approx(row.income, 20_400.0);
        assert_approx(row.withdrawals, 39_600.0);
        assert_approx(row.ending_balance, 490_400.0);
        assert_approx(row.inflation_adjusted_expenses, 60_000.0);
        assert_approx(row.non_spendable_value, 206_000.0);
        assert_approx(row.total_wealth, 696_400.0);
        assert!(!row.property_liquidated);
        assert_eq!(next.liquidation, LiquidationState::Pending);
    }

    #[test]
    fn expenses_inflate_for_the_following_year() {
        let mut params = sample_params();
        params.inflation_rate = 0.03;
        let state = DrawdownState::new(500_000.0, 0.0, 60_000.0);
        let (rows, last) = simulate_drawdown(state, &params, 3);

        assert_approx(rows[0].inflation_adjusted_expenses, 60_000.0);
        assert_approx(rows[1].inflation_adjusted_expenses, 61_800.0);
        assert_approx(rows[2].inflation_adjusted_expenses, 63_654.0);
        assert_approx(last.annual_expenses, 65_563.62);
    }

    #[test]
    fn liquidation_fires_below_floor_and_latches() {
        let params = sample_params();
        // Floor is 100_000; start just below it.
        let state = DrawdownState::new(90_000.0, 150_000.0, 60_000.0);
        let (next, row) = advance_year(state, &params, 0);

        assert!(row.property_liquidated);
        assert_approx(row.starting_balance, 240_000.0);
        assert_approx(row.non_spendable_value, 0.0);
        assert_approx(row.income, 18_000.0);
        assert_eq!(
            next.liquidation,
            LiquidationState::Liquidated {
                age: 65,
                balance_at_event: 90_000.0
            }
        );

        let (after, second) = advance_year(next, &params, 1);
        assert!(!second.property_liquidated);
        assert_approx(second.non_spendable_value, 0.0);
        assert_approx(second.income, 18_000.0);
        assert_eq!(after.liquidation, next.liquidation);
    }

    #[test]
    fn liquidation_requires_property_and_positive_balance() {
        let params = sample_params();

        let no_property = DrawdownState::new(50_000.0, 0.0, 60_000.0);
        let (next, row) = advance_year(no_property, &params, 0);
        assert!(!row.property_liquidated);
        assert_eq!(next.liquidation, LiquidationState::Pending);

        let depleted = DrawdownState::new(-10.0, 100_000.0, 60_000.0);
        let (next, row) = advance_year(depleted, &params, 0);
        assert!(!row.property_liquidated);
        assert_eq!(next.liquidation, LiquidationState::Pending);
    }

    #[test]
    fn zero_threshold_or_zero_initial_never_liquidates() {
        let mut params = sample_params();
        params.liquidation_threshold = 0.0;
        let state = DrawdownState::new(1.0, 100_000.0, 60_000.0);
        let (next, _) = advance_year(state, &params, 0);
        assert_eq!(next.liquidation, LiquidationState::Pending);

        let mut params = sample_params();
        params.initial_liquid_assets = 0.0;
        let (next, _) = advance_year(state, &params, 0);
        assert_eq!(next.liquidation, LiquidationState::Pending);
    }

    #[test]
    fn no_withdrawal_once_balance_is_exhausted() {
        let params = sample_params();
        let state = DrawdownState::new(10_000.0, 0.0, 60_000.0);
        let (rows, last) = simulate_drawdown(state, &params, 3);

        assert!(last.balance < 0.0);
        assert_approx(rows[0].ending_balance, 0.0);
        assert_approx(rows[1].withdrawals, 0.0);
        assert_approx(rows[1].investment, 0.0);
        assert_approx(rows[2].starting_balance, 0.0);
    }

    #[test]
    fn income_above_expenses_withdraws_nothing() {
        let mut params = sample_params();
        params.guaranteed_income_monthly = 6_000.0;
        let state = DrawdownState::new(100_000.0, 0.0, 60_000.0);
        let (_, row) = advance_year(state, &params, 0);
        assert_approx(row.withdrawals, 0.0);
        assert_approx(row.ending_balance, 106_000.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_rows_never_report_negative_balances(
            balance in 0u32..2_000_000,
            property in 0u32..1_000_000,
            expenses in 0u32..250_000,
            income in 0u32..8_000,
            return_bp in -600i32..1_500,
            housing_bp in -500i32..800,
            inflation_bp in -200i32..800,
            threshold_pct in 0u32..101,
            years in 0u32..45
        ) {
            let params = DrawdownParams {
                retirement_age: 60,
                initial_liquid_assets: balance as f64,
                liquidation_threshold: threshold_pct as f64 / 100.0,
                return_rate: return_bp as f64 / 10_000.0,
                housing_return_rate: housing_bp as f64 / 10_000.0,
                inflation_rate: inflation_bp as f64 / 10_000.0,
                guaranteed_income_monthly: income as f64,
                other_income_monthly: 100.0,
            };
            let state = DrawdownState::new(balance as f64, property as f64, expenses as f64);
            let (rows, _) = simulate_drawdown(state, &params, years);

            prop_assert!(rows.len() == years as usize);
            prop_assert!(rows.iter().filter(|r| r.property_liquidated).count() <= 1);
            for row in &rows {
                prop_assert!(row.ending_balance >= 0.0);
                prop_assert!(row.starting_balance >= 0.0);
                prop_assert!(row.non_spendable_value >= 0.0);
                prop_assert!(row.withdrawals >= 0.0);
                prop_assert!(row.total_wealth.is_finite());
            }
        }
    }
}
