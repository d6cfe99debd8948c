//! Interest accrual on overdue quotas
//!
//! Configurations are scoped: a concept-level configuration beats a
//! building-level one, which beats the condominium default. Accrual is
//! incremental against the quota's `interest_accrued_through` watermark, so
//! invoking the calculator twice for the same date posts nothing twice.

use chrono::{Days, NaiveDate};
use core_kernel::{
    temporal::whole_months_between, BuildingId, ConceptId, CondominiumId, EffectiveWindow,
    InterestConfigId, Money, Rate,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::quota::Quota;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestType {
    /// Linear on outstanding principal.
    Simple,
    /// Compounds on principal plus already-accrued unpaid interest.
    Compound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationPeriod {
    Daily,
    Monthly,
}

/// What the configuration applies to, most specific wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestScope {
    Condominium(CondominiumId),
    Building(BuildingId),
    Concept(ConceptId),
}

impl InterestScope {
    fn specificity(&self) -> u8 {
        match self {
            InterestScope::Condominium(_) => 0,
            InterestScope::Building(_) => 1,
            InterestScope::Concept(_) => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestConfiguration {
    pub id: InterestConfigId,
    pub scope: InterestScope,
    pub interest_type: InterestType,
    /// Percentage per calculation period (1.5 means 1.5% per period).
    pub rate: Decimal,
    pub calculation_period: CalculationPeriod,
    /// Days past due before interest starts running.
    pub grace_days: u32,
    pub window: EffectiveWindow,
    pub is_active: bool,
}

impl InterestConfiguration {
    pub fn new(
        scope: InterestScope,
        interest_type: InterestType,
        rate: Decimal,
        calculation_period: CalculationPeriod,
        grace_days: u32,
        window: EffectiveWindow,
    ) -> Self {
        Self {
            id: InterestConfigId::new(),
            scope,
            interest_type,
            rate,
            calculation_period,
            grace_days,
            window,
            is_active: true,
        }
    }

    fn applies_to(
        &self,
        condominium: CondominiumId,
        building: Option<BuildingId>,
        concept: ConceptId,
    ) -> bool {
        match self.scope {
            InterestScope::Condominium(c) => c == condominium,
            InterestScope::Building(b) => building == Some(b),
            InterestScope::Concept(c) => c == concept,
        }
    }
}

/// Picks the effective configuration for a quota's concept/building/
/// condominium as of a date. Concept beats building beats condominium.
pub fn select_interest_config<'a>(
    configs: &'a [InterestConfiguration],
    condominium: CondominiumId,
    building: Option<BuildingId>,
    concept: ConceptId,
    as_of: NaiveDate,
) -> Option<&'a InterestConfiguration> {
    configs
        .iter()
        .filter(|c| c.is_active && c.window.contains(as_of))
        .filter(|c| c.applies_to(condominium, building, concept))
        .max_by_key(|c| c.scope.specificity())
}

/// One accrual posting: the incremental amount and the new watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterestAccrual {
    pub increment: Money,
    pub accrued_through: NaiveDate,
}

/// Computes interest accrued since the quota's watermark, up to `as_of`.
///
/// Returns `None` when nothing accrues: the quota is closed, the grace
/// window has not elapsed, or no whole calculation period has passed since
/// the last posting. The caller posts the increment via
/// `Quota::post_interest`, which also stores the new watermark.
pub fn accrue_interest(
    quota: &Quota,
    config: &InterestConfiguration,
    as_of: NaiveDate,
) -> Option<InterestAccrual> {
    if !quota.is_open() {
        return None;
    }

    let interest_start = quota
        .due_date
        .checked_add_days(Days::new(config.grace_days as u64))?;
    let start = quota
        .interest_accrued_through
        .map_or(interest_start, |w| w.max(interest_start));
    if as_of <= start {
        return None;
    }

    let periods = match config.calculation_period {
        CalculationPeriod::Daily => (as_of - start).num_days(),
        CalculationPeriod::Monthly => whole_months_between(start, as_of),
    };
    if periods <= 0 {
        return None;
    }

    let rate = Rate::from_percentage(config.rate).as_decimal();
    let increment = match config.interest_type {
        InterestType::Simple => {
            let principal = quota.outstanding_principal();
            principal.multiply(rate * Decimal::from(periods))
        }
        InterestType::Compound => {
            let base = quota.outstanding_principal() + quota.outstanding_interest();
            let factor = Decimal::ONE + rate;
            let mut compounded = Decimal::ONE;
            for _ in 0..periods {
                compounded *= factor;
            }
            base.multiply(compounded - Decimal::ONE)
        }
    };
    if !increment.is_positive() {
        return None;
    }

    // Monthly accrual only moves the watermark by whole periods, so a
    // partial month keeps accruing from the last full one.
    let accrued_through = match config.calculation_period {
        CalculationPeriod::Daily => as_of,
        CalculationPeriod::Monthly => {
            let mut through = start;
            for _ in 0..periods {
                through = add_one_month(through);
            }
            through
        }
    };

    debug!(
        quota = %quota.id,
        %increment,
        %accrued_through,
        periods,
        "interest accrued"
    );
    Some(InterestAccrual {
        increment,
        accrued_through,
    })
}

fn add_one_month(date: NaiveDate) -> NaiveDate {
    use chrono::Datelike;
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    core_kernel::clamp_to_month(year, month, date.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{BillingPeriod, Currency, UnitId};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn overdue_quota(base: Decimal, due: NaiveDate) -> Quota {
        Quota::new(
            CondominiumId::new(),
            UnitId::new(),
            ConceptId::new(),
            BillingPeriod::of_date(due),
            Money::new(base, Currency::USD),
            due,
            due,
        )
    }

    fn config(
        interest_type: InterestType,
        rate: Decimal,
        period: CalculationPeriod,
        grace: u32,
    ) -> InterestConfiguration {
        InterestConfiguration::new(
            InterestScope::Condominium(CondominiumId::new()),
            interest_type,
            rate,
            period,
            grace,
            EffectiveWindow::open_from(date(2020, 1, 1)),
        )
    }

    #[test]
    fn no_accrual_inside_grace() {
        let quota = overdue_quota(dec!(100.00), date(2024, 1, 10));
        let cfg = config(InterestType::Simple, dec!(1), CalculationPeriod::Daily, 5);
        assert!(accrue_interest(&quota, &cfg, date(2024, 1, 15)).is_none());
    }

    #[test]
    fn simple_daily_is_linear() {
        let quota = overdue_quota(dec!(100.00), date(2024, 1, 10));
        let cfg = config(InterestType::Simple, dec!(0.1), CalculationPeriod::Daily, 0);
        // 10 days at 0.1% on 100.00
        let accrual = accrue_interest(&quota, &cfg, date(2024, 1, 20)).unwrap();
        assert_eq!(accrual.increment.amount(), dec!(1.00));
        assert_eq!(accrual.accrued_through, date(2024, 1, 20));
    }

    #[test]
    fn accrual_is_incremental_against_watermark() {
        let mut quota = overdue_quota(dec!(100.00), date(2024, 1, 10));
        let cfg = config(InterestType::Simple, dec!(0.1), CalculationPeriod::Daily, 0);

        let first = accrue_interest(&quota, &cfg, date(2024, 1, 20)).unwrap();
        quota
            .post_interest(first.increment, first.accrued_through)
            .unwrap();

        // Re-running for the same date accrues nothing.
        assert!(accrue_interest(&quota, &cfg, date(2024, 1, 20)).is_none());

        // Five more days accrue only the delta.
        let second = accrue_interest(&quota, &cfg, date(2024, 1, 25)).unwrap();
        assert_eq!(second.increment.amount(), dec!(0.50));
    }

    #[test]
    fn compound_monthly_includes_prior_interest() {
        let mut quota = overdue_quota(dec!(1000.00), date(2024, 1, 1));
        let cfg = config(InterestType::Compound, dec!(2), CalculationPeriod::Monthly, 0);

        let first = accrue_interest(&quota, &cfg, date(2024, 2, 1)).unwrap();
        assert_eq!(first.increment.amount(), dec!(20.00));
        quota
            .post_interest(first.increment, first.accrued_through)
            .unwrap();

        // Second month compounds on 1020.00.
        let second = accrue_interest(&quota, &cfg, date(2024, 3, 1)).unwrap();
        assert_eq!(second.increment.amount(), dec!(20.40));
    }

    #[test]
    fn monthly_watermark_ignores_partial_months() {
        let quota = overdue_quota(dec!(100.00), date(2024, 1, 1));
        let cfg = config(InterestType::Simple, dec!(1), CalculationPeriod::Monthly, 0);
        let accrual = accrue_interest(&quota, &cfg, date(2024, 3, 20)).unwrap();
        // Two whole months; watermark stops at the last full period.
        assert_eq!(accrual.increment.amount(), dec!(2.00));
        assert_eq!(accrual.accrued_through, date(2024, 3, 1));
    }

    #[test]
    fn most_specific_scope_wins() {
        let condo = CondominiumId::new();
        let building = BuildingId::new();
        let concept = ConceptId::new();
        let window = EffectiveWindow::open_from(date(2020, 1, 1));

        let configs = vec![
            InterestConfiguration::new(
                InterestScope::Condominium(condo),
                InterestType::Simple,
                dec!(1),
                CalculationPeriod::Monthly,
                0,
                window,
            ),
            InterestConfiguration::new(
                InterestScope::Building(building),
                InterestType::Simple,
                dec!(2),
                CalculationPeriod::Monthly,
                0,
                window,
            ),
            InterestConfiguration::new(
                InterestScope::Concept(concept),
                InterestType::Simple,
                dec!(3),
                CalculationPeriod::Monthly,
                0,
                window,
            ),
        ];

        let selected =
            select_interest_config(&configs, condo, Some(building), concept, date(2024, 1, 1))
                .unwrap();
        assert_eq!(selected.rate, dec!(3));

        let other_concept = ConceptId::new();
        let selected =
            select_interest_config(&configs, condo, Some(building), other_concept, date(2024, 1, 1))
                .unwrap();
        assert_eq!(selected.rate, dec!(2));
    }
}
