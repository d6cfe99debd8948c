//! The quota entity
//!
//! A quota is one materialized charge: one unit, one concept, one period.
//! Balance arithmetic is private so `balance == base + interest - paid`
//! cannot drift: the only writers are payment application/reversal, interest
//! posting, audited manual adjustment, and cancellation.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{
    AdjustmentId, BillingPeriod, ConceptId, CondominiumId, GenerationLogId, Money, QuotaId,
    UnitId, UserId,
};
use domain_currency::ResolvedRate;
use serde::{Deserialize, Serialize};

use crate::error::QuotaError;

/// Pure function of balance, payments, and the calendar; `Cancelled` is the
/// only sticky state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quota {
    pub id: QuotaId,
    pub condominium_id: CondominiumId,
    pub unit_id: UnitId,
    pub concept_id: ConceptId,
    pub period: BillingPeriod,
    pub description: String,
    base_amount: Money,
    interest_amount: Money,
    paid_amount: Money,
    /// Portion of `paid_amount` that settled interest. Keeping the split
    /// explicit makes principal/interest reporting deterministic.
    interest_paid: Money,
    /// Frozen at issue time when the quota's currency differs from the
    /// condominium's base currency.
    pub amount_in_base_currency: Option<Money>,
    pub exchange_rate_used: Option<ResolvedRate>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    /// Watermark for interest accrual; `None` until the first posting.
    pub interest_accrued_through: Option<NaiveDate>,
    status: QuotaStatus,
    pub generation_log_id: Option<GenerationLogId>,
    pub created_at: DateTime<Utc>,
}

/// Audit record of a manual base-amount change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaAdjustment {
    pub id: AdjustmentId,
    pub quota_id: QuotaId,
    pub previous_amount: Money,
    pub new_amount: Money,
    pub reason: String,
    pub adjusted_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Quota {
    pub fn new(
        condominium_id: CondominiumId,
        unit_id: UnitId,
        concept_id: ConceptId,
        period: BillingPeriod,
        base_amount: Money,
        issue_date: NaiveDate,
        due_date: NaiveDate,
    ) -> Self {
        let currency = base_amount.currency();
        Self {
            id: QuotaId::new(),
            condominium_id,
            unit_id,
            concept_id,
            period,
            description: period.description(),
            base_amount,
            interest_amount: Money::zero(currency),
            paid_amount: Money::zero(currency),
            interest_paid: Money::zero(currency),
            amount_in_base_currency: None,
            exchange_rate_used: None,
            issue_date,
            due_date,
            interest_accrued_through: None,
            status: QuotaStatus::Pending,
            generation_log_id: None,
            created_at: Utc::now(),
        }
    }

    /// Rehydrates a persisted quota, re-checking the balance identity so a
    /// corrupted row is caught at load time rather than at the next
    /// mutation.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: QuotaId,
        condominium_id: CondominiumId,
        unit_id: UnitId,
        concept_id: ConceptId,
        period: BillingPeriod,
        description: String,
        base_amount: Money,
        interest_amount: Money,
        paid_amount: Money,
        interest_paid: Money,
        amount_in_base_currency: Option<Money>,
        exchange_rate_used: Option<ResolvedRate>,
        issue_date: NaiveDate,
        due_date: NaiveDate,
        interest_accrued_through: Option<NaiveDate>,
        status: QuotaStatus,
        generation_log_id: Option<GenerationLogId>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, QuotaError> {
        let quota = Self {
            id,
            condominium_id,
            unit_id,
            concept_id,
            period,
            description,
            base_amount,
            interest_amount,
            paid_amount,
            interest_paid,
            amount_in_base_currency,
            exchange_rate_used,
            issue_date,
            due_date,
            interest_accrued_through,
            status,
            generation_log_id,
            created_at,
        };
        if quota.balance().is_negative() || interest_paid.amount() > paid_amount.amount() {
            return Err(QuotaError::ApplicationExceedsBalance {
                quota: id,
                amount: paid_amount.to_string(),
            });
        }
        Ok(quota)
    }

    pub fn with_base_currency_amount(mut self, amount: Money, rate: ResolvedRate) -> Self {
        self.amount_in_base_currency = Some(amount);
        self.exchange_rate_used = Some(rate);
        self
    }

    pub fn from_generation(mut self, log: GenerationLogId) -> Self {
        self.generation_log_id = Some(log);
        self
    }

    pub fn base_amount(&self) -> Money {
        self.base_amount
    }

    pub fn interest_amount(&self) -> Money {
        self.interest_amount
    }

    pub fn paid_amount(&self) -> Money {
        self.paid_amount
    }

    pub fn interest_paid(&self) -> Money {
        self.interest_paid
    }

    pub fn status(&self) -> QuotaStatus {
        self.status
    }

    /// `base + interest - paid`, never negative.
    pub fn balance(&self) -> Money {
        self.base_amount + self.interest_amount - self.paid_amount
    }

    /// Interest accrued but not yet settled.
    pub fn outstanding_interest(&self) -> Money {
        self.interest_amount - self.interest_paid
    }

    /// Principal not yet settled.
    pub fn outstanding_principal(&self) -> Money {
        self.base_amount - (self.paid_amount - self.interest_paid)
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.status, QuotaStatus::Paid | QuotaStatus::Cancelled)
    }

    /// Applies a payment split into principal and interest portions.
    ///
    /// Both portions must fit their outstanding counterpart; the check is an
    /// invariant guard, the allocation engine sizes the split beforehand.
    pub fn apply_payment(
        &mut self,
        to_principal: Money,
        to_interest: Money,
        as_of: NaiveDate,
    ) -> Result<(), QuotaError> {
        if matches!(self.status, QuotaStatus::Cancelled) {
            return Err(QuotaError::InvalidTransition {
                quota: self.id,
                from: "cancelled".to_string(),
            });
        }
        let applied = to_principal.checked_add(&to_interest)?;
        if to_interest.amount() > self.outstanding_interest().amount()
            || to_principal.amount() > self.outstanding_principal().amount()
        {
            return Err(QuotaError::ApplicationExceedsBalance {
                quota: self.id,
                amount: applied.to_string(),
            });
        }
        self.paid_amount = self.paid_amount.checked_add(&applied)?;
        self.interest_paid = self.interest_paid.checked_add(&to_interest)?;
        self.recompute_status(as_of);
        Ok(())
    }

    /// Undoes a previous application, used when a payment is refunded.
    pub fn reverse_payment(
        &mut self,
        to_principal: Money,
        to_interest: Money,
        as_of: NaiveDate,
    ) -> Result<(), QuotaError> {
        let reversed = to_principal.checked_add(&to_interest)?;
        if reversed.amount() > self.paid_amount.amount()
            || to_interest.amount() > self.interest_paid.amount()
        {
            return Err(QuotaError::ApplicationExceedsBalance {
                quota: self.id,
                amount: reversed.to_string(),
            });
        }
        self.paid_amount = self.paid_amount.checked_sub(&reversed)?;
        self.interest_paid = self.interest_paid.checked_sub(&to_interest)?;
        self.recompute_status(as_of);
        Ok(())
    }

    /// Adds accrued interest and moves the watermark forward.
    pub fn post_interest(
        &mut self,
        increment: Money,
        accrued_through: NaiveDate,
    ) -> Result<(), QuotaError> {
        if matches!(self.status, QuotaStatus::Paid | QuotaStatus::Cancelled) {
            return Err(QuotaError::InvalidTransition {
                quota: self.id,
                from: format!("{:?}", self.status).to_lowercase(),
            });
        }
        self.interest_amount = self.interest_amount.checked_add(&increment)?;
        self.interest_accrued_through = Some(accrued_through);
        self.recompute_status(accrued_through);
        Ok(())
    }

    /// Manual, audited base-amount change. Requires an actual change and a
    /// new amount that still covers what has already been paid.
    pub fn adjust_base(
        &mut self,
        new_amount: Money,
        reason: impl Into<String>,
        adjusted_by: Option<UserId>,
        as_of: NaiveDate,
    ) -> Result<QuotaAdjustment, QuotaError> {
        if matches!(self.status, QuotaStatus::Cancelled) {
            return Err(QuotaError::InvalidTransition {
                quota: self.id,
                from: "cancelled".to_string(),
            });
        }
        if new_amount == self.base_amount {
            return Err(QuotaError::AdjustmentWithoutChange(self.id));
        }
        let principal_paid = self.paid_amount.checked_sub(&self.interest_paid)?;
        if new_amount.amount() < principal_paid.amount() {
            return Err(QuotaError::ApplicationExceedsBalance {
                quota: self.id,
                amount: new_amount.to_string(),
            });
        }
        let adjustment = QuotaAdjustment {
            id: AdjustmentId::new(),
            quota_id: self.id,
            previous_amount: self.base_amount,
            new_amount,
            reason: reason.into(),
            adjusted_by,
            created_at: Utc::now(),
        };
        self.base_amount = new_amount;
        self.recompute_status(as_of);
        Ok(adjustment)
    }

    /// Terminal. A cancelled quota keeps its history but is never charged,
    /// accrued, or paid again.
    pub fn cancel(&mut self) -> Result<(), QuotaError> {
        if matches!(self.status, QuotaStatus::Paid) {
            return Err(QuotaError::InvalidTransition {
                quota: self.id,
                from: "paid".to_string(),
            });
        }
        self.status = QuotaStatus::Cancelled;
        Ok(())
    }

    /// Re-derives the status from the balance and the calendar.
    pub fn recompute_status(&mut self, as_of: NaiveDate) {
        if matches!(self.status, QuotaStatus::Cancelled) {
            return;
        }
        self.status = if self.balance().is_zero() {
            QuotaStatus::Paid
        } else if as_of > self.due_date {
            QuotaStatus::Overdue
        } else if self.paid_amount.is_positive() {
            QuotaStatus::Partial
        } else {
            QuotaStatus::Pending
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn quota(base: Decimal) -> Quota {
        Quota::new(
            CondominiumId::new(),
            UnitId::new(),
            ConceptId::new(),
            BillingPeriod::monthly(2024, 3).unwrap(),
            Money::new(base, Currency::USD),
            date(2024, 3, 1),
            date(2024, 3, 15),
        )
    }

    #[test]
    fn balance_invariant_holds_through_lifecycle() {
        let mut q = quota(dec!(100.00));
        assert_eq!(q.balance().amount(), dec!(100.00));

        q.post_interest(Money::new(dec!(10.00), Currency::USD), date(2024, 4, 1))
            .unwrap();
        assert_eq!(q.balance().amount(), dec!(110.00));

        q.apply_payment(
            Money::new(dec!(50.00), Currency::USD),
            Money::new(dec!(10.00), Currency::USD),
            date(2024, 4, 2),
        )
        .unwrap();
        assert_eq!(q.balance().amount(), dec!(50.00));
        assert_eq!(q.outstanding_interest().amount(), dec!(0.00));
        assert_eq!(q.outstanding_principal().amount(), dec!(50.00));
    }

    #[test]
    fn status_follows_balance_and_calendar() {
        let mut q = quota(dec!(100.00));
        assert_eq!(q.status(), QuotaStatus::Pending);

        q.apply_payment(
            Money::new(dec!(40.00), Currency::USD),
            Money::zero(Currency::USD),
            date(2024, 3, 10),
        )
        .unwrap();
        assert_eq!(q.status(), QuotaStatus::Partial);

        q.recompute_status(date(2024, 3, 16));
        assert_eq!(q.status(), QuotaStatus::Overdue);

        q.apply_payment(
            Money::new(dec!(60.00), Currency::USD),
            Money::zero(Currency::USD),
            date(2024, 3, 20),
        )
        .unwrap();
        assert_eq!(q.status(), QuotaStatus::Paid);
    }

    #[test]
    fn overpayment_is_an_invariant_violation() {
        let mut q = quota(dec!(100.00));
        let err = q
            .apply_payment(
                Money::new(dec!(100.01), Currency::USD),
                Money::zero(Currency::USD),
                date(2024, 3, 10),
            )
            .unwrap_err();
        assert!(matches!(err, QuotaError::ApplicationExceedsBalance { .. }));
        // The failed application left nothing behind.
        assert_eq!(q.balance().amount(), dec!(100.00));
    }

    #[test]
    fn refund_restores_balance_and_status() {
        let mut q = quota(dec!(100.00));
        q.apply_payment(
            Money::new(dec!(100.00), Currency::USD),
            Money::zero(Currency::USD),
            date(2024, 3, 10),
        )
        .unwrap();
        assert_eq!(q.status(), QuotaStatus::Paid);

        q.reverse_payment(
            Money::new(dec!(100.00), Currency::USD),
            Money::zero(Currency::USD),
            date(2024, 3, 12),
        )
        .unwrap();
        assert_eq!(q.balance().amount(), dec!(100.00));
        assert_eq!(q.status(), QuotaStatus::Pending);
    }

    #[test]
    fn adjustment_requires_a_change() {
        let mut q = quota(dec!(100.00));
        let err = q
            .adjust_base(
                Money::new(dec!(100.00), Currency::USD),
                "no-op",
                None,
                date(2024, 3, 1),
            )
            .unwrap_err();
        assert!(matches!(err, QuotaError::AdjustmentWithoutChange(_)));

        let adj = q
            .adjust_base(
                Money::new(dec!(120.00), Currency::USD),
                "indexed to new budget",
                None,
                date(2024, 3, 1),
            )
            .unwrap();
        assert_eq!(adj.previous_amount.amount(), dec!(100.00));
        assert_eq!(q.balance().amount(), dec!(120.00));
    }

    #[test]
    fn cancelled_is_sticky() {
        let mut q = quota(dec!(100.00));
        q.cancel().unwrap();
        assert_eq!(q.status(), QuotaStatus::Cancelled);
        q.recompute_status(date(2024, 6, 1));
        assert_eq!(q.status(), QuotaStatus::Cancelled);
        assert!(q
            .apply_payment(
                Money::new(dec!(10.00), Currency::USD),
                Money::zero(Currency::USD),
                date(2024, 6, 1),
            )
            .is_err());
    }
}
