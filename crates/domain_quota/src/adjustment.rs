//! Late surcharges and early-payment discounts
//!
//! Both are computed from the concept's adjustment policy and a quota's due
//! date. The two are mutually exclusive for a given quota: a payment is
//! either early, on time, or late. These functions are pure; posting the
//! resulting amount (and not posting it twice) is the caller's job.

use chrono::{Days, NaiveDate};
use core_kernel::{Money, Rate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::quota::Quota;

/// A surcharge or discount figure: a percentage of the base amount, or a
/// flat amount in the quota's currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum AdjustmentValue {
    Percentage(Decimal),
    Fixed(Decimal),
}

/// A concept's late/early adjustment configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentPolicy {
    pub late_surcharge: Option<AdjustmentValue>,
    /// Days after the due date before the surcharge kicks in.
    pub grace_days: u32,
    pub early_discount: Option<AdjustmentValue>,
    /// A payment at least this many days before the due date earns the discount.
    pub days_before_due: u32,
}

impl AdjustmentPolicy {
    pub fn none() -> Self {
        Self {
            late_surcharge: None,
            grace_days: 0,
            early_discount: None,
            days_before_due: 0,
        }
    }

    pub fn with_late_surcharge(mut self, value: AdjustmentValue, grace_days: u32) -> Self {
        self.late_surcharge = Some(value);
        self.grace_days = grace_days;
        self
    }

    pub fn with_early_discount(mut self, value: AdjustmentValue, days_before_due: u32) -> Self {
        self.early_discount = Some(value);
        self.days_before_due = days_before_due;
        self
    }
}

/// The adjustment applicable to one quota at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    None,
    LateSurcharge(Money),
    EarlyDiscount(Money),
}

fn value_of(value: AdjustmentValue, base: Money) -> Money {
    match value {
        AdjustmentValue::Percentage(pct) => Rate::from_percentage(pct).apply(&base),
        AdjustmentValue::Fixed(amount) => Money::new(amount, base.currency()),
    }
}

/// Surcharge owed on `quota` as of `as_of`. Zero within the grace window.
///
/// The figure is for one posting; callers must check it has not already
/// been posted for this quota before adding it again.
pub fn late_surcharge(quota: &Quota, policy: &AdjustmentPolicy, as_of: NaiveDate) -> Money {
    let base = quota.base_amount();
    let Some(value) = policy.late_surcharge else {
        return Money::zero(base.currency());
    };
    let cutoff = quota
        .due_date
        .checked_add_days(Days::new(policy.grace_days as u64))
        .unwrap_or(quota.due_date);
    if as_of <= cutoff {
        return Money::zero(base.currency());
    }
    value_of(value, base).round_to_currency()
}

/// Discount earned when paying on `payment_date`, zero unless the payment
/// lands at least `days_before_due` days before the due date.
pub fn early_discount(quota: &Quota, policy: &AdjustmentPolicy, payment_date: NaiveDate) -> Money {
    let base = quota.base_amount();
    let Some(value) = policy.early_discount else {
        return Money::zero(base.currency());
    };
    let cutoff = quota
        .due_date
        .checked_sub_days(Days::new(policy.days_before_due as u64))
        .unwrap_or(quota.due_date);
    if payment_date > cutoff {
        return Money::zero(base.currency());
    }
    value_of(value, base).round_to_currency()
}

/// Resolves which of the two adjustments applies on `as_of`. Late wins over
/// early by construction: a date cannot be both past the grace window and
/// before the discount cutoff.
pub fn adjustment_for(quota: &Quota, policy: &AdjustmentPolicy, as_of: NaiveDate) -> Adjustment {
    let surcharge = late_surcharge(quota, policy, as_of);
    if surcharge.is_positive() {
        return Adjustment::LateSurcharge(surcharge);
    }
    let discount = early_discount(quota, policy, as_of);
    if discount.is_positive() {
        return Adjustment::EarlyDiscount(discount);
    }
    Adjustment::None
}
