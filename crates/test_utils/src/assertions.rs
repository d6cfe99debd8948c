//! Custom Test Assertions
//!
//! Assertion helpers for ledger types that fail with messages naming the
//! amounts involved, not just "left != right".

use core_kernel::Money;
use domain_payment::{AllocationOutcome, Payment};
use domain_quota::Quota;
use rust_decimal::Decimal;

/// Asserts two Money values are equal, currency included.
pub fn assert_money_eq(actual: Money, expected: Money) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );
    assert_eq!(
        actual.amount(),
        expected.amount(),
        "amounts differ: actual={} {}, expected={} {}",
        actual.amount(),
        actual.currency(),
        expected.amount(),
        expected.currency()
    );
}

/// Asserts two Money values differ by at most `tolerance`, for conversion
/// round-trips where a rounding cent is acceptable.
pub fn assert_money_approx_eq(actual: Money, expected: Money, tolerance: Decimal) {
    assert_eq!(actual.currency(), expected.currency(), "currency mismatch");
    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "amounts differ by {} (tolerance {}): actual={}, expected={}",
        diff,
        tolerance,
        actual.amount(),
        expected.amount()
    );
}

/// Asserts the quota's balance identity holds and nothing went negative.
pub fn assert_quota_consistent(quota: &Quota) {
    let balance = quota.balance();
    assert!(
        !balance.is_negative(),
        "quota {} has negative balance {}",
        quota.id,
        balance
    );
    let recomputed = quota.base_amount() + quota.interest_amount() - quota.paid_amount();
    assert_money_eq(balance, recomputed);
    assert!(
        quota.interest_paid().amount() <= quota.paid_amount().amount(),
        "quota {} settled more interest ({}) than it was paid ({})",
        quota.id,
        quota.interest_paid(),
        quota.paid_amount()
    );
}

/// Asserts an allocation run conserved the payment: what landed on quotas
/// plus the pending surplus never exceeds the payment amount, and equals it
/// exactly when nothing was skipped.
pub fn assert_payment_conserved(payment: &Payment, outcome: &AllocationOutcome) {
    let currency = payment.amount.currency();
    let spent = outcome.total_allocated(currency);
    let surplus = outcome
        .pending
        .as_ref()
        .map(|p| p.amount)
        .unwrap_or_else(|| Money::zero(currency));
    let accounted = spent + surplus;
    assert!(
        accounted.amount() <= payment.amount.amount(),
        "payment {} over-allocated: spent {} + surplus {} > amount {}",
        payment.id,
        spent,
        surplus,
        payment.amount
    );
    if outcome.skipped.is_empty() {
        assert_money_eq(accounted, payment.amount);
    }
}
