//! Property-Based Test Generators
//!
//! Proptest strategies that stay inside the domain's invariants: positive
//! charge amounts, valid billing periods, strictly positive rates.

use core_kernel::{BillingPeriod, Currency, Money};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy over every supported currency.
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::USD),
        Just(Currency::VES),
        Just(Currency::EUR),
        Just(Currency::COP),
        Just(Currency::PEN),
        Just(Currency::ARS),
        Just(Currency::BRL),
        Just(Currency::MXN),
    ]
}

/// Positive amounts with two decimal places, 0.01 to 100,000.00.
pub fn positive_amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Positive Money in a random currency.
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (positive_amount_strategy(), currency_strategy())
        .prop_map(|(amount, currency)| Money::new(amount, currency))
}

/// Positive Money in a fixed currency.
pub fn money_in(currency: Currency) -> impl Strategy<Value = Money> {
    positive_amount_strategy().prop_map(move |amount| Money::new(amount, currency))
}

/// Strictly positive exchange-rate values, 0.0001 to 10,000.
pub fn rate_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|n| Decimal::new(n, 4))
}

/// Percentage values with two decimal places, 0.00 to 100.00.
pub fn percentage_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000i64).prop_map(|n| Decimal::new(n, 2))
}

/// Monthly billing periods across a few years.
pub fn billing_period_strategy() -> impl Strategy<Value = BillingPeriod> {
    (2020i32..2030i32, 1u32..=12u32)
        .prop_map(|(year, month)| BillingPeriod::monthly(year, month).unwrap())
}

/// Aliquot weight sets: 2 to 10 positive weights. Distributions normalize
/// by the sum, so weights need not total 100.
pub fn aliquot_weights_strategy() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec((1i64..10_000i64).prop_map(|n| Decimal::new(n, 2)), 2..10)
}
