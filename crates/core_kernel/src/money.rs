//! Money types with precise decimal arithmetic
//!
//! All monetary values in the ledger are `rust_decimal` decimals paired with
//! a currency. Floating point never touches a balance.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub, Neg};
use thiserror::Error;

/// Currencies the ledger can hold balances in.
///
/// The set mirrors the markets the platform operates in; the bolívar is the
/// usual local currency, the dollar the usual base currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    USD,
    VES,
    EUR,
    COP,
    PEN,
    ARS,
    BRL,
    MXN,
}

impl Currency {
    /// Number of decimal places quotas and payments are rounded to.
    pub fn decimal_places(&self) -> u32 {
        2
    }

    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::VES => "VES",
            Currency::EUR => "EUR",
            Currency::COP => "COP",
            Currency::PEN => "PEN",
            Currency::ARS => "ARS",
            Currency::BRL => "BRL",
            Currency::MXN => "MXN",
        }
    }

    /// Parses an ISO 4217 code as stored in the database.
    pub fn from_code(code: &str) -> Result<Self, MoneyError> {
        match code {
            "USD" => Ok(Currency::USD),
            "VES" => Ok(Currency::VES),
            "EUR" => Ok(Currency::EUR),
            "COP" => Ok(Currency::COP),
            "PEN" => Ok(Currency::PEN),
            "ARS" => Ok(Currency::ARS),
            "BRL" => Ok(Currency::BRL),
            "MXN" => Ok(Currency::MXN),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by money arithmetic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Division by zero")]
    DivisionByZero,
}

/// A monetary amount in a specific currency.
///
/// Amounts keep four internal decimal places so that exchange-rate
/// conversions do not lose precision before the final rounding to the
/// currency's scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self {
            amount: amount.round_dp(4),
            currency,
        }
    }

    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: dec!(0),
            currency,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Rounds to the currency's standard scale.
    pub fn round_to_currency(&self) -> Self {
        Self {
            amount: self.amount.round_dp(self.currency.decimal_places()),
            currency: self.currency,
        }
    }

    /// Banker's rounding (half to even) at the given scale.
    pub fn round_bankers(&self, dp: u32) -> Self {
        Self {
            amount: self.amount.round_dp_with_strategy(
                dp,
                rust_decimal::RoundingStrategy::MidpointNearestEven,
            ),
            currency: self.currency,
        }
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Ok(Self::new(self.amount + other.amount, self.currency))
    }

    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Ok(Self::new(self.amount - other.amount, self.currency))
    }

    /// Scales by a factor, e.g. a surcharge or interest rate.
    pub fn multiply(&self, factor: Decimal) -> Self {
        Self::new(self.amount * factor, self.currency)
    }

    pub fn divide(&self, divisor: Decimal) -> Result<Self, MoneyError> {
        if divisor.is_zero() {
            return Err(MoneyError::DivisionByZero);
        }
        Ok(Self::new(self.amount / divisor, self.currency))
    }

    /// Re-denominates this amount into another currency at the given rate.
    ///
    /// The rate is units of `target` per unit of `self.currency`. Callers
    /// are responsible for recording which rate was used.
    pub fn convert(&self, rate: Decimal, target: Currency) -> Money {
        Money::new(self.amount * rate, target)
    }

    pub fn min(self, other: Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Ok(if self.amount <= other.amount { self } else { other })
    }

    /// Splits this amount according to weights, in weight order.
    ///
    /// The last share absorbs the rounding remainder so the parts always sum
    /// back to the original amount. Used for aliquot distribution.
    pub fn allocate_by_weights(&self, weights: &[Decimal]) -> Result<Vec<Money>, MoneyError> {
        if weights.is_empty() {
            return Err(MoneyError::InvalidAmount("empty weights".to_string()));
        }
        let total_weight: Decimal = weights.iter().sum();
        if total_weight.is_zero() {
            return Err(MoneyError::InvalidAmount("total weight is zero".to_string()));
        }

        let dp = self.currency.decimal_places();
        let mut allocated = Money::zero(self.currency);
        let mut shares = Vec::with_capacity(weights.len());

        for (i, weight) in weights.iter().enumerate() {
            if i == weights.len() - 1 {
                shares.push(self.checked_sub(&allocated)?);
            } else {
                let share = Self::new(
                    (self.amount * *weight / total_weight).round_dp(dp),
                    self.currency,
                );
                allocated = allocated.checked_add(&share)?;
                shares.push(share);
            }
        }

        Ok(shares)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dp = self.currency.decimal_places() as usize;
        write!(f, "{:.dp$} {}", self.amount, self.currency.code(), dp = dp)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.checked_add(&other)
            .expect("Currency mismatch in Money::add")
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self.checked_sub(&other)
            .expect("Currency mismatch in Money::sub")
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.amount, self.currency)
    }
}

/// A percentage rate (surcharge, discount, or interest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    /// The rate as a fraction (0.05 for 5%).
    value: Decimal,
}

impl Rate {
    pub fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// From a percentage figure as stored in configuration (5.0 for 5%).
    pub fn from_percentage(percentage: Decimal) -> Self {
        Self {
            value: percentage / dec!(100),
        }
    }

    pub fn as_decimal(&self) -> Decimal {
        self.value
    }

    pub fn as_percentage(&self) -> Decimal {
        self.value * dec!(100)
    }

    pub fn apply(&self, money: &Money) -> Money {
        money.multiply(self.value)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage().round_dp(4))
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn weight_allocation_preserves_total(
            cents in 1i64..1_000_000_000i64,
            w1 in 1u32..1000u32,
            w2 in 1u32..1000u32,
            w3 in 1u32..1000u32,
        ) {
            let total = Money::new(Decimal::new(cents, 2), Currency::USD);
            let weights = [Decimal::from(w1), Decimal::from(w2), Decimal::from(w3)];
            let shares = total.allocate_by_weights(&weights).unwrap();
            let sum: Decimal = shares.iter().map(|s| s.amount()).sum();
            prop_assert_eq!(sum, total.amount());
        }
    }
}
