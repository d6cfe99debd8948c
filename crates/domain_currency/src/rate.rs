//! Exchange rate entity

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{Currency, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CurrencyError;

/// One published exchange rate: units of `to_currency` per unit of
/// `from_currency`, effective on a specific date.
///
/// Rows are append-only. A correction is a new row with a later effective
/// date, never an update of an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub id: Uuid,
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub rate: Decimal,
    pub effective_date: NaiveDate,
    /// Where the rate came from (central bank feed, manual entry).
    pub source: Option<String>,
    pub registered_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn new(
        from_currency: Currency,
        to_currency: Currency,
        rate: Decimal,
        effective_date: NaiveDate,
    ) -> Result<Self, CurrencyError> {
        if from_currency == to_currency {
            return Err(CurrencyError::SameCurrency(from_currency));
        }
        if rate <= Decimal::ZERO {
            return Err(CurrencyError::InvalidRate(rate.to_string()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            from_currency,
            to_currency,
            rate,
            effective_date,
            source: None,
            registered_by: None,
            created_at: Utc::now(),
        })
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn registered_by(mut self, user: UserId) -> Self {
        self.registered_by = Some(user);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rejects_same_currency_pair() {
        let err = ExchangeRate::new(
            Currency::USD,
            Currency::USD,
            dec!(1),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
        .unwrap_err();
        assert_eq!(err, CurrencyError::SameCurrency(Currency::USD));
    }

    #[test]
    fn rejects_non_positive_rate() {
        let err = ExchangeRate::new(
            Currency::USD,
            Currency::VES,
            dec!(0),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, CurrencyError::InvalidRate(_)));
    }
}
