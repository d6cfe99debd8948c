//! Currency domain errors

use chrono::NaiveDate;
use core_kernel::Currency;
use thiserror::Error;

/// Errors that can occur in the currency domain
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CurrencyError {
    /// No direct or inverse rate exists at or before the requested date.
    /// Retryable once the missing rate has been supplied.
    #[error("No exchange rate available for {from}->{to} as of {as_of}")]
    RateUnavailable {
        from: Currency,
        to: Currency,
        as_of: NaiveDate,
    },

    /// A rate must relate two different currencies.
    #[error("Exchange rate must relate two different currencies, got {0}")]
    SameCurrency(Currency),

    /// Rates are strictly positive.
    #[error("Invalid exchange rate value: {0}")]
    InvalidRate(String),

    /// At most one rate per (from, to, effective_date) triple.
    #[error("A rate for {from}->{to} on {effective_date} already exists")]
    DuplicateRate {
        from: Currency,
        to: Currency,
        effective_date: NaiveDate,
    },
}
