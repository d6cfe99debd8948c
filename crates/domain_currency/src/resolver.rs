//! Historical rate resolution
//!
//! `RateBook` holds published rates in memory, indexed by currency pair and
//! sorted by effective date. `resolve` reproduces the rate that was in force
//! on a given date: the latest direct rate at or before that date, or the
//! reciprocal of the latest inverse rate. Nothing is interpolated and
//! nothing is extrapolated backwards before a rate existed.

use chrono::NaiveDate;
use core_kernel::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::CurrencyError;
use crate::rate::ExchangeRate;

/// The outcome of a resolution, persisted next to any conversion that used
/// it so the computation can be audited and replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRate {
    /// Units of the target currency per unit of the source currency.
    pub rate: Decimal,
    /// Effective date of the underlying published rate.
    pub effective_date: NaiveDate,
    /// True when the rate was derived as `1 / published` from the inverse pair.
    pub inverted: bool,
}

/// In-memory book of published exchange rates.
///
/// Reads are pure; the only mutation is appending a new rate. The book
/// rejects a second rate for the same (from, to, effective_date) triple, so
/// tie-breaking between same-day sources happens upstream at ingestion.
#[derive(Debug, Clone, Default)]
pub struct RateBook {
    // (from, to) -> effective_date -> rate value
    rates: BTreeMap<(Currency, Currency), BTreeMap<NaiveDate, Decimal>>,
}

impl RateBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a published rate.
    pub fn publish(&mut self, rate: ExchangeRate) -> Result<(), CurrencyError> {
        let key = (rate.from_currency, rate.to_currency);
        let by_date = self.rates.entry(key).or_default();
        if by_date.contains_key(&rate.effective_date) {
            return Err(CurrencyError::DuplicateRate {
                from: rate.from_currency,
                to: rate.to_currency,
                effective_date: rate.effective_date,
            });
        }
        by_date.insert(rate.effective_date, rate.rate);
        Ok(())
    }

    /// Resolves the rate from `from` to `to` effective on `as_of`.
    ///
    /// Lookup order: latest direct rate at or before `as_of`, then the
    /// reciprocal of the latest inverse rate. A direct rate always wins over
    /// a same-day inverse.
    pub fn resolve(
        &self,
        from: Currency,
        to: Currency,
        as_of: NaiveDate,
    ) -> Result<ResolvedRate, CurrencyError> {
        if from == to {
            return Err(CurrencyError::SameCurrency(from));
        }

        if let Some((date, value)) = self.latest_at_or_before(from, to, as_of) {
            return Ok(ResolvedRate {
                rate: value,
                effective_date: date,
                inverted: false,
            });
        }

        if let Some((date, value)) = self.latest_at_or_before(to, from, as_of) {
            debug!(%from, %to, %as_of, "direct rate missing, deriving from inverse pair");
            return Ok(ResolvedRate {
                rate: Decimal::ONE / value,
                effective_date: date,
                inverted: true,
            });
        }

        Err(CurrencyError::RateUnavailable { from, to, as_of })
    }

    fn latest_at_or_before(
        &self,
        from: Currency,
        to: Currency,
        as_of: NaiveDate,
    ) -> Option<(NaiveDate, Decimal)> {
        self.rates
            .get(&(from, to))?
            .range(..=as_of)
            .next_back()
            .map(|(d, v)| (*d, *v))
    }
}
