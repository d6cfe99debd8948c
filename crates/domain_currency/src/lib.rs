//! Currency Domain - Exchange Rates and Historical Resolution
//!
//! This crate owns the exchange-rate book and the resolver that answers
//! "what was the rate between these two currencies on this date". Rates are
//! append-only: once a computation has referenced a rate, it is never
//! updated or deleted, so every conversion can be reproduced later.
//!
//! Resolution is direct-then-inverse: the latest direct rate at or before
//! the requested date wins; failing that, the inverse pair is consulted and
//! reciprocated. Rates are never interpolated between dates.

pub mod rate;
pub mod resolver;
pub mod error;

pub use rate::ExchangeRate;
pub use resolver::{RateBook, ResolvedRate};
pub use error::CurrencyError;
