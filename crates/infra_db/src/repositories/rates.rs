//! Exchange rate repository
//!
//! Rates are append-only: inserts only, no updates or deletes. The unique
//! (from, to, effective_date) constraint rejects a second rate for the
//! same day; corrections are new rows with a later effective date.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::Currency;
use domain_currency::{ExchangeRate, RateBook};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DatabaseError;

#[derive(Debug, Clone)]
pub struct ExchangeRateRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct RateRow {
    rate_id: Uuid,
    from_currency: String,
    to_currency: String,
    rate: Decimal,
    effective_date: NaiveDate,
    source: Option<String>,
    registered_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl RateRow {
    fn into_domain(self) -> Result<ExchangeRate, DatabaseError> {
        let from = Currency::from_code(&self.from_currency)
            .map_err(|e| DatabaseError::Mapping(e.to_string()))?;
        let to = Currency::from_code(&self.to_currency)
            .map_err(|e| DatabaseError::Mapping(e.to_string()))?;
        let mut rate = ExchangeRate::new(from, to, self.rate, self.effective_date)
            .map_err(|e| DatabaseError::Mapping(e.to_string()))?;
        rate.id = self.rate_id;
        rate.source = self.source;
        rate.registered_by = self.registered_by.map(Into::into);
        rate.created_at = self.created_at;
        Ok(rate)
    }
}

impl ExchangeRateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends a published rate.
    ///
    /// # Errors
    ///
    /// `DatabaseError::DuplicateEntry` when a rate for the same
    /// (from, to, effective_date) triple already exists.
    pub async fn insert(&self, rate: &ExchangeRate) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO exchange_rates (
                rate_id, from_currency, to_currency, rate, effective_date,
                source, registered_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(rate.id)
        .bind(rate.from_currency.code())
        .bind(rate.to_currency.code())
        .bind(rate.rate)
        .bind(rate.effective_date)
        .bind(&rate.source)
        .bind(rate.registered_by.map(Uuid::from))
        .bind(rate.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        debug!(
            from = %rate.from_currency,
            to = %rate.to_currency,
            effective = %rate.effective_date,
            "exchange rate published"
        );
        Ok(())
    }

    /// Loads every published rate into an in-memory book for resolution.
    ///
    /// The rate table is small (one row per pair per publication day) and
    /// read-only from the engine's perspective, so the whole book is loaded
    /// rather than querying per conversion.
    pub async fn load_book(&self) -> Result<RateBook, DatabaseError> {
        let rows: Vec<RateRow> = sqlx::query_as(
            r#"
            SELECT rate_id, from_currency, to_currency, rate, effective_date,
                   source, registered_by, created_at
            FROM exchange_rates
            ORDER BY effective_date
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        let mut book = RateBook::new();
        for row in rows {
            let rate = row.into_domain()?;
            book.publish(rate)
                .map_err(|e| DatabaseError::Mapping(e.to_string()))?;
        }
        Ok(book)
    }

    /// All rates for a pair, newest first, for audit listings.
    pub async fn history(
        &self,
        from: Currency,
        to: Currency,
    ) -> Result<Vec<ExchangeRate>, DatabaseError> {
        let rows: Vec<RateRow> = sqlx::query_as(
            r#"
            SELECT rate_id, from_currency, to_currency, rate, effective_date,
                   source, registered_by, created_at
            FROM exchange_rates
            WHERE from_currency = $1 AND to_currency = $2
            ORDER BY effective_date DESC
            "#,
        )
        .bind(from.code())
        .bind(to.code())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        rows.into_iter().map(RateRow::into_domain).collect()
    }
}
