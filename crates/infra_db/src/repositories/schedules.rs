//! Schedule repository
//!
//! Generation schedules and their cursors. `advance` is a compare-and-set
//! on `next_generation_date`: two workers firing the same schedule both
//! run the generator, but only one moves the cursor, and the loser's quota
//! inserts collapse into skips at the unique index.

use chrono::NaiveDate;
use core_kernel::BillingPeriod;
use domain_quota::{Frequency, GenerationSchedule};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DatabaseError;

#[derive(Debug, Clone)]
pub struct ScheduleRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    schedule_id: Uuid,
    concept_id: Uuid,
    frequency: serde_json::Value,
    generation_day: i32,
    periods_in_advance: i32,
    issue_day: Option<i32>,
    due_day: Option<i32>,
    last_generated_year: Option<i32>,
    last_generated_month: Option<i32>,
    next_generation_date: Option<NaiveDate>,
    is_active: bool,
}

impl ScheduleRow {
    fn into_domain(self) -> Result<GenerationSchedule, DatabaseError> {
        let frequency: Frequency = serde_json::from_value(self.frequency)
            .map_err(|e| DatabaseError::Mapping(e.to_string()))?;
        let last_generated_period = match (self.last_generated_year, self.last_generated_month) {
            (Some(year), Some(month)) => Some(
                BillingPeriod::monthly(year, month as u32)
                    .map_err(|e| DatabaseError::Mapping(e.to_string()))?,
            ),
            (Some(year), None) => Some(BillingPeriod::yearly(year)),
            _ => None,
        };
        Ok(GenerationSchedule {
            id: self.schedule_id.into(),
            concept_id: self.concept_id.into(),
            frequency,
            generation_day: self.generation_day as u32,
            periods_in_advance: self.periods_in_advance as u32,
            issue_day: self.issue_day.map(|d| d as u32),
            due_day: self.due_day.map(|d| d as u32),
            last_generated_period,
            next_generation_date: self.next_generation_date,
            is_active: self.is_active,
        })
    }
}

impl ScheduleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, schedule: &GenerationSchedule) -> Result<(), DatabaseError> {
        let (year, month) = match schedule.last_generated_period {
            Some(p) => (Some(p.year), p.month.map(|m| m as i32)),
            None => (None, None),
        };
        sqlx::query(
            r#"
            INSERT INTO generation_schedules (
                schedule_id, concept_id, frequency, generation_day,
                periods_in_advance, issue_day, due_day,
                last_generated_year, last_generated_month,
                next_generation_date, is_active
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(Uuid::from(schedule.id))
        .bind(Uuid::from(schedule.concept_id))
        .bind(
            serde_json::to_value(schedule.frequency)
                .map_err(|e| DatabaseError::Mapping(e.to_string()))?,
        )
        .bind(schedule.generation_day as i32)
        .bind(schedule.periods_in_advance as i32)
        .bind(schedule.issue_day.map(|d| d as i32))
        .bind(schedule.due_day.map(|d| d as i32))
        .bind(year)
        .bind(month)
        .bind(schedule.next_generation_date)
        .bind(schedule.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;
        Ok(())
    }

    /// Active schedules due on or before `today`. A schedule that has never
    /// fired has no cursor and is due immediately.
    pub async fn due(&self, today: NaiveDate) -> Result<Vec<GenerationSchedule>, DatabaseError> {
        let rows: Vec<ScheduleRow> = sqlx::query_as(
            r#"
            SELECT schedule_id, concept_id, frequency, generation_day,
                   periods_in_advance, issue_day, due_day,
                   last_generated_year, last_generated_month,
                   next_generation_date, is_active
            FROM generation_schedules
            WHERE is_active
              AND (next_generation_date IS NULL OR next_generation_date <= $1)
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        rows.into_iter().map(ScheduleRow::into_domain).collect()
    }

    /// Persists an advanced cursor, but only if nobody else moved it first.
    ///
    /// `expected_next` is the cursor value the schedule was loaded with.
    /// Returns false when the compare-and-set lost; the caller's run still
    /// happened, its inserts having collapsed into skips.
    pub async fn advance(
        &self,
        schedule: &GenerationSchedule,
        expected_next: Option<NaiveDate>,
    ) -> Result<bool, DatabaseError> {
        let (year, month) = match schedule.last_generated_period {
            Some(p) => (Some(p.year), p.month.map(|m| m as i32)),
            None => (None, None),
        };
        let result = sqlx::query(
            r#"
            UPDATE generation_schedules
            SET last_generated_year = $2,
                last_generated_month = $3,
                next_generation_date = $4
            WHERE schedule_id = $1
              AND next_generation_date IS NOT DISTINCT FROM $5
            "#,
        )
        .bind(Uuid::from(schedule.id))
        .bind(year)
        .bind(month)
        .bind(schedule.next_generation_date)
        .bind(expected_next)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        let won = result.rows_affected() > 0;
        if !won {
            debug!(schedule = %schedule.id, "cursor already advanced by another run");
        }
        Ok(won)
    }

    pub async fn deactivate(&self, schedule: &GenerationSchedule) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE generation_schedules SET is_active = FALSE WHERE schedule_id = $1")
            .bind(Uuid::from(schedule.id))
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from(&e))?;
        Ok(())
    }
}
