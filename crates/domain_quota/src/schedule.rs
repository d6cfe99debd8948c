//! Generation schedules
//!
//! A schedule carries the cursors that make recurring generation exactly
//! once per period: `last_generated_period` and `next_generation_date`.
//! `is_due` asks the question, `target_period` names the period, and
//! `advance` moves both cursors after a successful run.

use chrono::{Days, NaiveDate};
use core_kernel::{clamp_to_month, BillingPeriod, ConceptId, ScheduleId};
use serde::{Deserialize, Serialize};

use crate::concept::{PaymentConcept, Recurrence};
use crate::error::QuotaError;

/// How often a schedule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "frequency", content = "interval")]
pub enum Frequency {
    /// Custom interval in days.
    Days(u32),
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
}

impl Frequency {
    fn from_recurrence(recurrence: Recurrence) -> Option<Self> {
        match recurrence {
            Recurrence::OneOff => None,
            Recurrence::Monthly => Some(Frequency::Monthly),
            Recurrence::Quarterly => Some(Frequency::Quarterly),
            Recurrence::SemiAnnual => Some(Frequency::SemiAnnual),
            Recurrence::Annual => Some(Frequency::Annual),
        }
    }

    fn months(&self) -> Option<u32> {
        match self {
            Frequency::Days(_) => None,
            Frequency::Monthly => Some(1),
            Frequency::Quarterly => Some(3),
            Frequency::SemiAnnual => Some(6),
            Frequency::Annual => Some(12),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSchedule {
    pub id: ScheduleId,
    pub concept_id: ConceptId,
    pub frequency: Frequency,
    /// Day-of-month the schedule fires, clamped to short months.
    pub generation_day: u32,
    /// How many periods ahead of the firing date to charge (0 = the period
    /// containing the firing date).
    pub periods_in_advance: u32,
    /// Overrides of the concept's issue/due days, when set.
    pub issue_day: Option<u32>,
    pub due_day: Option<u32>,
    pub last_generated_period: Option<BillingPeriod>,
    pub next_generation_date: Option<NaiveDate>,
    pub is_active: bool,
}

impl GenerationSchedule {
    /// Builds a schedule for a recurring concept. One-off concepts have no
    /// schedule; their quotas are created manually.
    pub fn for_concept(
        concept: &PaymentConcept,
        generation_day: u32,
        periods_in_advance: u32,
    ) -> Result<Self, QuotaError> {
        let frequency = Frequency::from_recurrence(concept.recurrence).ok_or_else(|| {
            QuotaError::InvalidSchedule("one-off concepts are not scheduled".to_string())
        })?;
        if !(1..=31).contains(&generation_day) {
            return Err(QuotaError::InvalidSchedule(format!(
                "generation day must be 1..=31, got {generation_day}"
            )));
        }
        Ok(Self {
            id: ScheduleId::new(),
            concept_id: concept.id,
            frequency,
            generation_day,
            periods_in_advance,
            issue_day: None,
            due_day: None,
            last_generated_period: None,
            next_generation_date: None,
            is_active: true,
        })
    }

    pub fn with_custom_interval(mut self, days: u32) -> Result<Self, QuotaError> {
        if days == 0 {
            return Err(QuotaError::InvalidSchedule(
                "custom interval must be at least one day".to_string(),
            ));
        }
        self.frequency = Frequency::Days(days);
        Ok(self)
    }

    /// True iff the schedule should fire today. A schedule that has never
    /// fired is due immediately.
    pub fn is_due(&self, today: NaiveDate) -> bool {
        if !self.is_active {
            return false;
        }
        match self.next_generation_date {
            Some(next) => today >= next,
            None => true,
        }
    }

    /// The period a run started on `today` generates quotas for.
    pub fn target_period(&self, today: NaiveDate) -> BillingPeriod {
        let current = BillingPeriod::of_date(today);
        match self.frequency {
            Frequency::Annual => {
                BillingPeriod::yearly(current.year + self.periods_in_advance as i32)
            }
            Frequency::Days(_) | Frequency::Monthly => {
                current.plus_months(self.periods_in_advance)
            }
            Frequency::Quarterly => current.plus_months(self.periods_in_advance * 3),
            Frequency::SemiAnnual => current.plus_months(self.periods_in_advance * 6),
        }
    }

    /// Issue date for a target period, from the schedule's (or concept's)
    /// day-of-month.
    pub fn issue_date(&self, period: BillingPeriod, concept: &PaymentConcept) -> NaiveDate {
        let day = self.issue_day.unwrap_or(concept.issue_day);
        clamp_to_month(period.year, period.month.unwrap_or(1), day)
    }

    /// Due date for a target period. A due day earlier than the issue day
    /// means the month after.
    pub fn due_date(&self, period: BillingPeriod, concept: &PaymentConcept) -> NaiveDate {
        let issue_day = self.issue_day.unwrap_or(concept.issue_day);
        let due_day = self.due_day.unwrap_or(concept.due_day);
        let month = period.month.unwrap_or(1);
        if due_day >= issue_day {
            clamp_to_month(period.year, month, due_day)
        } else {
            let next = BillingPeriod { year: period.year, month: Some(month) }.plus_months(1);
            clamp_to_month(next.year, next.month.unwrap_or(1), due_day)
        }
    }

    /// Records a completed run and computes when to fire next.
    pub fn advance(&mut self, generated: BillingPeriod, today: NaiveDate) {
        self.last_generated_period = Some(generated);
        self.next_generation_date = Some(match self.frequency {
            Frequency::Days(days) => today
                .checked_add_days(Days::new(days as u64))
                .unwrap_or(today),
            freq => {
                let months = freq.months().unwrap_or(1);
                let next = BillingPeriod::of_date(today).plus_months(months);
                clamp_to_month(next.year, next.month.unwrap_or(1), self.generation_day)
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::ConceptType;
    use core_kernel::{CondominiumId, Currency};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn monthly_concept() -> PaymentConcept {
        PaymentConcept::new(
            CondominiumId::new(),
            "Maintenance",
            ConceptType::Maintenance,
            Currency::USD,
            Recurrence::Monthly,
            1,
            15,
        )
        .unwrap()
    }

    #[test]
    fn fresh_schedule_is_due_immediately() {
        let schedule = GenerationSchedule::for_concept(&monthly_concept(), 1, 0).unwrap();
        assert!(schedule.is_due(date(2024, 3, 1)));
    }

    #[test]
    fn advance_sets_next_month_on_generation_day() {
        let mut schedule = GenerationSchedule::for_concept(&monthly_concept(), 1, 0).unwrap();
        let period = BillingPeriod::monthly(2024, 3).unwrap();
        schedule.advance(period, date(2024, 3, 1));

        assert_eq!(schedule.last_generated_period, Some(period));
        assert_eq!(schedule.next_generation_date, Some(date(2024, 4, 1)));
        assert!(!schedule.is_due(date(2024, 3, 31)));
        assert!(schedule.is_due(date(2024, 4, 1)));
    }

    #[test]
    fn generation_day_clamps_in_short_months() {
        let mut schedule = GenerationSchedule::for_concept(&monthly_concept(), 31, 0).unwrap();
        schedule.advance(BillingPeriod::monthly(2024, 1).unwrap(), date(2024, 1, 31));
        assert_eq!(schedule.next_generation_date, Some(date(2024, 2, 29)));
    }

    #[test]
    fn periods_in_advance_shift_the_target() {
        let schedule = GenerationSchedule::for_concept(&monthly_concept(), 25, 1).unwrap();
        assert_eq!(
            schedule.target_period(date(2024, 3, 25)),
            BillingPeriod::monthly(2024, 4).unwrap()
        );
    }

    #[test]
    fn due_day_before_issue_day_rolls_to_next_month() {
        let mut concept = monthly_concept();
        concept.issue_day = 25;
        concept.due_day = 5;
        let schedule = GenerationSchedule::for_concept(&concept, 25, 0).unwrap();
        let period = BillingPeriod::monthly(2024, 3).unwrap();
        assert_eq!(schedule.issue_date(period, &concept), date(2024, 3, 25));
        assert_eq!(schedule.due_date(period, &concept), date(2024, 4, 5));
    }

    #[test]
    fn custom_interval_advances_by_days() {
        let mut schedule = GenerationSchedule::for_concept(&monthly_concept(), 1, 0)
            .unwrap()
            .with_custom_interval(15)
            .unwrap();
        schedule.advance(BillingPeriod::monthly(2024, 3).unwrap(), date(2024, 3, 1));
        assert_eq!(schedule.next_generation_date, Some(date(2024, 3, 16)));
    }

    #[test]
    fn one_off_concepts_cannot_be_scheduled() {
        let mut concept = monthly_concept();
        concept.recurrence = Recurrence::OneOff;
        assert!(GenerationSchedule::for_concept(&concept, 1, 0).is_err());
    }
}
