//! Billing periods and effectivity windows
//!
//! Quotas are charged per period (a year plus an optional month); rules and
//! interest configurations apply within date windows. Both live here.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid window: from {from} must not be after to {to}")]
    InvalidWindow { from: NaiveDate, to: NaiveDate },

    #[error("Invalid month: {0}")]
    InvalidMonth(u32),

    #[error("Windows overlap")]
    WindowsOverlap,
}

/// The period a quota is charged for: a year, optionally narrowed to a month.
///
/// Annual concepts charge `BillingPeriod::yearly(2024)`; monthly concepts
/// charge `BillingPeriod::monthly(2024, 3)`. Ordering is chronological, with
/// a yearly period sorting before that year's months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub year: i32,
    pub month: Option<u32>,
}

impl BillingPeriod {
    pub fn monthly(year: i32, month: u32) -> Result<Self, TemporalError> {
        if !(1..=12).contains(&month) {
            return Err(TemporalError::InvalidMonth(month));
        }
        Ok(Self {
            year,
            month: Some(month),
        })
    }

    pub fn yearly(year: i32) -> Self {
        Self { year, month: None }
    }

    /// The period containing the given date, at monthly granularity.
    pub fn of_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: Some(date.month()),
        }
    }

    /// Human-readable description stored on quotas and logs ("March 2024").
    pub fn description(&self) -> String {
        match self.month {
            Some(m) => format!("{} {}", MONTH_NAMES[(m - 1) as usize], self.year),
            None => format!("Year {}", self.year),
        }
    }

    /// First calendar day of the period.
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month.unwrap_or(1), 1)
            .expect("month validated at construction")
    }

    /// Advances a monthly period by `months`; advances a yearly period by
    /// whole years when `months` is a multiple of 12, otherwise by months
    /// starting from January.
    pub fn plus_months(&self, months: u32) -> Self {
        match self.month {
            Some(m) => {
                let zero_based = (self.year as i64) * 12 + (m as i64 - 1) + months as i64;
                Self {
                    year: (zero_based.div_euclid(12)) as i32,
                    month: Some((zero_based.rem_euclid(12) + 1) as u32),
                }
            }
            None => Self {
                year: self.year + (months / 12) as i32,
                month: None,
            },
        }
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.month {
            Some(m) => write!(f, "{:04}-{:02}", self.year, m),
            None => write!(f, "{:04}", self.year),
        }
    }
}

/// Clamps a configured day-of-month to a real date in the given month.
///
/// Schedules store issue/due days like 31; in February the date becomes the
/// last day of the month rather than spilling into March.
pub fn clamp_to_month(year: i32, month: u32, day: u32) -> NaiveDate {
    let last = last_day_of_month(year, month);
    NaiveDate::from_ymd_opt(year, month, day.min(last)).expect("clamped day is valid")
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_y, next_m) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_y, next_m, 1)
        .expect("valid first of month")
        .pred_opt()
        .expect("not date min")
        .day()
}

/// Whole months elapsed between two dates, ignoring partial months.
pub fn whole_months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    if to <= from {
        return 0;
    }
    let mut months =
        (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64);
    if to.day() < from.day() {
        months -= 1;
    }
    months.max(0)
}

/// An effectivity window `[from, to?]`, end-inclusive, open when `to` is None.
///
/// Generation rules and interest configurations use these; a concept may have
/// several rules over time but their windows must not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveWindow {
    pub from: NaiveDate,
    pub to: Option<NaiveDate>,
}

impl EffectiveWindow {
    pub fn new(from: NaiveDate, to: Option<NaiveDate>) -> Result<Self, TemporalError> {
        if let Some(to) = to {
            if from > to {
                return Err(TemporalError::InvalidWindow { from, to });
            }
        }
        Ok(Self { from, to })
    }

    pub fn open_from(from: NaiveDate) -> Self {
        Self { from, to: None }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && self.to.map_or(true, |to| date <= to)
    }

    pub fn overlaps(&self, other: &EffectiveWindow) -> bool {
        let self_to = self.to.unwrap_or(NaiveDate::MAX);
        let other_to = other.to.unwrap_or(NaiveDate::MAX);
        self.from <= other_to && other.from <= self_to
    }

    /// Closes an open window the day before `date`, so a successor rule can
    /// start on `date` without overlap.
    pub fn close_before(&mut self, date: NaiveDate) -> Result<(), TemporalError> {
        let to = date.pred_opt().unwrap_or(date);
        if to < self.from {
            return Err(TemporalError::InvalidWindow { from: self.from, to });
        }
        self.to = Some(to);
        Ok(())
    }
}

/// Timezone of a condominium, used to decide which local day "today" is when
/// a generation trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// The local calendar date of the given instant.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.0).date_naive()
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::UTC)
    }
}

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(Timezone)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_period_rolls_over_year() {
        let dec = BillingPeriod::monthly(2024, 12).unwrap();
        let jan = dec.plus_months(1);
        assert_eq!(jan, BillingPeriod::monthly(2025, 1).unwrap());
    }

    #[test]
    fn period_description_is_readable() {
        let p = BillingPeriod::monthly(2024, 3).unwrap();
        assert_eq!(p.description(), "March 2024");
        assert_eq!(p.to_string(), "2024-03");
    }

    #[test]
    fn day_clamps_to_february() {
        let d = clamp_to_month(2023, 2, 31);
        assert_eq!(d, NaiveDate::from_ymd_opt(2023, 2, 28).unwrap());
        let leap = clamp_to_month(2024, 2, 31);
        assert_eq!(leap, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn whole_months_ignore_partial() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(
            whole_months_between(from, NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()),
            1
        );
        assert_eq!(
            whole_months_between(from, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()),
            2
        );
        assert_eq!(whole_months_between(from, from), 0);
    }

    #[test]
    fn window_containment_and_overlap() {
        let w1 = EffectiveWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            Some(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()),
        )
        .unwrap();
        let w2 = EffectiveWindow::open_from(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());

        assert!(w1.contains(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()));
        assert!(!w1.contains(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()));
        assert!(!w1.overlaps(&w2));
        assert!(w2.contains(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()));
    }
}
