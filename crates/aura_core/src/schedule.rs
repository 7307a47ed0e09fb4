//! Date arithmetic shared by habits, routines and tasks.
//!
//! Everything here is pure: callers pass `today` in explicitly.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::frequency::{FrequencySpec, FrequencyUnit};

/// How a month interval is turned into days.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MonthPolicy {
    /// Calendar months; an overflowing day of month rolls into the next month.
    #[default]
    Calendar,
    /// Every month counts as thirty days, matching data written by the old backend.
    ThirtyDays,
}

impl FromStr for MonthPolicy {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "calendar" => Ok(MonthPolicy::Calendar),
            "thirty-days" | "thirty_days" | "30d" => Ok(MonthPolicy::ThirtyDays),
            other => Err(EngineError::invalid_frequency(format!(
                "unknown month policy `{other}`"
            ))),
        }
    }
}

pub fn add_interval(
    base: NaiveDate,
    unit: FrequencyUnit,
    multiplier: u32,
    policy: MonthPolicy,
) -> Option<NaiveDate> {
    let amount = i64::from(multiplier);
    match unit {
        FrequencyUnit::Days => base.checked_add_signed(Duration::days(amount)),
        FrequencyUnit::Weeks => base.checked_add_signed(Duration::weeks(amount)),
        FrequencyUnit::Months => match policy {
            MonthPolicy::Calendar => add_months_rolling(base, multiplier),
            MonthPolicy::ThirtyDays => base.checked_add_signed(Duration::days(amount * 30)),
        },
    }
}

/// The first due date after `base` for the given frequency, date-only.
pub fn next_occurrence(
    base: NaiveDate,
    frequency: &FrequencySpec,
    policy: MonthPolicy,
) -> EngineResult<NaiveDate> {
    add_interval(base, frequency.unit(), frequency.multiplier(), policy)
        .ok_or(EngineError::DateOverflow)
}

/// Time-of-day variant: the result carries the frequency's `HH:MM` (midnight
/// when unset) and is always strictly after `base`.
pub fn add_interval_at(
    base: NaiveDateTime,
    frequency: &FrequencySpec,
    policy: MonthPolicy,
) -> Option<NaiveDateTime> {
    let time = frequency.time_of_day().unwrap_or(NaiveTime::MIN);
    let mut date = add_interval(base.date(), frequency.unit(), frequency.multiplier(), policy)?;
    let mut candidate = date.and_time(time);
    let mut guard = 0;
    while candidate <= base {
        guard += 1;
        if guard > 2048 {
            return None;
        }
        date = add_interval(date, frequency.unit(), frequency.multiplier(), policy)?;
        candidate = date.and_time(time);
    }
    Some(candidate)
}

/// Whole days from `from` to `to`; negative when `to` is earlier.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    to.signed_duration_since(from).num_days()
}

/// Bounds user-entered deadlines to `[today, today + 1 year]`.
pub fn is_within_forward_year(date: NaiveDate, today: NaiveDate) -> bool {
    match add_months_rolling(today, 12) {
        Some(limit) => date >= today && date <= limit,
        None => false,
    }
}

/// Month addition without clamping: 31 January plus one month lands in March.
fn add_months_rolling(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    let total_months = i64::from(date.year()) * 12 + i64::from(date.month0()) + i64::from(months);
    let target_year = i32::try_from(total_months.div_euclid(12)).ok()?;
    let target_month = (total_months.rem_euclid(12) + 1) as u32;
    let first = NaiveDate::from_ymd_opt(target_year, target_month, 1)?;
    first.checked_add_signed(Duration::days(i64::from(date.day0())))
}

/// Urgency bucket for a days-remaining count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DueStatus {
    Overdue(i64),
    DueToday,
    DueSoon(i64),
    DueLater(i64),
}

impl DueStatus {
    pub fn classify(days_remaining: i64, due_soon_days: i64) -> Self {
        match days_remaining {
            d if d < 0 => DueStatus::Overdue(-d),
            0 => DueStatus::DueToday,
            d if d <= due_soon_days => DueStatus::DueSoon(d),
            d => DueStatus::DueLater(d),
        }
    }

    pub fn is_overdue(&self) -> bool {
        matches!(self, DueStatus::Overdue(_))
    }
}

impl fmt::Display for DueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DueStatus::Overdue(days) => write!(f, "Overdue by {days} day(s)"),
            DueStatus::DueToday => f.write_str("Due today"),
            DueStatus::DueSoon(days) | DueStatus::DueLater(days) => {
                write!(f, "Due in {days} day(s)")
            }
        }
    }
}

/// Accepts ISO `YYYY-MM-DD` and the legacy `dd-mm-yy` form (years 2000-2099).
pub fn parse_date(input: &str) -> EngineResult<NaiveDate> {
    let trimmed = input.trim();
    let iso_shaped = trimmed.split('-').next().map(str::len) == Some(4);
    let parsed = if iso_shaped {
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
    } else {
        parse_legacy_date(trimmed)
    };
    parsed.ok_or_else(|| EngineError::InvalidDate {
        input: trimmed.to_string(),
    })
}

fn parse_legacy_date(input: &str) -> Option<NaiveDate> {
    let mut parts = input.split('-');
    let day = parts.next()?;
    let month = parts.next()?;
    let year = parts.next()?;
    if parts.next().is_some() || year.len() != 2 || day.len() > 2 || month.len() > 2 {
        return None;
    }
    let day: u32 = day.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let year: i32 = year.parse().ok()?;
    NaiveDate::from_ymd_opt(2000 + year, month, day)
}

pub fn format_legacy_date(date: NaiveDate) -> String {
    date.format("%d-%m-%y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn adds_days_and_weeks() {
        let base = date(2024, 1, 1);
        assert_eq!(
            add_interval(base, FrequencyUnit::Days, 3, MonthPolicy::Calendar),
            Some(date(2024, 1, 4))
        );
        assert_eq!(
            add_interval(base, FrequencyUnit::Weeks, 2, MonthPolicy::Calendar),
            Some(date(2024, 1, 15))
        );
    }

    #[test]
    fn calendar_months_roll_over_instead_of_clamping() {
        assert_eq!(
            add_interval(date(2024, 1, 31), FrequencyUnit::Months, 1, MonthPolicy::Calendar),
            Some(date(2024, 3, 2))
        );
        assert_eq!(
            add_interval(date(2023, 1, 31), FrequencyUnit::Months, 1, MonthPolicy::Calendar),
            Some(date(2023, 3, 3))
        );
        assert_eq!(
            add_interval(date(2024, 11, 15), FrequencyUnit::Months, 3, MonthPolicy::Calendar),
            Some(date(2025, 2, 15))
        );
    }

    #[test]
    fn thirty_day_months_are_plain_day_counts() {
        assert_eq!(
            add_interval(date(2024, 1, 31), FrequencyUnit::Months, 2, MonthPolicy::ThirtyDays),
            Some(date(2024, 3, 31))
        );
    }

    #[test]
    fn time_of_day_variant_is_strictly_after_base() {
        let frequency = FrequencySpec::days(1)
            .unwrap()
            .with_time_of_day(NaiveTime::from_hms_opt(6, 30, 0).unwrap());
        let base = date(2024, 5, 10).and_hms_opt(21, 0, 0).unwrap();
        let next = add_interval_at(base, &frequency, MonthPolicy::Calendar).unwrap();
        assert_eq!(next, date(2024, 5, 11).and_hms_opt(6, 30, 0).unwrap());
        assert!(next > base);

        let untimed = FrequencySpec::weeks(1).unwrap();
        let next = add_interval_at(base, &untimed, MonthPolicy::Calendar).unwrap();
        assert_eq!(next, date(2024, 5, 17).and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn counts_days_in_both_directions() {
        assert_eq!(days_between(date(2024, 1, 1), date(2024, 1, 4)), 3);
        assert_eq!(days_between(date(2024, 1, 4), date(2024, 1, 1)), -3);
        assert_eq!(days_between(date(2024, 2, 28), date(2024, 3, 1)), 2);
    }

    #[test]
    fn forward_year_window_is_inclusive() {
        let today = date(2024, 6, 1);
        assert!(is_within_forward_year(today, today));
        assert!(is_within_forward_year(date(2025, 6, 1), today));
        assert!(!is_within_forward_year(date(2025, 6, 2), today));
        assert!(!is_within_forward_year(date(2024, 5, 31), today));
    }

    #[test]
    fn classifies_due_status() {
        assert_eq!(DueStatus::classify(-2, 3), DueStatus::Overdue(2));
        assert_eq!(DueStatus::classify(0, 3), DueStatus::DueToday);
        assert_eq!(DueStatus::classify(3, 3), DueStatus::DueSoon(3));
        assert_eq!(DueStatus::classify(4, 3), DueStatus::DueLater(4));
        assert_eq!(DueStatus::Overdue(2).to_string(), "Overdue by 2 day(s)");
        assert_eq!(DueStatus::DueSoon(1).to_string(), "Due in 1 day(s)");
    }

    #[test]
    fn parses_iso_and_legacy_dates() {
        assert_eq!(parse_date("2024-01-04").unwrap(), date(2024, 1, 4));
        assert_eq!(parse_date("04-01-24").unwrap(), date(2024, 1, 4));
        assert!(parse_date("31-02-24").is_err());
        assert!(parse_date("4/1/24").is_err());
        assert_eq!(format_legacy_date(date(2024, 1, 4)), "04-01-24");
    }

    #[test]
    fn month_policy_from_str() {
        assert_eq!("calendar".parse::<MonthPolicy>().unwrap(), MonthPolicy::Calendar);
        assert_eq!(
            "thirty-days".parse::<MonthPolicy>().unwrap(),
            MonthPolicy::ThirtyDays
        );
        assert!("lunar".parse::<MonthPolicy>().is_err());
    }
}
