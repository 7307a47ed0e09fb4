use std::fmt;
use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyUnit {
    Days,
    Weeks,
    Months,
}

impl FrequencyUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyUnit::Days => "days",
            FrequencyUnit::Weeks => "weeks",
            FrequencyUnit::Months => "months",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "d" | "day" | "days" => Some(FrequencyUnit::Days),
            "w" | "week" | "weeks" => Some(FrequencyUnit::Weeks),
            "m" | "month" | "months" => Some(FrequencyUnit::Months),
            _ => None,
        }
    }
}

impl fmt::Display for FrequencyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether completing a habit is something to be rewarded or penalised.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Good,
    Bad,
}

impl Polarity {
    pub fn from_sign(value: i64) -> Self {
        if value >= 0 {
            Polarity::Good
        } else {
            Polarity::Bad
        }
    }

    pub fn is_good(&self) -> bool {
        matches!(self, Polarity::Good)
    }
}

/// How often a recurring item repeats: every `multiplier` `unit`s.
///
/// Values of this type have passed boundary validation; `multiplier` is
/// always at least one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "StoredFrequency")]
pub struct FrequencySpec {
    unit: FrequencyUnit,
    multiplier: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    occurrences_per_period: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_of_day: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    polarity: Option<Polarity>,
}

impl FrequencySpec {
    pub fn new(unit: FrequencyUnit, multiplier: u32) -> EngineResult<Self> {
        if multiplier == 0 {
            return Err(EngineError::invalid_frequency(
                "multiplier must be at least 1",
            ));
        }
        Ok(Self {
            unit,
            multiplier,
            occurrences_per_period: None,
            time_of_day: None,
            polarity: None,
        })
    }

    pub fn days(multiplier: u32) -> EngineResult<Self> {
        Self::new(FrequencyUnit::Days, multiplier)
    }

    pub fn weeks(multiplier: u32) -> EngineResult<Self> {
        Self::new(FrequencyUnit::Weeks, multiplier)
    }

    pub fn months(multiplier: u32) -> EngineResult<Self> {
        Self::new(FrequencyUnit::Months, multiplier)
    }

    pub fn with_time_of_day(mut self, time: NaiveTime) -> Self {
        self.time_of_day = Some(time);
        self
    }

    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = Some(polarity);
        self
    }

    pub fn with_occurrences(mut self, count: u32) -> EngineResult<Self> {
        if count == 0 {
            return Err(EngineError::invalid_frequency(
                "occurrences per period must be at least 1",
            ));
        }
        self.occurrences_per_period = Some(count);
        Ok(self)
    }

    pub fn unit(&self) -> FrequencyUnit {
        self.unit
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Carried for display only; the date math never divides by it.
    pub fn occurrences_per_period(&self) -> Option<u32> {
        self.occurrences_per_period
    }

    pub fn time_of_day(&self) -> Option<NaiveTime> {
        self.time_of_day
    }

    pub fn polarity(&self) -> Option<Polarity> {
        self.polarity
    }
}

impl fmt::Display for FrequencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "every {} {}", self.multiplier, self.unit)?;
        if let Some(time) = self.time_of_day {
            write!(f, " at {}", time.format("%H:%M"))?;
        }
        Ok(())
    }
}

/// On-disk shape; deserialization re-checks the invariants of [`FrequencySpec`].
#[derive(Deserialize)]
struct StoredFrequency {
    unit: FrequencyUnit,
    multiplier: u32,
    #[serde(default)]
    occurrences_per_period: Option<u32>,
    #[serde(default)]
    time_of_day: Option<NaiveTime>,
    #[serde(default)]
    polarity: Option<Polarity>,
}

impl TryFrom<StoredFrequency> for FrequencySpec {
    type Error = EngineError;

    fn try_from(stored: StoredFrequency) -> Result<Self, Self::Error> {
        let mut spec = FrequencySpec::new(stored.unit, stored.multiplier)?;
        if let Some(count) = stored.occurrences_per_period {
            spec = spec.with_occurrences(count)?;
        }
        spec.time_of_day = stored.time_of_day;
        spec.polarity = stored.polarity;
        Ok(spec)
    }
}

/// Parses compact repeater tokens such as `3d`, `+2w` or `.+1m`.
impl FromStr for FrequencySpec {
    type Err = EngineError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let trimmed = token.trim();
        let normalized = trimmed.trim_start_matches('.').trim_start_matches('+');
        let digits_len = normalized
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .count();
        if digits_len == 0 {
            return Err(EngineError::invalid_frequency(format!(
                "missing repeat count in `{trimmed}`"
            )));
        }
        let multiplier: u32 = normalized[..digits_len].parse().map_err(|_| {
            EngineError::invalid_frequency(format!("repeat count out of range in `{trimmed}`"))
        })?;
        let unit = FrequencyUnit::parse(&normalized[digits_len..]).ok_or_else(|| {
            EngineError::invalid_frequency(format!("unknown unit in `{trimmed}`"))
        })?;
        Self::new(unit, multiplier)
    }
}

/// Loosely typed frequency as received from an outer layer, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawFrequency {
    pub unit: String,
    pub multiplier: i64,
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub good: Option<bool>,
}

impl RawFrequency {
    pub fn validate(&self) -> EngineResult<FrequencySpec> {
        let unit = FrequencyUnit::parse(&self.unit).ok_or_else(|| {
            EngineError::invalid_frequency(format!("unknown unit `{}`", self.unit))
        })?;
        if self.multiplier <= 0 {
            return Err(EngineError::invalid_frequency(format!(
                "multiplier must be positive, got {}",
                self.multiplier
            )));
        }
        let multiplier = u32::try_from(self.multiplier).map_err(|_| {
            EngineError::invalid_frequency(format!("multiplier {} is too large", self.multiplier))
        })?;
        let mut spec = FrequencySpec::new(unit, multiplier)?;

        if let Some(count) = self.count {
            let count = u32::try_from(count)
                .map_err(|_| EngineError::invalid_frequency(format!("invalid count {count}")))?;
            spec = spec.with_occurrences(count)?;
        }
        if let Some(time) = self.time.as_deref().filter(|t| !t.trim().is_empty()) {
            spec = spec.with_time_of_day(parse_time_of_day(time)?);
        }
        if let Some(good) = self.good {
            spec = spec.with_polarity(if good { Polarity::Good } else { Polarity::Bad });
        }
        Ok(spec)
    }
}

fn parse_time_of_day(value: &str) -> EngineResult<NaiveTime> {
    let value = value.trim();
    let valid_shape = value.len() == 5
        && value.as_bytes()[2] == b':'
        && value
            .chars()
            .enumerate()
            .all(|(idx, c)| idx == 2 || c.is_ascii_digit());
    if !valid_shape {
        return Err(EngineError::invalid_frequency(format!(
            "time of day `{value}` is not HH:MM"
        )));
    }
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| {
        EngineError::invalid_frequency(format!("time of day `{value}` is out of range"))
    })
}
