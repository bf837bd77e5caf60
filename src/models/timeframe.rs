//! Frequency and period strings such as `"5minute"` or `"6month"`.

use std::str::FromStr;

use crate::TickercastError;

const MINUTE_MS: i64 = 60_000;
const DAY_MS: i64 = 24 * 60 * MINUTE_MS;

/// Sampling unit of a [`Frequency`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyUnit {
    Minute,
    Daily,
    Weekly,
    /// Fixed at 30 days per step.
    Monthly,
}

impl FrequencyUnit {
    /// Wire name used for the provider's `frequencyType` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyUnit::Minute => "minute",
            FrequencyUnit::Daily => "daily",
            FrequencyUnit::Weekly => "weekly",
            FrequencyUnit::Monthly => "monthly",
        }
    }

    fn step_ms(&self) -> i64 {
        match self {
            FrequencyUnit::Minute => MINUTE_MS,
            FrequencyUnit::Daily => DAY_MS,
            FrequencyUnit::Weekly => 7 * DAY_MS,
            FrequencyUnit::Monthly => 30 * DAY_MS,
        }
    }
}

/// A parsed sampling granularity, e.g. `"5minute"` is 5 × minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frequency {
    pub multiplier: u32,
    pub unit: FrequencyUnit,
}

impl Frequency {
    /// Length of one candle in milliseconds. Parsed frequencies always fit;
    /// a hand-built one saturates at `i64::MAX`.
    pub fn step_ms(&self) -> i64 {
        i64::from(self.multiplier).saturating_mul(self.unit.step_ms())
    }
}

impl FromStr for Frequency {
    type Err = TickercastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || TickercastError::UnknownFrequency(s.to_string());
        let (multiplier, unit) = split_multiplier(s).ok_or_else(unknown)?;

        let unit = match unit.as_str() {
            "minute" | "min" => FrequencyUnit::Minute,
            "daily" | "day" => FrequencyUnit::Daily,
            "weekly" | "week" => FrequencyUnit::Weekly,
            "monthly" | "month" => FrequencyUnit::Monthly,
            _ => return Err(unknown()),
        };

        i64::from(multiplier)
            .checked_mul(unit.step_ms())
            .ok_or_else(unknown)?;

        Ok(Frequency { multiplier, unit })
    }
}

/// Unit of a historical [`Period`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodUnit {
    Day,
    Month,
    Year,
    /// Year to date.
    Ytd,
}

impl PeriodUnit {
    /// Wire name used for the provider's `periodType` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodUnit::Day => "day",
            PeriodUnit::Month => "month",
            PeriodUnit::Year => "year",
            PeriodUnit::Ytd => "ytd",
        }
    }
}

/// A parsed historical window, e.g. `"6month"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub multiplier: u32,
    pub unit: PeriodUnit,
}

impl FromStr for Period {
    type Err = TickercastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || TickercastError::UnknownPeriod(s.to_string());
        let (multiplier, unit) = split_multiplier(s).ok_or_else(unknown)?;

        let unit = match unit.as_str() {
            "day" => PeriodUnit::Day,
            "month" => PeriodUnit::Month,
            "year" => PeriodUnit::Year,
            "ytd" => PeriodUnit::Ytd,
            _ => return Err(unknown()),
        };

        Ok(Period { multiplier, unit })
    }
}

/// Splits `"10daily"` into `(10, "daily")`. A missing number means 1;
/// zero is rejected.
fn split_multiplier(s: &str) -> Option<(u32, String)> {
    let s = s.trim();
    let digits_end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (digits, unit) = s.split_at(digits_end);

    let multiplier = if digits.is_empty() {
        1
    } else {
        digits.parse().ok()?
    };

    if multiplier == 0 || unit.is_empty() {
        return None;
    }

    Some((multiplier, unit.to_ascii_lowercase()))
}
