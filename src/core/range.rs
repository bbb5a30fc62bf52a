//! History periods and the validation applied before a history request

use super::currency::AssetClass;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Longest custom range accepted for any currency.
pub const MAX_CUSTOM_DAYS: i64 = 1825;
/// Longest range the crypto upstream serves in one request.
pub const MAX_CRYPTO_DAYS: i64 = 365;

/// Earliest date the crypto upstream has data for.
pub fn crypto_min_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2013, 1, 1).expect("valid constant date")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("Both start_date and end_date are required for a custom period")]
    MissingBounds,
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("Start date must be earlier than end date")]
    NotIncreasing,
    #[error("The period must not exceed {max_days} days")]
    TooLong { max_days: i64 },
    #[error(
        "Crypto history is limited to {max_days} days per request, requested {days} days"
    )]
    CryptoTooLong { max_days: i64, days: i64 },
    #[error("The earliest date for crypto history is {0}")]
    CryptoTooEarly(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    SevenDays,
    ThirtyDays,
    NinetyDays,
    OneYear,
    Custom,
}

impl Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Period::SevenDays => "7d",
                Period::ThirtyDays => "30d",
                Period::NinetyDays => "90d",
                Period::OneYear => "1y",
                Period::Custom => "custom",
            }
        )
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "7d" => Ok(Period::SevenDays),
            "30d" => Ok(Period::ThirtyDays),
            "90d" => Ok(Period::NinetyDays),
            "1y" => Ok(Period::OneYear),
            "custom" => Ok(Period::Custom),
            _ => Err(anyhow::anyhow!("Invalid period: {}", s)),
        }
    }
}

impl Period {
    /// Parses a request parameter, falling back to seven days for anything unknown.
    pub fn from_param(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or(Period::SevenDays)
    }

    /// Length of a preset period. Custom periods have none.
    pub fn to_duration(&self) -> Option<Duration> {
        match self {
            Period::SevenDays => Some(Duration::days(7)),
            Period::ThirtyDays => Some(Duration::days(30)),
            Period::NinetyDays => Some(Duration::days(90)),
            Period::OneYear => Some(Duration::days(365)),
            Period::Custom => None,
        }
    }
}

/// A validated `[start, end]` pair with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RangeError> {
        if start >= end {
            return Err(RangeError::NotIncreasing);
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Resolves request parameters into a range that the upstream for `class` can serve.
    pub fn resolve(
        period: Period,
        start: Option<&str>,
        end: Option<&str>,
        class: AssetClass,
        today: NaiveDate,
    ) -> Result<Self, RangeError> {
        let range = match period.to_duration() {
            Some(duration) => DateRange::new(today - duration, today)?,
            None => {
                let (Some(start), Some(end)) = (non_empty(start), non_empty(end)) else {
                    return Err(RangeError::MissingBounds);
                };
                let range = DateRange::new(parse_date(start)?, parse_date(end)?)?;
                if range.days() > MAX_CUSTOM_DAYS {
                    return Err(RangeError::TooLong {
                        max_days: MAX_CUSTOM_DAYS,
                    });
                }
                range
            }
        };

        if class == AssetClass::Crypto {
            if range.days() > MAX_CRYPTO_DAYS {
                return Err(RangeError::CryptoTooLong {
                    max_days: MAX_CRYPTO_DAYS,
                    days: range.days(),
                });
            }
            if range.start < crypto_min_date() {
                return Err(RangeError::CryptoTooEarly(crypto_min_date()));
            }
        }

        Ok(range)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn parse_date(value: &str) -> Result<NaiveDate, RangeError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| RangeError::InvalidDate(value.to_string()))
}
