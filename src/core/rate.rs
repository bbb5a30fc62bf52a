//! Rate samples and the provider abstractions behind them

use super::currency::Currency;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::HashMap;

/// One observed rate of a currency against RUB.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSample {
    pub date: NaiveDateTime,
    pub rate: f64,
    pub currency: String,
}

impl RateSample {
    pub fn new(date: NaiveDateTime, rate: f64, currency: &str) -> Self {
        Self {
            date,
            rate,
            currency: currency.to_string(),
        }
    }

    /// Calendar day of the observation.
    pub fn day(&self) -> NaiveDate {
        self.date.date()
    }
}

/// Samples for one currency, non-decreasing by date.
pub type RateHistory = Vec<RateSample>;

/// Orders samples by date, keeping upstream order for equal timestamps.
pub fn sort_by_date(history: &mut RateHistory) {
    history.sort_by_key(|sample| sample.date);
}

#[async_trait]
pub trait FiatRateProvider: Send + Sync {
    /// Rate on `date`, or today's published rate when `date` is `None`.
    async fn fetch_rate(&self, currency: Currency, date: Option<NaiveDate>) -> Result<f64>;

    async fn fetch_history(
        &self,
        currency: Currency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RateHistory>;
}

#[async_trait]
pub trait CryptoRateProvider: Send + Sync {
    /// Current RUB prices keyed by ticker. Coins the upstream omits are absent from the map.
    async fn fetch_rates(&self, currencies: &[Currency]) -> Result<HashMap<String, f64>>;

    async fn fetch_history(
        &self,
        currency: Currency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RateHistory>;
}
