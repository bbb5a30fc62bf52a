//! The rate fetcher: resolves currency codes to rates and histories against RUB.
//!
//! Every operation is best-effort. Unsupported codes, network failures, malformed
//! upstream payloads and missing entries all end up as [`Absent`] or an empty
//! history; the cause is logged and never returned.

use anyhow::Result;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::config::AppConfig;
use crate::core::{CryptoRateProvider, Currency, FiatRateProvider, RateHistory};
use crate::providers::{CbrProvider, CoinGeckoProvider};

/// No rate is available. Why is logged, not carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Absent;

impl Display for Absent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rate not available")
    }
}

impl std::error::Error for Absent {}

pub type Lookup<T> = std::result::Result<T, Absent>;

#[derive(Clone)]
pub struct RateFetcher {
    fiat: Arc<dyn FiatRateProvider>,
    crypto: Arc<dyn CryptoRateProvider>,
    fiat_pause: Duration,
}

impl RateFetcher {
    pub fn new(fiat: Arc<dyn FiatRateProvider>, crypto: Arc<dyn CryptoRateProvider>) -> Self {
        RateFetcher {
            fiat,
            crypto,
            fiat_pause: Duration::from_millis(100),
        }
    }

    /// Pause after each request in [`RateFetcher::get_all_fiat_rates`].
    pub fn with_fiat_pause(mut self, pause: Duration) -> Self {
        self.fiat_pause = pause;
        self
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let cbr = config.cbr();
        let gecko = config.coingecko();
        let fiat = CbrProvider::new(&cbr.base_url, Duration::from_secs(cbr.timeout_secs))?;
        let crypto = CoinGeckoProvider::new(
            &gecko.base_url,
            Duration::from_secs(gecko.timeout_secs),
            Duration::from_secs(gecko.chart_timeout_secs),
        )?;
        Ok(Self::new(Arc::new(fiat), Arc::new(crypto))
            .with_fiat_pause(Duration::from_millis(config.providers.fiat_pause_ms)))
    }

    /// Rate on `date`, or today's rate when `date` is `None`.
    pub async fn get_fiat_rate(&self, code: &str, date: Option<NaiveDate>) -> Lookup<f64> {
        let Some(currency) = Currency::fiat(code) else {
            debug!("Unsupported fiat currency: {}", code);
            return Err(Absent);
        };

        self.fiat.fetch_rate(currency, date).await.map_err(|e| {
            warn!(code, ?date, "Failed to fetch fiat rate: {e:#}");
            Absent
        })
    }

    /// Published rates in `[start, end]`, ascending by date. Empty when nothing could be fetched.
    pub async fn get_fiat_rates_history(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RateHistory {
        let Some(currency) = Currency::fiat(code) else {
            debug!("Unsupported fiat currency: {}", code);
            return Vec::new();
        };

        self.fiat
            .fetch_history(currency, start, end)
            .await
            .unwrap_or_else(|e| {
                warn!(code, %start, %end, "Failed to fetch fiat history: {e:#}");
                Vec::new()
            })
    }

    pub async fn get_crypto_rate(&self, code: &str) -> Lookup<f64> {
        let Some(currency) = Currency::crypto(code) else {
            debug!("Unsupported crypto currency: {}", code);
            return Err(Absent);
        };

        match self.crypto.fetch_rates(&[currency]).await {
            Ok(rates) => rates.get(currency.code).copied().ok_or_else(|| {
                warn!(code, "No RUB price in crypto response");
                Absent
            }),
            Err(e) => {
                warn!(code, "Failed to fetch crypto rate: {e:#}");
                Err(Absent)
            }
        }
    }

    /// Prices dated within `[start, end]`, ascending. Several samples per day are normal.
    pub async fn get_crypto_rates_history(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RateHistory {
        let Some(currency) = Currency::crypto(code) else {
            debug!("Unsupported crypto currency: {}", code);
            return Vec::new();
        };

        self.crypto
            .fetch_history(currency, start, end)
            .await
            .unwrap_or_else(|e| {
                warn!(code, %start, %end, "Failed to fetch crypto history: {e:#}");
                Vec::new()
            })
    }

    /// One request per fiat currency, strictly sequential. Failed codes are left out.
    pub async fn get_all_fiat_rates(&self, date: Option<NaiveDate>) -> BTreeMap<String, f64> {
        let mut rates = BTreeMap::new();
        for currency in Currency::all_fiat() {
            if let Ok(rate) = self.get_fiat_rate(currency.code, date).await {
                rates.insert(currency.code.to_string(), rate);
            }
            tokio::time::sleep(self.fiat_pause).await;
        }
        debug!(resolved = rates.len(), "Fetched fiat rates");
        rates
    }

    /// One batched request for every crypto currency. Missing coins are left out.
    pub async fn get_all_crypto_rates(&self) -> BTreeMap<String, f64> {
        let currencies: Vec<Currency> = Currency::all_crypto().collect();
        match self.crypto.fetch_rates(&currencies).await {
            Ok(rates) => rates.into_iter().collect(),
            Err(e) => {
                warn!("Failed to fetch crypto rates: {e:#}");
                BTreeMap::new()
            }
        }
    }

    /// Dispatches to the fiat or crypto history by the code's class.
    pub async fn get_history(
        &self,
        currency: Currency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RateHistory {
        if currency.is_crypto() {
            self.get_crypto_rates_history(currency.code, start, end).await
        } else {
            self.get_fiat_rates_history(currency.code, start, end).await
        }
    }
}
