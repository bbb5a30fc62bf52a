use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveTime};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::{Currency, FiatRateProvider, RateHistory, RateSample, rate::sort_by_date};

const QUERY_DATE_FORMAT: &str = "%d/%m/%Y";
const RECORD_DATE_FORMAT: &str = "%d.%m.%Y";

/// Official fiat rates from the Central Bank of Russia XML scripts.
pub struct CbrProvider {
    base_url: String,
    client: reqwest::Client,
}

impl CbrProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("rubrates/1.0")
            .timeout(timeout)
            .build()?;
        Ok(CbrProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn daily_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/scripts/XML_daily.asp?date_req={}",
            self.base_url,
            date.format(QUERY_DATE_FORMAT)
        )
    }

    fn dynamic_url(&self, provider_id: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}/scripts/XML_dynamic.asp?date_req1={}&date_req2={}&VAL_NM_RQ={}",
            self.base_url,
            start.format(QUERY_DATE_FORMAT),
            end.format(QUERY_DATE_FORMAT),
            provider_id
        )
    }

    async fn fetch_document(&self, url: &str) -> Result<ValCurs> {
        debug!("Requesting CBR data from {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request error for URL: {url}"))?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error: {} for URL: {}", response.status(), url));
        }

        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to get response text for URL: {url}"))?;

        if text.trim().is_empty() {
            return Err(anyhow!("Received empty response for URL: {}", url));
        }

        quick_xml::de::from_str(&text)
            .with_context(|| format!("Failed to parse CBR XML response for URL: {url}"))
    }
}

#[derive(Debug, Deserialize)]
struct ValCurs {
    #[serde(rename = "Valute", default)]
    valutes: Vec<Valute>,
    #[serde(rename = "Record", default)]
    records: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct Valute {
    #[serde(rename = "@ID")]
    id: String,
    #[serde(rename = "CharCode")]
    char_code: String,
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Debug, Deserialize)]
struct Record {
    #[serde(rename = "@Date")]
    date: String,
    #[serde(rename = "@Id")]
    id: String,
    #[serde(rename = "Value")]
    value: String,
}

/// Parses a decimal-comma value such as `92,5058`.
pub(crate) fn parse_decimal_comma(value: &str) -> Result<f64> {
    let rate: f64 = value
        .trim()
        .replace(',', ".")
        .parse()
        .with_context(|| format!("Invalid rate value: '{value}'"))?;
    if !rate.is_finite() || rate <= 0.0 {
        return Err(anyhow!("Rate must be positive, got: '{}'", value));
    }
    Ok(rate)
}

impl ValCurs {
    /// Finds the value for `currency`: by identifier first, then by ticker.
    fn find_value(&self, currency: Currency) -> Option<&str> {
        self.valutes
            .iter()
            .find(|v| v.id == currency.provider_id)
            .map(|v| v.value.as_str())
            .or_else(|| {
                self.records
                    .iter()
                    .find(|r| r.id == currency.provider_id)
                    .map(|r| r.value.as_str())
            })
            .or_else(|| {
                self.valutes
                    .iter()
                    .find(|v| v.char_code == currency.code)
                    .map(|v| v.value.as_str())
            })
    }

    fn into_history(self, currency: Currency) -> Result<RateHistory> {
        let mut history = self
            .records
            .into_iter()
            .map(|record| {
                let date = NaiveDate::parse_from_str(&record.date, RECORD_DATE_FORMAT)
                    .with_context(|| format!("Invalid record date: '{}'", record.date))?;
                let rate = parse_decimal_comma(&record.value)?;
                Ok(RateSample::new(date.and_time(NaiveTime::MIN), rate, currency.code))
            })
            .collect::<Result<RateHistory>>()?;
        sort_by_date(&mut history);
        Ok(history)
    }
}

#[async_trait]
impl FiatRateProvider for CbrProvider {
    #[instrument(name = "CbrRateFetch", skip(self), fields(code = %currency.code))]
    async fn fetch_rate(&self, currency: Currency, date: Option<NaiveDate>) -> Result<f64> {
        let today = Local::now().date_naive();
        let url = match date {
            Some(date) if date != today => self.dynamic_url(currency.provider_id, date, date),
            _ => self.daily_url(today),
        };

        let document = self.fetch_document(&url).await?;
        let value = document
            .find_value(currency)
            .ok_or_else(|| anyhow!("No rate data found for currency: {}", currency.code))?;
        parse_decimal_comma(value)
    }

    #[instrument(name = "CbrHistoryFetch", skip(self), fields(code = %currency.code))]
    async fn fetch_history(
        &self,
        currency: Currency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RateHistory> {
        let url = self.dynamic_url(currency.provider_id, start, end);
        let history = self.fetch_document(&url).await?.into_history(currency)?;
        debug!(samples = history.len(), "Parsed CBR history");
        Ok(history)
    }
}
