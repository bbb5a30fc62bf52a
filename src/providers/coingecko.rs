use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::core::{CryptoRateProvider, Currency, RateHistory, RateSample, rate::sort_by_date};

const VS_CURRENCY: &str = "rub";

/// Crypto prices in RUB from the CoinGecko public API.
pub struct CoinGeckoProvider {
    base_url: String,
    client: reqwest::Client,
    chart_timeout: Duration,
}

impl CoinGeckoProvider {
    pub fn new(base_url: &str, timeout: Duration, chart_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("rubrates/1.0")
            .timeout(timeout)
            .build()?;
        Ok(CoinGeckoProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            chart_timeout,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        timeout: Option<Duration>,
    ) -> Result<T> {
        debug!("Requesting CoinGecko data from {}", url);
        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request
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

        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON response for URL: {url}"))
    }
}

/// `{"bitcoin": {"rub": 6000000.0}, ...}`
type SimplePriceResponse = HashMap<String, HashMap<String, Option<f64>>>;

#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    #[serde(default)]
    prices: Vec<(f64, f64)>,
    error: Option<serde_json::Value>,
}

fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Unix-second bounds covering whole calendar days `start..=end` in UTC.
fn window_bounds(start: NaiveDate, end: NaiveDate) -> (i64, i64) {
    let from = start.and_time(NaiveTime::MIN).and_utc().timestamp();
    let to = end
        .and_hms_opt(23, 59, 59)
        .unwrap_or(end.and_time(NaiveTime::MIN))
        .and_utc()
        .timestamp();
    (from, to)
}

/// Converts upstream `[millis, price]` points into samples dated within `start..=end`.
/// Non-positive prices are dropped.
fn samples_in_window(
    prices: &[(f64, f64)],
    currency: Currency,
    start: NaiveDate,
    end: NaiveDate,
) -> RateHistory {
    let mut history: RateHistory = prices
        .iter()
        .filter_map(|&(millis, price)| {
            let timestamp = DateTime::from_timestamp_millis(millis as i64)?;
            let date = timestamp.naive_utc();
            ((start..=end).contains(&date.date()) && is_valid_price(price))
                .then(|| RateSample::new(date, price, currency.code))
        })
        .collect();
    sort_by_date(&mut history);
    history
}

#[async_trait]
impl CryptoRateProvider for CoinGeckoProvider {
    #[instrument(
        name = "CoinGeckoPriceFetch",
        skip(self, currencies),
        fields(count = currencies.len())
    )]
    async fn fetch_rates(&self, currencies: &[Currency]) -> Result<HashMap<String, f64>> {
        let ids = currencies
            .iter()
            .map(|c| c.provider_id)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies={}",
            self.base_url, ids, VS_CURRENCY
        );

        let data: SimplePriceResponse = self.get_json(&url, None).await?;

        let rates = currencies
            .iter()
            .filter_map(|currency| {
                let price = data
                    .get(currency.provider_id)
                    .and_then(|quotes| quotes.get(VS_CURRENCY))
                    .copied()
                    .flatten()
                    .filter(|&p| is_valid_price(p));
                if price.is_none() {
                    debug!("No RUB price for {} in response", currency.code);
                }
                price.map(|p| (currency.code.to_string(), p))
            })
            .collect();
        Ok(rates)
    }

    #[instrument(name = "CoinGeckoHistoryFetch", skip(self), fields(code = %currency.code))]
    async fn fetch_history(
        &self,
        currency: Currency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RateHistory> {
        let (from, to) = window_bounds(start, end);
        let url = format!(
            "{}/coins/{}/market_chart/range?vs_currency={}&from={}&to={}",
            self.base_url, currency.provider_id, VS_CURRENCY, from, to
        );

        let data: MarketChartResponse = self.get_json(&url, Some(self.chart_timeout)).await?;

        if data.prices.is_empty() {
            match data.error {
                Some(error) => warn!(%error, "CoinGecko returned an error payload"),
                None => warn!("CoinGecko returned no prices for {}", currency.code),
            }
            return Ok(Vec::new());
        }

        let history = samples_in_window(&data.prices, currency, start, end);
        debug!(
            received = data.prices.len(),
            kept = history.len(),
            "Filtered CoinGecko prices to window"
        );
        Ok(history)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn millis(y: i32, m: u32, d: u32, h: u32) -> i64 {
        date(y, m, d)
            .and_hms_opt(h, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    fn provider(server: &MockServer) -> CoinGeckoProvider {
        CoinGeckoProvider::new(
            &server.uri(),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn btc() -> Currency {
        Currency::crypto("BTC").unwrap()
    }

    /// Prices for 2024-03-01..=2024-03-02 plus one point on each side of the window.
    pub(crate) fn btc_chart_body() -> String {
        format!(
            r#"{{
                "prices": [
                    [{}, 5900000.0],
                    [{}, 6100000.5],
                    [{}, 6000000.0],
                    [{}, 6200000.0],
                    [{}, 6300000.0]
                ],
                "market_caps": [],
                "total_volumes": []
            }}"#,
            millis(2024, 2, 29, 23),
            millis(2024, 3, 1, 12),
            millis(2024, 3, 1, 0),
            millis(2024, 3, 2, 23),
            millis(2024, 3, 3, 0),
        )
    }

    #[test]
    fn test_window_bounds_cover_whole_days() {
        let (from, to) = window_bounds(date(2024, 3, 1), date(2024, 3, 2));
        assert_eq!(from, 1709251200);
        assert_eq!(to, 1709423999);
    }

    #[tokio::test]
    async fn test_successful_rates_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .and(query_param("ids", "bitcoin,ethereum,ripple"))
            .and(query_param("vs_currencies", "rub"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"bitcoin": {"rub": 6000000.0}, "ethereum": {"usd": 3000.0}}"#,
            ))
            .mount(&server)
            .await;

        let currencies = ["BTC", "ETH", "XRP"].map(|c| Currency::crypto(c).unwrap());
        let rates = provider(&server).fetch_rates(&currencies).await.unwrap();

        assert_eq!(rates.len(), 1);
        assert_eq!(rates.get("BTC"), Some(&6000000.0));
    }

    #[tokio::test]
    async fn test_non_positive_prices_are_omitted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"bitcoin": {"rub": 0.0}, "ethereum": {"rub": -5.0}, "ripple": {"rub": 55.5}}"#,
            ))
            .mount(&server)
            .await;

        let currencies = ["BTC", "ETH", "XRP"].map(|c| Currency::crypto(c).unwrap());
        let rates = provider(&server).fetch_rates(&currencies).await.unwrap();

        assert_eq!(rates.len(), 1);
        assert_eq!(rates.get("XRP"), Some(&55.5));
    }

    #[test]
    fn test_window_drops_non_positive_prices() {
        let prices = [
            (millis(2024, 3, 1, 0) as f64, 0.0),
            (millis(2024, 3, 1, 6) as f64, -1.0),
            (millis(2024, 3, 1, 12) as f64, 6100000.5),
        ];
        let history = samples_in_window(&prices, btc(), date(2024, 3, 1), date(2024, 3, 2));

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].rate, 6100000.5);
    }

    #[tokio::test]
    async fn test_rates_api_error_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = provider(&server).fetch_rates(&[btc()]).await.unwrap_err();
        assert!(
            err.to_string()
                .starts_with("HTTP error: 429 Too Many Requests for URL:")
        );
    }

    #[tokio::test]
    async fn test_history_is_filtered_and_sorted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/bitcoin/market_chart/range"))
            .and(query_param("vs_currency", "rub"))
            .and(query_param("from", "1709251200"))
            .and(query_param("to", "1709423999"))
            .respond_with(ResponseTemplate::new(200).set_body_string(btc_chart_body()))
            .mount(&server)
            .await;

        let (start, end) = (date(2024, 3, 1), date(2024, 3, 2));
        let history = provider(&server)
            .fetch_history(btc(), start, end)
            .await
            .unwrap();

        let rates: Vec<f64> = history.iter().map(|s| s.rate).collect();
        assert_eq!(rates, vec![6000000.0, 6100000.5, 6200000.0]);
        assert!(history.iter().all(|s| (start..=end).contains(&s.day())));
        assert!(history.windows(2).all(|w| w[0].date <= w[1].date));
        assert_eq!(history[1].date.format("%H:%M").to_string(), "12:00");
    }

    #[tokio::test]
    async fn test_history_error_payload_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/bitcoin/market_chart/range"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"error": "coin not found"}"#),
            )
            .mount(&server)
            .await;

        let history = provider(&server)
            .fetch_history(btc(), date(2024, 3, 1), date(2024, 3, 2))
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_history_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/bitcoin/market_chart/range"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"prices": [["soon", 1.0]]}"#),
            )
            .mount(&server)
            .await;

        let err = provider(&server)
            .fetch_history(btc(), date(2024, 3, 1), date(2024, 3, 2))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to parse JSON response"));
    }
}
