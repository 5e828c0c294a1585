mod synthetic;

pub use synthetic::SyntheticSupplier;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use reqwest::Client;
use serde::Deserialize;
use sim_core::{PricePoint, PriceSupplier, SimError};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

const DEFAULT_BASE_URL: &str = "https://api.frankfurter.app";

#[derive(Error, Debug)]
pub enum RatesError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Rate limited after {0} retries")]
    RateLimited(u32),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid symbol '{0}', expected BASE/QUOTE")]
    InvalidSymbol(String),
}

impl From<RatesError> for SimError {
    fn from(err: RatesError) -> Self {
        SimError::DataSource(err.to_string())
    }
}

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let sleep_dur = match ts.front() {
                Some(&oldest) => (oldest + self.window).duration_since(now) + Duration::from_millis(50),
                None => Duration::from_millis(50),
            };
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for rates API slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Configuration for the historical rates API
#[derive(Debug, Clone)]
pub struct RatesConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub requests_per_minute: usize,
    pub timeout: Duration,
    pub retry_wait: Duration,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            requests_per_minute: 60,
            timeout: Duration::from_secs(30),
            retry_wait: Duration::from_secs(15),
        }
    }
}

/// Historical FX time series client.
///
/// Quotes come back rate-style (units of QUOTE per one BASE of the request),
/// so a pair `EUR/USD` is requested as `from=USD&to=EUR` and each price is
/// the inverse of the quoted rate.
#[derive(Clone)]
pub struct RatesClient {
    config: RatesConfig,
    client: Client,
    rate_limiter: RateLimiter,
}

impl RatesClient {
    pub fn new(config: RatesConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            rate_limiter: RateLimiter::new(config.requests_per_minute, Duration::from_secs(60)),
            config,
            client,
        }
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, RatesError> {
        let request = builder.build()?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| RatesError::InvalidResponse("Cannot clone request".to_string()))?;
            let response = self.client.execute(req_clone).await?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            tracing::warn!(
                "Rates API 429 rate limited, waiting {}s before retry {}/3",
                self.config.retry_wait.as_secs(),
                attempt + 1
            );
            tokio::time::sleep(self.config.retry_wait).await;
        }

        Err(RatesError::RateLimited(3))
    }

    /// Daily price series for a `BASE/QUOTE` pair between two dates (inclusive).
    pub async fn get_timeseries(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, RatesError> {
        let (base, quote) = split_symbol(symbol)?;
        let url = format!(
            "{}/{}..{}",
            self.config.base_url.trim_end_matches('/'),
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );

        let mut builder = self.client.get(&url).query(&[("from", quote), ("to", base)]);
        if let Some(key) = &self.config.api_key {
            builder = builder.query(&[("apikey", key)]);
        }

        let response = self.send_request(builder).await?;

        if !response.status().is_success() {
            return Err(RatesError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: TimeseriesResponse = response
            .json()
            .await
            .map_err(|e| RatesError::InvalidResponse(e.to_string()))?;

        let points = invert_timeseries(&body, base)?;
        tracing::info!("Fetched {} daily points for {}", points.len(), symbol);
        Ok(points)
    }
}

#[async_trait]
impl PriceSupplier for RatesClient {
    async fn fetch(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<String, Vec<PricePoint>>, SimError> {
        let mut out = HashMap::new();
        for symbol in symbols {
            let points = self.get_timeseries(symbol, start, end).await?;
            out.insert(symbol.clone(), points);
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "rates-api"
    }
}

/// Split `EUR/USD` (or `EURUSD`) into its two currency codes.
pub fn split_symbol(symbol: &str) -> Result<(&str, &str), RatesError> {
    let (base, quote) = match symbol.split_once('/') {
        Some(parts) => parts,
        None if symbol.len() == 6 && symbol.is_char_boundary(3) => symbol.split_at(3),
        None => return Err(RatesError::InvalidSymbol(symbol.to_string())),
    };
    if base.len() != 3 || quote.len() != 3 {
        return Err(RatesError::InvalidSymbol(symbol.to_string()));
    }
    Ok((base, quote))
}

/// Turn rate quotes into prices (`1 / rate`), ordered by date.
///
/// Days with a missing, zero or non-finite rate are dropped.
fn invert_timeseries(body: &TimeseriesResponse, currency: &str) -> Result<Vec<PricePoint>, RatesError> {
    let mut points = Vec::with_capacity(body.rates.len());
    for (day, quotes) in &body.rates {
        let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map_err(|e| RatesError::InvalidResponse(format!("bad date '{}': {}", day, e)))?;
        let Some(&rate) = quotes.get(currency) else {
            continue;
        };
        let timestamp = date.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
        match PricePoint::from_rate(timestamp, rate) {
            Some(point) => points.push(point),
            None => tracing::debug!("Skipping unusable rate {} on {}", rate, day),
        }
    }
    Ok(points)
}

#[derive(Debug, Deserialize)]
struct TimeseriesResponse {
    #[serde(default)]
    rates: BTreeMap<String, HashMap<String, f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_symbol() {
        assert_eq!(split_symbol("EUR/USD").unwrap(), ("EUR", "USD"));
        assert_eq!(split_symbol("GBPJPY").unwrap(), ("GBP", "JPY"));
        assert!(split_symbol("EURO/USD").is_err());
        assert!(split_symbol("EUR").is_err());
    }

    #[test]
    fn test_invert_timeseries() {
        let body: TimeseriesResponse = serde_json::from_str(
            r#"{
                "amount": 1.0,
                "base": "USD",
                "rates": {
                    "2024-01-03": {"EUR": 0.8},
                    "2024-01-02": {"EUR": 0.5},
                    "2024-01-04": {"EUR": 0.0},
                    "2024-01-05": {"GBP": 0.7}
                }
            }"#,
        )
        .unwrap();

        let points = invert_timeseries(&body, "EUR").unwrap();
        assert_eq!(points.len(), 2);
        assert!(points[0].timestamp < points[1].timestamp);
        assert!((points[0].price - 2.0).abs() < 1e-12);
        assert!((points[1].price - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_invert_timeseries_rejects_bad_dates() {
        let body: TimeseriesResponse =
            serde_json::from_str(r#"{"rates": {"yesterday": {"EUR": 0.9}}}"#).unwrap();
        assert!(matches!(
            invert_timeseries(&body, "EUR"),
            Err(RatesError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_errors_map_to_data_source() {
        let err: SimError = RatesError::InvalidSymbol("X".into()).into();
        assert!(matches!(err, SimError::DataSource(_)));
    }
}
