use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use replay_engine::PriceSeries;
use sim_core::{PriceSupplier, SimError};

/// Fetch one symbol's series, retrying supplier failures up to `attempts` times.
pub async fn load_series(
    supplier: &dyn PriceSupplier,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    attempts: u32,
    retry_wait: Duration,
) -> Result<PriceSeries> {
    let symbols = [symbol.to_string()];
    let mut attempt = 0;
    loop {
        attempt += 1;
        match supplier.fetch(&symbols, start, end).await {
            Ok(mut by_symbol) => {
                let points = by_symbol.remove(symbol).ok_or_else(|| {
                    anyhow!("{} returned no series for {}", supplier.name(), symbol)
                })?;
                let series = PriceSeries::new(symbol, points)?;
                if series.is_empty() {
                    return Err(SimError::InsufficientData(format!(
                        "{} has no prices for {} between {} and {}",
                        supplier.name(),
                        symbol,
                        start,
                        end
                    ))
                    .into());
                }
                tracing::info!(
                    "Loaded {} points for {} from {}",
                    series.len(),
                    symbol,
                    supplier.name()
                );
                return Ok(series);
            }
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    "Loading {} from {} failed (attempt {}/{}): {}. Retrying in {:?}",
                    symbol,
                    supplier.name(),
                    attempt,
                    attempts,
                    e,
                    retry_wait
                );
                tokio::time::sleep(retry_wait).await;
            }
            Err(e) => {
                return Err(anyhow!(
                    "Loading {} from {} failed after {} attempts: {}",
                    symbol,
                    supplier.name(),
                    attempts,
                    e
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sim_core::PricePoint;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails a fixed number of times, then serves a short series
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PriceSupplier for Flaky {
        async fn fetch(
            &self,
            symbols: &[String],
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<HashMap<String, Vec<PricePoint>>, SimError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(SimError::DataSource("503 Service Unavailable".into()));
            }
            Ok(symbols
                .iter()
                .map(|s| (s.clone(), vec![PricePoint::new(0, 1.1), PricePoint::new(1, 1.2)]))
                .collect())
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let supplier = Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        let series = load_series(&supplier, "EUR/USD", day(1), day(5), 3, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(supplier.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_attempts() {
        let supplier = Flaky {
            failures: 10,
            calls: AtomicU32::new(0),
        };
        let err = load_series(&supplier, "EUR/USD", day(1), day(5), 2, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("after 2 attempts"));
        assert_eq!(supplier.calls.load(Ordering::SeqCst), 2);
    }
}
