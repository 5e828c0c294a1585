//! Offline price supplier
//!
//! Seeded random walk so demos and tests can run without network access.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sim_core::{PricePoint, PriceSupplier, SimError};

/// Generates `points` prices per symbol starting at `start`, one per `step_ms`.
#[derive(Debug, Clone)]
pub struct SyntheticSupplier {
    pub seed: u64,
    pub points: usize,
    pub start_price: f64,
    /// Max relative move per step
    pub volatility: f64,
    pub step_ms: i64,
}

impl Default for SyntheticSupplier {
    fn default() -> Self {
        Self {
            seed: 42,
            points: 720,
            start_price: 1.10,
            volatility: 0.002,
            step_ms: 60_000,
        }
    }
}

impl SyntheticSupplier {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub fn generate(&self, symbol: &str, start: NaiveDate) -> Vec<PricePoint> {
        let symbol_salt = symbol
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut rng = StdRng::seed_from_u64(self.seed ^ symbol_salt);
        let origin = start.and_time(NaiveTime::MIN).and_utc().timestamp_millis();

        let mut price = self.start_price;
        let mut points = Vec::with_capacity(self.points);
        for i in 0..self.points {
            points.push(PricePoint::new(origin + i as i64 * self.step_ms, price));
            let shock: f64 = rng.gen_range(-1.0..=1.0);
            price = (price * (1.0 + shock * self.volatility)).max(f64::EPSILON);
        }
        points
    }
}

#[async_trait]
impl PriceSupplier for SyntheticSupplier {
    async fn fetch(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<String, Vec<PricePoint>>, SimError> {
        if end < start {
            return Err(SimError::DataSource(format!(
                "end date {} precedes start date {}",
                end, start
            )));
        }
        Ok(symbols
            .iter()
            .map(|s| (s.clone(), self.generate(s, start)))
            .collect())
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}
