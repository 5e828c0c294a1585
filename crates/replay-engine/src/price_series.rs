//! Price Series
//!
//! Immutable, validated price history for one symbol and the fixed replay
//! window cut from its tail.

use std::sync::Arc;

use sim_core::{PricePoint, SimError, SimResult};

/// Ordered price history for one symbol
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    points: Arc<[PricePoint]>,
}

impl PriceSeries {
    /// Timestamps must be strictly increasing and prices positive. An empty
    /// series is allowed; it just cannot be sliced into a window.
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> SimResult<Self> {
        let symbol = symbol.into();
        if let Some(bad) = points.iter().find(|p| !p.price.is_finite() || p.price <= 0.0) {
            return Err(SimError::InvalidData(format!(
                "{}: non-positive price {} at {}",
                symbol, bad.price, bad.timestamp
            )));
        }
        if let Some(pair) = points.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(SimError::InvalidData(format!(
                "{}: timestamps not strictly increasing ({} then {})",
                symbol, pair[0].timestamp, pair[1].timestamp
            )));
        }
        Ok(Self {
            symbol,
            points: points.into(),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The last `window_length` points, or the whole series if shorter.
    pub fn slice(&self, window_length: usize) -> SimResult<SimWindow> {
        if self.points.is_empty() {
            return Err(SimError::InsufficientData(format!(
                "no price data for {}",
                self.symbol
            )));
        }
        if window_length == 0 {
            return Err(SimError::InsufficientData(
                "window length must be positive".to_string(),
            ));
        }
        let start = self.points.len().saturating_sub(window_length);
        Ok(SimWindow {
            symbol: self.symbol.clone(),
            points: self.points[start..].into(),
        })
    }
}

/// Fixed replay window. Cheap to clone, so every restart replays the same points.
#[derive(Debug, Clone, PartialEq)]
pub struct SimWindow {
    symbol: String,
    points: Arc<[PricePoint]>,
}

impl SimWindow {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<PricePoint> {
        self.points.get(index).copied()
    }

    pub fn first(&self) -> Option<PricePoint> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<PricePoint> {
        self.points.last().copied()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Up to `n` points ending just before index `end` (exclusive), oldest first.
    pub fn recent(&self, end: usize, n: usize) -> Vec<PricePoint> {
        let end = end.min(self.points.len());
        let start = end.saturating_sub(n);
        self.points[start..end].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(n: usize) -> PriceSeries {
        let points = (0..n)
            .map(|i| PricePoint::new(i as i64 * 1000, 1.0 + i as f64 * 0.01))
            .collect();
        PriceSeries::new("EUR/USD", points).unwrap()
    }

    #[test]
    fn test_slice_takes_tail() {
        let window = series(10).slice(4).unwrap();
        assert_eq!(window.len(), 4);
        assert_eq!(window.first().unwrap().timestamp, 6000);
        assert_eq!(window.last().unwrap().timestamp, 9000);
    }

    #[test]
    fn test_slice_shorter_series_returns_everything() {
        let window = series(3).slice(600).unwrap();
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_slice_is_reproducible() {
        let s = series(50);
        assert_eq!(s.slice(20).unwrap(), s.slice(20).unwrap());
    }

    #[test]
    fn test_empty_series_is_insufficient() {
        let s = PriceSeries::new("EUR/USD", Vec::new()).unwrap();
        assert!(matches!(s.slice(10), Err(SimError::InsufficientData(_))));
    }

    #[test]
    fn test_rejects_unordered_or_bad_prices() {
        let unordered = vec![PricePoint::new(2, 1.0), PricePoint::new(1, 1.0)];
        assert!(matches!(
            PriceSeries::new("X", unordered),
            Err(SimError::InvalidData(_))
        ));

        let duplicate = vec![PricePoint::new(1, 1.0), PricePoint::new(1, 1.1)];
        assert!(PriceSeries::new("X", duplicate).is_err());

        let negative = vec![PricePoint::new(1, -1.0)];
        assert!(PriceSeries::new("X", negative).is_err());
    }

    #[test]
    fn test_recent_window() {
        let window = series(10).slice(10).unwrap();
        let recent = window.recent(5, 3);
        assert_eq!(
            recent.iter().map(|p| p.timestamp).collect::<Vec<_>>(),
            vec![2000, 3000, 4000]
        );
        assert_eq!(window.recent(2, 20).len(), 2);
        assert_eq!(window.recent(100, 3).len(), 3);
    }
}
