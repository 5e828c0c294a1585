use serde::{Deserialize, Serialize};
use sim_core::{SimError, SimResult};
use std::time::Duration;

/// Smallest tick period the clock will schedule
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);
/// Largest tick period the clock will schedule
const MAX_TICK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Slowest accepted playback, one thousandth of real pace
pub const MIN_SPEED_MULTIPLIER: f64 = 1e-3;

/// Injectable session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of price points replayed per run
    pub window_length: usize,
    /// Request an advisory every N ticks
    pub advisory_period: u64,
    /// Fee charged on the notional of every buy/sell
    pub fee_rate: f64,
    /// Starting cash
    pub initial_balance: f64,
    /// Detailed survey every N trades
    pub milestone_interval: u32,
    /// Tick period at speed 1.0, in milliseconds
    pub base_interval_ms: u64,
    pub speed_multiplier: f64,
    /// Notional used when a trade or advisory gives no explicit amount
    pub default_trade_amount: f64,
    /// Price points embedded in each advisory prompt
    pub advisory_window: usize,
    /// Broadcast buffer for consumer events
    pub event_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            window_length: 600,
            advisory_period: 10,
            fee_rate: 0.001,
            initial_balance: 10_000.0,
            milestone_interval: 5,
            base_interval_ms: 1_000,
            speed_multiplier: 1.0,
            default_trade_amount: 100.0,
            advisory_window: 20,
            event_capacity: 1024,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> SimResult<()> {
        if self.window_length == 0 {
            return Err(SimError::InvalidConfig("window_length must be positive".into()));
        }
        if self.advisory_period == 0 {
            return Err(SimError::InvalidConfig("advisory_period must be positive".into()));
        }
        if !self.fee_rate.is_finite() || !(0.0..1.0).contains(&self.fee_rate) {
            return Err(SimError::InvalidConfig(format!(
                "fee_rate must be in [0, 1), got {}",
                self.fee_rate
            )));
        }
        if !self.initial_balance.is_finite() || self.initial_balance < 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "initial_balance must be non-negative, got {}",
                self.initial_balance
            )));
        }
        if self.milestone_interval == 0 {
            return Err(SimError::InvalidConfig("milestone_interval must be positive".into()));
        }
        if self.base_interval_ms == 0 {
            return Err(SimError::InvalidConfig("base_interval_ms must be positive".into()));
        }
        validate_speed(self.speed_multiplier)
            .map_err(|e| SimError::InvalidConfig(e.to_string()))?;
        if !self.default_trade_amount.is_finite() || self.default_trade_amount <= 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "default_trade_amount must be positive, got {}",
                self.default_trade_amount
            )));
        }
        if self.advisory_window == 0 {
            return Err(SimError::InvalidConfig("advisory_window must be positive".into()));
        }
        if self.event_capacity == 0 {
            return Err(SimError::InvalidConfig("event_capacity must be positive".into()));
        }
        Ok(())
    }

    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms)
    }

    /// `base_interval / speed`, kept between one millisecond and one day.
    pub fn tick_interval(&self, speed_multiplier: f64) -> Duration {
        let secs = self.base_interval().as_secs_f64() / speed_multiplier;
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_TICK_INTERVAL)
            .clamp(MIN_TICK_INTERVAL, MAX_TICK_INTERVAL)
    }
}

pub fn validate_speed(speed_multiplier: f64) -> SimResult<()> {
    if !speed_multiplier.is_finite() || speed_multiplier < MIN_SPEED_MULTIPLIER {
        return Err(SimError::InvalidAmount(format!(
            "speed multiplier must be at least {}, got {}",
            MIN_SPEED_MULTIPLIER, speed_multiplier
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_length, 600);
        assert_eq!(config.advisory_period, 10);
        assert_eq!(config.milestone_interval, 5);
    }

    #[test]
    fn test_tick_interval_scales_with_speed() {
        let config = SimConfig::default();
        assert_eq!(config.tick_interval(1.0), Duration::from_secs(1));
        assert_eq!(config.tick_interval(4.0), Duration::from_millis(250));
        assert_eq!(config.tick_interval(1e9), MIN_TICK_INTERVAL);
    }

    #[test]
    fn test_tiny_speed_is_rejected_and_never_panics() {
        assert!(matches!(validate_speed(1e-20), Err(SimError::InvalidAmount(_))));
        assert!(matches!(validate_speed(f64::NAN), Err(SimError::InvalidAmount(_))));
        assert!(validate_speed(MIN_SPEED_MULTIPLIER).is_ok());

        let slow = SimConfig {
            speed_multiplier: 1e-20,
            ..SimConfig::default()
        };
        assert!(matches!(slow.validate(), Err(SimError::InvalidConfig(_))));

        let config = SimConfig::default();
        assert_eq!(config.tick_interval(1e-20), MAX_TICK_INTERVAL);
        assert_eq!(
            config.tick_interval(MIN_SPEED_MULTIPLIER),
            Duration::from_secs(1_000)
        );

        let huge_base = SimConfig {
            base_interval_ms: u64::MAX,
            ..SimConfig::default()
        };
        assert_eq!(huge_base.tick_interval(MIN_SPEED_MULTIPLIER), MAX_TICK_INTERVAL);
    }

    #[test]
    fn test_invalid_configs() {
        let bad_fee = SimConfig {
            fee_rate: 1.5,
            ..SimConfig::default()
        };
        assert!(matches!(bad_fee.validate(), Err(SimError::InvalidConfig(_))));

        let bad_speed = SimConfig {
            speed_multiplier: 0.0,
            ..SimConfig::default()
        };
        assert!(matches!(bad_speed.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SimConfig = serde_json::from_str(r#"{"window_length": 120}"#).unwrap();
        assert_eq!(config.window_length, 120);
        assert_eq!(config.fee_rate, 0.001);
    }
}
