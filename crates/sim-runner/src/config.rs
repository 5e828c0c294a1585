use anyhow::{bail, Context, Result};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use rates_client::RatesConfig;
use replay_engine::SimConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Historical daily rates over HTTP
    Rates,
    /// Seeded offline random walk
    Synthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisorMode {
    /// Chat advisor when an API key is configured, heuristic otherwise
    Auto,
    Chat,
    Heuristic,
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub data_source: DataSource,
    pub synthetic_seed: u64,
    pub load_retries: u32,
    pub load_retry_wait: Duration,

    pub sim: SimConfig,

    // Auto-pilot
    pub autopilot: bool,
    pub trust_score: u8,

    pub advisor_mode: AdvisorMode,
    pub advisor_timeout: Duration,

    pub rates_base_url: Option<String>,
    pub rates_api_key: Option<String>,
    pub rates_requests_per_minute: usize,
}

impl RunnerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or empty keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parse = |key: &str, default: &str| -> Result<String> {
            Ok(get(key).unwrap_or_else(|| default.to_string()))
        };

        let end_date = match get("SIM_END_DATE") {
            Some(raw) => parse_date("SIM_END_DATE", &raw)?,
            None => Utc::now().date_naive(),
        };
        let start_date = match get("SIM_START_DATE") {
            Some(raw) => parse_date("SIM_START_DATE", &raw)?,
            // ~600 business days of daily fixings
            None => end_date - ChronoDuration::days(900),
        };

        let defaults = SimConfig::default();
        let sim = SimConfig {
            window_length: number(&parse, "SIM_WINDOW_LENGTH", defaults.window_length)?,
            advisory_period: number(&parse, "SIM_ADVISORY_PERIOD", defaults.advisory_period)?,
            fee_rate: number(&parse, "SIM_FEE_RATE", defaults.fee_rate)?,
            initial_balance: number(&parse, "SIM_INITIAL_BALANCE", defaults.initial_balance)?,
            milestone_interval: number(
                &parse,
                "SIM_MILESTONE_INTERVAL",
                defaults.milestone_interval,
            )?,
            base_interval_ms: number(&parse, "SIM_BASE_INTERVAL_MS", defaults.base_interval_ms)?,
            speed_multiplier: number(&parse, "SIM_SPEED", defaults.speed_multiplier)?,
            default_trade_amount: number(
                &parse,
                "SIM_TRADE_AMOUNT",
                defaults.default_trade_amount,
            )?,
            advisory_window: number(&parse, "SIM_ADVISORY_WINDOW", defaults.advisory_window)?,
            event_capacity: defaults.event_capacity,
        };

        let data_source = match parse("SIM_DATA_SOURCE", "rates")?.to_lowercase().as_str() {
            "rates" => DataSource::Rates,
            "synthetic" => DataSource::Synthetic,
            other => bail!("SIM_DATA_SOURCE must be 'rates' or 'synthetic', got '{}'", other),
        };

        let advisor_mode = match parse("ADVISOR_MODE", "auto")?.to_lowercase().as_str() {
            "auto" => AdvisorMode::Auto,
            "chat" => AdvisorMode::Chat,
            "heuristic" => AdvisorMode::Heuristic,
            other => bail!("ADVISOR_MODE must be auto, chat or heuristic, got '{}'", other),
        };

        let config = Self {
            symbol: parse("SIM_SYMBOL", "EUR/USD")?,
            start_date,
            end_date,
            data_source,
            synthetic_seed: number(&parse, "SIM_SEED", 42)?,
            load_retries: number(&parse, "SIM_LOAD_RETRIES", 3)?,
            load_retry_wait: Duration::from_secs(number(&parse, "SIM_LOAD_RETRY_WAIT_SECS", 5)?),
            sim,
            autopilot: number(&parse, "SIM_AUTOPILOT", true)?,
            trust_score: number(&parse, "SIM_AUTOPILOT_TRUST_SCORE", 5)?,
            advisor_mode,
            advisor_timeout: Duration::from_secs(number(&parse, "ADVISOR_TIMEOUT_SECS", 20)?),
            rates_base_url: get("RATES_BASE_URL"),
            rates_api_key: get("RATES_API_KEY"),
            rates_requests_per_minute: number(&parse, "RATES_REQUESTS_PER_MINUTE", 60)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.sim
            .validate()
            .context("Invalid simulation settings")?;
        if self.start_date > self.end_date {
            bail!(
                "SIM_START_DATE ({}) must not be after SIM_END_DATE ({})",
                self.start_date,
                self.end_date
            );
        }
        if self.load_retries == 0 {
            bail!("SIM_LOAD_RETRIES must be at least 1");
        }
        if !(replay_engine::MIN_SCORE..=replay_engine::MAX_SCORE).contains(&self.trust_score) {
            bail!(
                "SIM_AUTOPILOT_TRUST_SCORE must be within {}..={}",
                replay_engine::MIN_SCORE,
                replay_engine::MAX_SCORE
            );
        }
        Ok(())
    }

    pub fn rates_config(&self) -> RatesConfig {
        let defaults = RatesConfig::default();
        RatesConfig {
            base_url: self.rates_base_url.clone().unwrap_or(defaults.base_url),
            api_key: self.rates_api_key.clone(),
            requests_per_minute: self.rates_requests_per_minute,
            ..defaults
        }
    }
}

fn number<T>(parse: &impl Fn(&str, &str) -> Result<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr + ToString,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse(key, &default.to_string())?
        .trim()
        .parse()
        .with_context(|| format!("{} has an invalid value", key))
}

fn parse_date(key: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("{} must be YYYY-MM-DD, got '{}'", key, raw))
}
