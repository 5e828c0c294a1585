//! Offline advisor
//!
//! Scores RSI, moving-average trend, MACD and Bollinger position over the
//! prices embedded in the prompt and answers in the same free-form style as
//! the chat advisor.

use async_trait::async_trait;
use sim_core::{extract_prices, Recommender, SimError};

#[derive(Debug, Clone, Default)]
pub struct HeuristicAdvisor;

#[derive(Debug, Clone, PartialEq)]
struct Indicators {
    rsi_14: f64,
    sma_short: f64,
    sma_long: f64,
    macd: f64,
    bollinger_upper: f64,
    bollinger_lower: f64,
}

impl HeuristicAdvisor {
    pub fn new() -> Self {
        Self
    }

    /// Advice text for a price history, oldest first.
    pub fn advise(&self, closes: &[f64]) -> Result<String, SimError> {
        if closes.len() < 2 {
            return Err(SimError::AdvisoryUnavailable(
                "not enough prices to form an opinion".to_string(),
            ));
        }
        let last = closes[closes.len() - 1];
        let ind = indicators(closes);

        // Moves smaller than one basis point of price count as flat
        let eps = last.abs() * 1e-4;
        let mut score = 0.0;
        let mut factors = 0;

        if ind.rsi_14 < 30.0 {
            score += 1.0;
            factors += 1;
        } else if ind.rsi_14 > 70.0 {
            score -= 1.0;
            factors += 1;
        }

        if last > ind.sma_short + eps && ind.sma_short > ind.sma_long + eps {
            score += 1.0;
            factors += 1;
        } else if last < ind.sma_short - eps && ind.sma_short < ind.sma_long - eps {
            score -= 1.0;
            factors += 1;
        }

        if ind.macd > eps {
            score += 0.5;
            factors += 1;
        } else if ind.macd < -eps {
            score -= 0.5;
            factors += 1;
        }

        if last < ind.bollinger_lower - eps {
            score += 0.5;
            factors += 1;
        } else if last > ind.bollinger_upper + eps {
            score -= 0.5;
            factors += 1;
        }

        let avg_score = if factors > 0 {
            score / factors as f64
        } else {
            0.0
        };

        // Wording must not leak the other action keywords into the text
        let text = if avg_score > 0.3 {
            format!(
                "BUY - the pair is trending up (RSI {:.1}, price {:.5} above its short average {:.5}).",
                ind.rsi_14, last, ind.sma_short
            )
        } else if avg_score < -0.3 {
            format!(
                "SELL - the pair is trending down (RSI {:.1}, price {:.5} below its short average {:.5}).",
                ind.rsi_14, last, ind.sma_short
            )
        } else {
            format!(
                "HOLD - signals are mixed (RSI {:.1}, short average {:.5}, long average {:.5}); no clear edge right now.",
                ind.rsi_14, ind.sma_short, ind.sma_long
            )
        };
        Ok(text)
    }
}

#[async_trait]
impl Recommender for HeuristicAdvisor {
    async fn recommend(&self, prompt: &str) -> Result<String, SimError> {
        self.advise(&extract_prices(prompt))
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

fn indicators(closes: &[f64]) -> Indicators {
    let sma_short = sma(closes, 5);
    let sma_long = sma(closes, 20);
    let std_dev = std_dev(closes, 20);

    Indicators {
        rsi_14: rsi(closes, 14),
        sma_short,
        sma_long,
        macd: ema(closes, 12) - ema(closes, 26),
        bollinger_upper: sma_long + 2.0 * std_dev,
        bollinger_lower: sma_long - 2.0 * std_dev,
    }
}

fn sma(data: &[f64], period: usize) -> f64 {
    let n = data.len().min(period);
    if n == 0 {
        return 0.0;
    }
    data[data.len() - n..].iter().sum::<f64>() / n as f64
}

fn rsi(closes: &[f64], period: usize) -> f64 {
    let period = period.min(closes.len().saturating_sub(1));
    if period == 0 {
        return 50.0;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in (closes.len() - period)..closes.len() {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }

    if losses == 0.0 {
        return if gains == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = gains / losses;
    100.0 - (100.0 / (1.0 + rs))
}

fn ema(data: &[f64], period: usize) -> f64 {
    let Some((&first, rest)) = data.split_first() else {
        return 0.0;
    };
    let k = 2.0 / (period as f64 + 1.0);
    rest.iter().fold(first, |ema, &value| value * k + ema * (1.0 - k))
}

fn std_dev(data: &[f64], period: usize) -> f64 {
    let n = data.len().min(period);
    if n < 2 {
        return 0.0;
    }
    let slice = &data[data.len() - n..];
    let mean = slice.iter().sum::<f64>() / n as f64;
    let variance = slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    variance.sqrt()
}
