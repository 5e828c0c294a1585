//! Run Results
//!
//! Final accounting for a finished replay.

use serde::{Deserialize, Serialize};

use crate::run::RunId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Profit,
    Loss,
    Breakeven,
}

impl Outcome {
    pub fn from_profit(profit: f64) -> Self {
        if profit > 0.0 {
            Outcome::Profit
        } else if profit < 0.0 {
            Outcome::Loss
        } else {
            Outcome::Breakeven
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Profit => write!(f, "profit"),
            Outcome::Loss => write!(f, "loss"),
            Outcome::Breakeven => write!(f, "breakeven"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub run_id: RunId,
    pub symbol: String,
    pub initial_balance: f64,
    /// cash + holdings at the last observed price
    pub final_asset_value: f64,
    pub total_profit: f64,
    pub trade_count: usize,
    pub outcome: Outcome,
    pub total_fees: f64,
    pub return_pct: f64,
    /// Return of holding the pair for the whole window
    pub buy_hold_return_pct: f64,
    pub last_price: f64,
    pub ticks_played: u64,
    pub advisories_requested: u32,
}

/// Inputs gathered from the run at completion
#[derive(Debug, Clone)]
pub struct SummaryInputs<'a> {
    pub run_id: RunId,
    pub symbol: &'a str,
    pub initial_balance: f64,
    pub cash: f64,
    pub holding_qty: f64,
    pub first_price: f64,
    pub last_price: f64,
    pub trade_count: usize,
    pub total_fees: f64,
    pub ticks_played: u64,
    pub advisories_requested: u32,
}

impl ResultsSummary {
    pub fn compute(inputs: SummaryInputs<'_>) -> Self {
        let final_asset_value = inputs.cash + inputs.holding_qty * inputs.last_price;
        let total_profit = final_asset_value - inputs.initial_balance;

        let return_pct = if inputs.initial_balance > 0.0 {
            total_profit / inputs.initial_balance * 100.0
        } else {
            0.0
        };
        let buy_hold_return_pct = if inputs.first_price > 0.0 {
            (inputs.last_price - inputs.first_price) / inputs.first_price * 100.0
        } else {
            0.0
        };

        Self {
            run_id: inputs.run_id,
            symbol: inputs.symbol.to_string(),
            initial_balance: inputs.initial_balance,
            final_asset_value,
            total_profit,
            trade_count: inputs.trade_count,
            outcome: Outcome::from_profit(total_profit),
            total_fees: inputs.total_fees,
            return_pct,
            buy_hold_return_pct,
            last_price: inputs.last_price,
            ticks_played: inputs.ticks_played,
            advisories_requested: inputs.advisories_requested,
        }
    }

    /// One-line human readable result
    pub fn headline(&self) -> String {
        format!(
            "{} on {}: {:.2} -> {:.2} ({:+.2}, {:+.2}%) after {} trades, fees {:.2}; buy-and-hold {:+.2}%",
            self.outcome,
            self.symbol,
            self.initial_balance,
            self.final_asset_value,
            self.total_profit,
            self.return_pct,
            self.trade_count,
            self.total_fees,
            self.buy_hold_return_pct
        )
    }
}
