//! Ledger
//!
//! Cash and holdings for a single symbol. Every operation is all-or-nothing:
//! a rejected trade leaves the state exactly as it was.

use serde::{Deserialize, Serialize};
use sim_core::{SimError, SimResult, TradeAction};

/// Holdings below this are float residue from notional/price division
const QTY_DUST: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    pub symbol: String,
    pub cash: f64,
    pub holding_qty: f64,
}

/// Result of an executed buy or sell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub action: TradeAction,
    pub notional: f64,
    pub price: f64,
    pub fee: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    state: LedgerState,
    fee_rate: f64,
    fees_paid: f64,
}

impl Ledger {
    pub fn new(symbol: impl Into<String>, initial_balance: f64, fee_rate: f64) -> Self {
        Self {
            state: LedgerState {
                symbol: symbol.into(),
                cash: initial_balance,
                holding_qty: 0.0,
            },
            fee_rate,
            fees_paid: 0.0,
        }
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn cash(&self) -> f64 {
        self.state.cash
    }

    pub fn holding_qty(&self) -> f64 {
        self.state.holding_qty
    }

    pub fn fee_rate(&self) -> f64 {
        self.fee_rate
    }

    pub fn fees_paid(&self) -> f64 {
        self.fees_paid
    }

    pub fn fee_for(&self, notional: f64) -> f64 {
        notional * self.fee_rate
    }

    /// Spend `notional` (plus fee) of cash on `notional / price` units.
    pub fn buy(&mut self, notional: f64, price: f64) -> SimResult<Fill> {
        validate(notional, price)?;
        let fee = self.fee_for(notional);
        let required = notional + fee;
        if self.state.cash < required {
            return Err(SimError::InsufficientFunds {
                required,
                available: self.state.cash,
            });
        }

        let quantity = notional / price;
        self.state.cash -= required;
        self.state.holding_qty += quantity;
        self.fees_paid += fee;

        tracing::debug!(
            "BUY {:.2} {} @ {:.5} (qty {:.6}, fee {:.4}), cash now {:.2}",
            notional,
            self.state.symbol,
            price,
            quantity,
            fee,
            self.state.cash
        );
        Ok(Fill {
            action: TradeAction::Buy,
            notional,
            price,
            fee,
            quantity,
        })
    }

    /// Sell `notional` worth of holdings at `price`, receiving `notional - fee`.
    pub fn sell(&mut self, notional: f64, price: f64) -> SimResult<Fill> {
        validate(notional, price)?;
        let holding_value = self.state.holding_qty * price;
        if holding_value < notional {
            return Err(SimError::InsufficientHoldings {
                required: notional,
                available: holding_value,
            });
        }

        let fee = self.fee_for(notional);
        let quantity = notional / price;
        self.state.cash += notional - fee;
        self.state.holding_qty -= quantity;
        if self.state.holding_qty < QTY_DUST {
            self.state.holding_qty = 0.0;
        }
        self.fees_paid += fee;

        tracing::debug!(
            "SELL {:.2} {} @ {:.5} (qty {:.6}, fee {:.4}), cash now {:.2}",
            notional,
            self.state.symbol,
            price,
            quantity,
            fee,
            self.state.cash
        );
        Ok(Fill {
            action: TradeAction::Sell,
            notional,
            price,
            fee,
            quantity,
        })
    }

    /// Explicit no-op decision.
    pub fn hold(&self) {
        tracing::debug!("HOLD {}", self.state.symbol);
    }

    pub fn total_asset_value(&self, current_price: f64) -> f64 {
        self.state.cash + self.state.holding_qty * current_price
    }
}

fn validate(notional: f64, price: f64) -> SimResult<()> {
    if !notional.is_finite() || notional <= 0.0 {
        return Err(SimError::InvalidAmount(format!(
            "trade amount must be positive, got {}",
            notional
        )));
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(SimError::InvalidAmount(format!(
            "price must be positive, got {}",
            price
        )));
    }
    Ok(())
}
