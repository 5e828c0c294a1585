//! Advisory Gate
//!
//! Decides when to ask the recommender, keeps at most one request in flight,
//! and normalizes whatever comes back into a BUY/SELL/HOLD advisory.

use serde::{Deserialize, Serialize};
use sim_core::{build_prompt, Advisory, PricePoint, SimError, TradeAction};

use crate::run::RunId;

pub const FALLBACK_EXPLANATION: &str =
    "The advisor is unavailable right now, so holding your position is the safe default.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateState {
    Idle,
    AwaitingResponse { requested_tick: u64 },
}

/// Snapshot handed to the recommender task
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryRequest {
    pub run_id: RunId,
    pub requested_tick: u64,
    pub symbol: String,
    /// Prices the advice is computed against
    pub window: Vec<PricePoint>,
    pub prompt: String,
}

/// Recommender result routed back to the run
#[derive(Debug, Clone)]
pub struct AdvisoryResponse {
    pub request: AdvisoryRequest,
    pub result: Result<String, SimError>,
}

/// Normalized advisory plus the failure that forced a fallback, if any
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub advisory: Advisory,
    pub failure: Option<SimError>,
}

#[derive(Debug, Clone)]
pub struct AdvisoryGate {
    period: u64,
    state: GateState,
    requested: u32,
    skipped: u32,
}

impl AdvisoryGate {
    pub fn new(period: u64) -> Self {
        Self {
            period: period.max(1),
            state: GateState::Idle,
            requested: 0,
            skipped: 0,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn requested(&self) -> u32 {
        self.requested
    }

    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    pub fn is_due(&self, tick: u64) -> bool {
        tick > 0 && tick.is_multiple_of(self.period)
    }

    /// Due ticks are skipped, never queued, while a survey is active or a
    /// request is already in flight.
    pub fn should_request(&mut self, tick: u64, survey_active: bool) -> bool {
        if !self.is_due(tick) {
            return false;
        }
        if survey_active || self.state != GateState::Idle {
            self.skipped += 1;
            tracing::debug!(
                "Advisory due at tick {} skipped (survey_active={}, state={:?})",
                tick,
                survey_active,
                self.state
            );
            return false;
        }
        true
    }

    pub fn begin(
        &mut self,
        run_id: RunId,
        tick: u64,
        symbol: &str,
        window: Vec<PricePoint>,
    ) -> AdvisoryRequest {
        self.state = GateState::AwaitingResponse {
            requested_tick: tick,
        };
        self.requested += 1;
        AdvisoryRequest {
            run_id,
            requested_tick: tick,
            symbol: symbol.to_string(),
            prompt: build_prompt(symbol, &window),
            window,
        }
    }

    pub fn resolve(&mut self, result: Result<String, SimError>, amount: f64) -> Resolution {
        self.state = GateState::Idle;
        normalize(result, amount)
    }

    /// Drop an in-flight response without producing an advisory.
    pub fn discard(&mut self) {
        self.state = GateState::Idle;
    }
}

/// First-match keyword scan: "buy", then "sell", otherwise HOLD.
pub fn parse_action(text: &str) -> TradeAction {
    let lower = text.to_lowercase();
    if lower.contains("buy") {
        TradeAction::Buy
    } else if lower.contains("sell") {
        TradeAction::Sell
    } else {
        TradeAction::Hold
    }
}

/// Turn recommender output into an advisory. Failures and blank replies
/// become a HOLD with a fixed explanation; they are never propagated.
pub fn normalize(result: Result<String, SimError>, amount: f64) -> Resolution {
    let failure = match result {
        Ok(text) if !text.trim().is_empty() => {
            return Resolution {
                advisory: Advisory {
                    action: parse_action(&text),
                    suggested_amount: amount,
                    explanation: text.trim().to_string(),
                },
                failure: None,
            };
        }
        Ok(_) => SimError::AdvisoryUnavailable("advisor returned an empty reply".to_string()),
        Err(SimError::AdvisoryUnavailable(msg)) => SimError::AdvisoryUnavailable(msg),
        Err(other) => SimError::AdvisoryUnavailable(other.to_string()),
    };

    tracing::warn!("Advisory fallback to HOLD: {}", failure);
    Resolution {
        advisory: Advisory::hold(amount, FALLBACK_EXPLANATION),
        failure: Some(failure),
    }
}
