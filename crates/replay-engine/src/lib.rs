//! Replay Engine
//!
//! Paced replay of a historical FX window for trust-in-advice sessions.
//! A user trades against a simulated ledger while an advisor periodically
//! recommends BUY, SELL or HOLD, and trust surveys interrupt the session
//! after trades.

pub mod advisory;
pub mod clock;
pub mod config;
pub mod events;
pub mod ledger;
pub mod price_series;
pub mod run;
pub mod summary;
pub mod survey;


pub use advisory::{
    normalize, parse_action, AdvisoryGate, AdvisoryRequest, AdvisoryResponse, GateState,
    Resolution, FALLBACK_EXPLANATION,
};
pub use clock::{ClockHandle, Command, SimulationClock};
pub use config::{validate_speed, SimConfig, MIN_SPEED_MULTIPLIER};
pub use events::{EventBus, SimEvent};
pub use ledger::{Fill, Ledger, LedgerState};
pub use price_series::{PriceSeries, SimWindow};
pub use run::{RunId, RunStatus, SimulationRun, TickOutcome, TradeRecord};
pub use summary::{Outcome, ResultsSummary, SummaryInputs};
pub use survey::{
    QuestionId, SurveyMode, SurveyPolicy, SurveySubmission, MAX_SCORE, MIN_SCORE,
    SIMPLE_QUESTIONS, TRUST_STATEMENTS,
};
