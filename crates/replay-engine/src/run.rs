//! Simulation Run
//!
//! The single owned aggregate for one replay: window, tick index, ledger,
//! trade log, survey policy and advisory gate. Every mutation goes through
//! this type and returns the events it produced, so the clock only has to
//! schedule and publish.

use serde::{Deserialize, Serialize};
use sim_core::{PricePoint, Severity, SimError, SimResult, TradeAction};
use uuid::Uuid;

use crate::advisory::{AdvisoryGate, AdvisoryRequest, AdvisoryResponse};
use crate::config::SimConfig;
use crate::events::SimEvent;
use crate::ledger::Ledger;
use crate::price_series::SimWindow;
use crate::summary::{ResultsSummary, SummaryInputs};
use crate::survey::{QuestionId, SurveyPolicy, SurveySubmission};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created, first tick not yet scheduled
    Ready,
    Running,
    Completed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Ready => write!(f, "ready"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One executed decision. Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Tick index at execution
    pub sim_time: u64,
    pub action: TradeAction,
    pub notional_amount: f64,
    pub price: f64,
    pub fee: f64,
}

/// Events from one tick, plus the advisory to dispatch if one is due
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub events: Vec<SimEvent>,
    pub advisory_request: Option<AdvisoryRequest>,
}

#[derive(Debug, Clone)]
pub struct SimulationRun {
    id: RunId,
    config: SimConfig,
    window: SimWindow,
    tick_index: u64,
    current: Option<PricePoint>,
    ledger: Ledger,
    trades: Vec<TradeRecord>,
    survey: SurveyPolicy,
    gate: AdvisoryGate,
    speed_multiplier: f64,
    trade_amount: f64,
    status: RunStatus,
    survey_log: Vec<SurveySubmission>,
    summary: Option<ResultsSummary>,
}

impl SimulationRun {
    pub fn new(config: &SimConfig, window: SimWindow, speed_multiplier: f64) -> Self {
        Self {
            id: RunId::new(),
            ledger: Ledger::new(window.symbol(), config.initial_balance, config.fee_rate),
            survey: SurveyPolicy::new(config.milestone_interval),
            gate: AdvisoryGate::new(config.advisory_period),
            trade_amount: config.default_trade_amount,
            config: config.clone(),
            window,
            tick_index: 0,
            current: None,
            trades: Vec::new(),
            speed_multiplier,
            status: RunStatus::Ready,
            survey_log: Vec::new(),
            summary: None,
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn tick_index(&self) -> u64 {
        self.tick_index
    }

    pub fn current_point(&self) -> Option<PricePoint> {
        self.current
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn survey(&self) -> &SurveyPolicy {
        &self.survey
    }

    pub fn gate(&self) -> &AdvisoryGate {
        &self.gate
    }

    pub fn window(&self) -> &SimWindow {
        &self.window
    }

    pub fn speed_multiplier(&self) -> f64 {
        self.speed_multiplier
    }

    pub fn trade_amount(&self) -> f64 {
        self.trade_amount
    }

    pub fn survey_log(&self) -> &[SurveySubmission] {
        &self.survey_log
    }

    pub fn summary(&self) -> Option<&ResultsSummary> {
        self.summary.as_ref()
    }

    pub fn total_asset_value(&self) -> f64 {
        match self.current {
            Some(point) => self.ledger.total_asset_value(point.price),
            None => self.ledger.cash(),
        }
    }

    pub fn start(&mut self) -> Vec<SimEvent> {
        if self.status != RunStatus::Ready {
            return Vec::new();
        }
        self.status = RunStatus::Running;
        tracing::info!(
            "Run {} started: {} points of {} at {}x",
            self.id,
            self.window.len(),
            self.window.symbol(),
            self.speed_multiplier
        );
        vec![SimEvent::RunStarted {
            run_id: self.id,
            symbol: self.window.symbol().to_string(),
            window_length: self.window.len(),
            speed_multiplier: self.speed_multiplier,
        }]
    }

    /// Advance one tick: publish the next point, schedule an advisory when
    /// due, and finalize the run once the window is exhausted.
    pub fn tick(&mut self) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.status != RunStatus::Running {
            return outcome;
        }

        let Some(point) = self.window.get(self.tick_index as usize) else {
            outcome.events.extend(self.complete());
            return outcome;
        };
        self.tick_index += 1;
        self.current = Some(point);

        tracing::debug!("Run {} tick {} price {:.5}", self.id, self.tick_index, point.price);
        outcome.events.push(SimEvent::Tick {
            run_id: self.id,
            tick: self.tick_index,
            point,
            total_asset_value: self.ledger.total_asset_value(point.price),
        });

        if self.tick_index as usize >= self.window.len() {
            outcome.events.extend(self.complete());
            return outcome;
        }

        if self.gate.should_request(self.tick_index, self.survey.is_active()) {
            let recent = self
                .window
                .recent(self.tick_index as usize, self.config.advisory_window);
            outcome.advisory_request = Some(self.gate.begin(
                self.id,
                self.tick_index,
                self.window.symbol(),
                recent,
            ));
        }
        outcome
    }

    fn complete(&mut self) -> Vec<SimEvent> {
        self.status = RunStatus::Completed;
        let last_price = self
            .current
            .or_else(|| self.window.last())
            .map(|p| p.price)
            .unwrap_or(0.0);
        let first_price = self.window.first().map(|p| p.price).unwrap_or(0.0);

        let summary = ResultsSummary::compute(SummaryInputs {
            run_id: self.id,
            symbol: self.window.symbol(),
            initial_balance: self.config.initial_balance,
            cash: self.ledger.cash(),
            holding_qty: self.ledger.holding_qty(),
            first_price,
            last_price,
            trade_count: self.trades.len(),
            total_fees: self.ledger.fees_paid(),
            ticks_played: self.tick_index,
            advisories_requested: self.gate.requested(),
        });
        tracing::info!("Run {} completed: {}", self.id, summary.headline());
        self.summary = Some(summary.clone());

        vec![SimEvent::RunCompleted {
            run_id: self.id,
            summary,
        }]
    }

    /// The trade path: execute, log, and let the survey policy react.
    /// Failures become a warning notification and change nothing.
    pub fn trade(&mut self, action: TradeAction, amount: Option<f64>) -> Vec<SimEvent> {
        match self.execute_trade(action, amount) {
            Ok(record) => {
                let mut events = vec![SimEvent::TradeExecuted {
                    run_id: self.id,
                    record,
                }];
                for mode in self.survey.observe_trade() {
                    events.push(SimEvent::SurveyRequired {
                        run_id: self.id,
                        mode,
                    });
                }
                events
            }
            Err(e) => {
                tracing::info!("Run {} rejected {}: {}", self.id, action, e);
                vec![SimEvent::notification(Severity::Warning, e.to_string())]
            }
        }
    }

    fn execute_trade(&mut self, action: TradeAction, amount: Option<f64>) -> SimResult<TradeRecord> {
        if self.status != RunStatus::Running {
            return Err(SimError::RunNotActive);
        }
        let point = self.current.ok_or(SimError::RunNotActive)?;
        if self.survey.is_active() {
            return Err(SimError::SurveyPending);
        }

        let notional = amount.unwrap_or(self.trade_amount);
        let record = match action {
            TradeAction::Buy | TradeAction::Sell => {
                let fill = if action == TradeAction::Buy {
                    self.ledger.buy(notional, point.price)?
                } else {
                    self.ledger.sell(notional, point.price)?
                };
                TradeRecord {
                    sim_time: self.tick_index,
                    action,
                    notional_amount: fill.notional,
                    price: fill.price,
                    fee: fill.fee,
                }
            }
            TradeAction::Hold => {
                self.ledger.hold();
                TradeRecord {
                    sim_time: self.tick_index,
                    action,
                    notional_amount: 0.0,
                    price: point.price,
                    fee: 0.0,
                }
            }
        };
        self.trades.push(record);
        Ok(record)
    }

    /// Route a recommender result back into the run.
    ///
    /// Results for another run are dropped. A result that lands while a
    /// survey is pending is discarded so no advisory surfaces mid-survey.
    pub fn apply_advisory(&mut self, response: AdvisoryResponse) -> Vec<SimEvent> {
        let AdvisoryResponse { request, result } = response;
        if request.run_id != self.id {
            tracing::debug!(
                "Dropping advisory for superseded run {} (current {})",
                request.run_id,
                self.id
            );
            return Vec::new();
        }
        if self.status != RunStatus::Running {
            self.gate.discard();
            return Vec::new();
        }
        if self.survey.is_active() {
            tracing::debug!(
                "Discarding advisory from tick {}: survey pending",
                request.requested_tick
            );
            self.gate.discard();
            return Vec::new();
        }

        let resolution = self.gate.resolve(result, self.trade_amount);
        let mut events = Vec::with_capacity(2);
        if let Some(failure) = resolution.failure {
            events.push(SimEvent::notification(Severity::Info, failure.to_string()));
        }
        events.push(SimEvent::AdvisoryReady {
            run_id: self.id,
            requested_tick: request.requested_tick,
            delivered_tick: self.tick_index,
            window: request.window,
            advisory: resolution.advisory,
        });
        events
    }

    pub fn set_trade_amount(&mut self, amount: f64) -> SimResult<()> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(SimError::InvalidAmount(format!(
                "trade amount must be positive, got {}",
                amount
            )));
        }
        self.trade_amount = amount;
        Ok(())
    }

    pub fn record_survey_response(&mut self, question: QuestionId, score: u8) -> SimResult<()> {
        self.survey.record_response(question, score)
    }

    pub fn submit_survey(&mut self) -> SimResult<SurveySubmission> {
        let submission = self.survey.submit()?;
        self.survey_log.push(submission.clone());
        Ok(submission)
    }

    pub fn close_survey(&mut self) {
        self.survey.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_series::PriceSeries;
    use crate::summary::Outcome;
    use crate::survey::SurveyMode;

    fn window(n: usize) -> SimWindow {
        let points = (0..n)
            .map(|i| PricePoint::new(i as i64 * 60_000, 1.1 + (i % 7) as f64 * 0.001))
            .collect();
        PriceSeries::new("EUR/USD", points).unwrap().slice(n).unwrap()
    }

    fn running(n: usize) -> SimulationRun {
        let mut run = SimulationRun::new(&SimConfig::default(), window(n), 1.0);
        run.start();
        run
    }

    fn advance(run: &mut SimulationRun, ticks: usize) -> Vec<AdvisoryRequest> {
        (0..ticks).filter_map(|_| run.tick().advisory_request).collect()
    }

    fn has_warning(events: &[SimEvent]) -> bool {
        events.iter().any(|e| {
            matches!(
                e,
                SimEvent::Notification {
                    severity: Severity::Warning,
                    ..
                }
            )
        })
    }

    #[test]
    fn test_ticks_publish_points_in_order() {
        let mut run = running(5);
        let first = run.tick();
        assert!(matches!(
            first.events[0],
            SimEvent::Tick { tick: 1, point, .. } if point.timestamp == 0
        ));
        run.tick();
        assert_eq!(run.tick_index(), 2);
        assert_eq!(run.current_point().unwrap().timestamp, 60_000);
    }

    #[test]
    fn test_run_completes_at_window_end() {
        let mut run = running(3);
        run.tick();
        run.tick();
        let last = run.tick();

        assert_eq!(run.status(), RunStatus::Completed);
        let summary = run.summary().unwrap();
        assert_eq!(summary.outcome, Outcome::Breakeven);
        assert_eq!(summary.ticks_played, 3);
        assert!(matches!(last.events.last(), Some(SimEvent::RunCompleted { .. })));

        // Further ticks are inert
        assert!(run.tick().events.is_empty());
    }

    #[test]
    fn test_trade_before_first_tick_is_rejected() {
        let mut run = running(5);
        let events = run.trade(TradeAction::Buy, Some(100.0));
        assert!(has_warning(&events));
        assert!(run.trades().is_empty());
    }

    #[test]
    fn test_trade_triggers_simple_survey_and_blocks_trades() {
        let mut run = running(50);
        run.tick();

        let events = run.trade(TradeAction::Buy, None);
        assert!(matches!(events[0], SimEvent::TradeExecuted { record, .. } if record.notional_amount == 100.0));
        assert!(matches!(
            events[1],
            SimEvent::SurveyRequired {
                mode: SurveyMode::Simple,
                ..
            }
        ));
        assert!(run.survey().is_active());

        let blocked = run.trade(TradeAction::Sell, Some(50.0));
        assert!(has_warning(&blocked));
        assert_eq!(run.trades().len(), 1);

        run.close_survey();
        let events = run.trade(TradeAction::Sell, Some(50.0));
        assert!(matches!(events[0], SimEvent::TradeExecuted { .. }));
    }

    #[test]
    fn test_rejected_trade_does_not_trigger_survey() {
        let mut run = running(50);
        run.tick();
        let events = run.trade(TradeAction::Sell, Some(100.0));
        assert!(has_warning(&events));
        assert!(!run.survey().is_active());
        assert_eq!(run.survey().trade_count(), 0);
    }

    #[test]
    fn test_hold_is_logged_and_counts_toward_milestone() {
        let mut run = running(50);
        run.tick();
        for i in 1..=5 {
            let events = run.trade(TradeAction::Hold, None);
            let detailed = events.iter().any(|e| {
                matches!(
                    e,
                    SimEvent::SurveyRequired {
                        mode: SurveyMode::Detailed,
                        ..
                    }
                )
            });
            assert_eq!(detailed, i == 5);
            run.close_survey();
        }
        assert_eq!(run.trades().len(), 5);
        assert!(run.trades().iter().all(|t| t.fee == 0.0 && t.notional_amount == 0.0));
        assert_eq!(run.ledger().cash(), 10_000.0);
    }

    #[test]
    fn test_advisory_cadence_over_full_window() {
        let mut run = running(600);
        let mut requests = 0;
        for _ in 0..600 {
            if let Some(request) = run.tick().advisory_request {
                requests += 1;
                assert_eq!(request.requested_tick % 10, 0);
                assert_eq!(request.window.len(), 20.min(request.requested_tick as usize));
                run.apply_advisory(AdvisoryResponse {
                    request,
                    result: Ok("hold".to_string()),
                });
            }
        }
        assert!(requests <= 60);
        assert_eq!(requests, 59);
        assert_eq!(run.summary().unwrap().advisories_requested, 59);
    }

    #[test]
    fn test_survey_suppresses_advisories() {
        let mut run = running(100);
        advance(&mut run, 1);
        run.trade(TradeAction::Buy, Some(100.0));

        // Survey left open: no requests at ticks 10..50
        assert!(advance(&mut run, 49).is_empty());
        assert!(run.gate().skipped() >= 4);

        run.close_survey();
        assert_eq!(advance(&mut run, 10).len(), 1);
    }

    #[test]
    fn test_advisory_window_matches_request_time() {
        let mut run = running(100);
        let request = advance(&mut run, 10).pop().unwrap();
        let requested_last = *request.window.last().unwrap();
        advance(&mut run, 5);

        let events = run.apply_advisory(AdvisoryResponse {
            request,
            result: Ok("Buy the dip".to_string()),
        });
        match &events[0] {
            SimEvent::AdvisoryReady {
                requested_tick,
                delivered_tick,
                window,
                advisory,
                ..
            } => {
                assert_eq!(*requested_tick, 10);
                assert_eq!(*delivered_tick, 15);
                assert_eq!(*window.last().unwrap(), requested_last);
                assert_eq!(advisory.action, TradeAction::Buy);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_failed_advisory_notifies_and_holds() {
        let mut run = running(100);
        let request = advance(&mut run, 10).pop().unwrap();
        let events = run.apply_advisory(AdvisoryResponse {
            request,
            result: Err(SimError::AdvisoryUnavailable("503".into())),
        });
        assert!(matches!(
            events[0],
            SimEvent::Notification {
                severity: Severity::Info,
                ..
            }
        ));
        assert!(matches!(
            &events[1],
            SimEvent::AdvisoryReady { advisory, .. } if advisory.action == TradeAction::Hold
        ));
    }

    #[test]
    fn test_advisory_for_other_run_is_dropped() {
        let mut old = running(100);
        let request = advance(&mut old, 10).pop().unwrap();

        let mut fresh = running(100);
        advance(&mut fresh, 3);
        let events = fresh.apply_advisory(AdvisoryResponse {
            request,
            result: Ok("sell".to_string()),
        });
        assert!(events.is_empty());
    }

    #[test]
    fn test_advisory_arriving_mid_survey_is_discarded() {
        let mut run = running(100);
        let request = advance(&mut run, 10).pop().unwrap();
        run.trade(TradeAction::Hold, None);

        let events = run.apply_advisory(AdvisoryResponse {
            request,
            result: Ok("buy".to_string()),
        });
        assert!(events.is_empty());
        assert_eq!(run.gate().state(), crate::advisory::GateState::Idle);
    }

    #[test]
    fn test_survey_submission_is_logged() {
        let mut run = running(50);
        run.tick();
        run.trade(TradeAction::Hold, None);
        run.record_survey_response(0, 6).unwrap();
        let submission = run.submit_survey().unwrap();
        assert_eq!(submission.mode, SurveyMode::Simple);
        assert_eq!(run.survey_log().len(), 1);
        assert!(!run.survey().is_active());
    }

    #[test]
    fn test_final_value_identity() {
        let mut run = running(20);
        run.tick();
        run.trade(TradeAction::Buy, Some(1_000.0));
        run.close_survey();
        advance(&mut run, 19);

        let summary = run.summary().unwrap().clone();
        let last = run.window().last().unwrap().price;
        let expected = run.ledger().cash() + run.ledger().holding_qty() * last;
        assert!((summary.final_asset_value - expected).abs() < 1e-9);
        assert_eq!(summary.trade_count, 1);
        assert_eq!(
            summary.outcome,
            Outcome::from_profit(summary.final_asset_value - 10_000.0)
        );
    }

    #[test]
    fn test_set_trade_amount() {
        let mut run = running(10);
        assert!(run.set_trade_amount(-1.0).is_err());
        run.set_trade_amount(250.0).unwrap();
        run.tick();
        run.trade(TradeAction::Buy, None);
        assert_eq!(run.trades()[0].notional_amount, 250.0);
    }
}
