//! Headless session driver: follows the advisor's BUY/SELL calls and answers
//! trust surveys with a fixed score.

use replay_engine::{ClockHandle, ResultsSummary, SimEvent, SurveyMode, MAX_SCORE, MIN_SCORE};
use sim_core::{Severity, SimError, TradeAction};
use tokio::sync::broadcast::{self, error::RecvError};

/// Leading detailed statements are phrased as distrust and are scored inverted
const DISTRUST_STATEMENTS: u8 = 5;

#[derive(Debug, Clone, Copy)]
pub struct Autopilot {
    /// Trade on BUY/SELL advisories; when false the run is only observed
    pub follow_advice: bool,
    pub trust_score: u8,
}

impl Autopilot {
    pub fn new(follow_advice: bool, trust_score: u8) -> Self {
        Self {
            follow_advice,
            trust_score: trust_score.clamp(MIN_SCORE, MAX_SCORE),
        }
    }

    /// Drive the session until the run completes and return its summary.
    pub async fn drive(
        &self,
        handle: &ClockHandle,
        events: &mut broadcast::Receiver<SimEvent>,
    ) -> Result<ResultsSummary, SimError> {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Autopilot lagged behind by {} events", missed);
                    continue;
                }
                Err(RecvError::Closed) => return Err(SimError::RunNotActive),
            };

            match event {
                SimEvent::RunStarted {
                    run_id,
                    symbol,
                    window_length,
                    speed_multiplier,
                } => {
                    tracing::info!(
                        "Run {} on {}: {} points at {}x",
                        run_id,
                        symbol,
                        window_length,
                        speed_multiplier
                    );
                }
                SimEvent::AdvisoryReady {
                    requested_tick,
                    delivered_tick,
                    advisory,
                    ..
                } => {
                    tracing::info!(
                        "Advisory from tick {} (now {}): {} {:.2} - {}",
                        requested_tick,
                        delivered_tick,
                        advisory.action,
                        advisory.suggested_amount,
                        advisory.explanation
                    );
                    if self.follow_advice && advisory.action != TradeAction::Hold {
                        handle
                            .trade(advisory.action, Some(advisory.suggested_amount))
                            .await?;
                    }
                }
                SimEvent::TradeExecuted { record, .. } => {
                    tracing::info!(
                        "Executed {} {:.2} @ {:.5} (fee {:.4}) at tick {}",
                        record.action,
                        record.notional_amount,
                        record.price,
                        record.fee,
                        record.sim_time
                    );
                }
                SimEvent::SurveyRequired { mode, .. } => self.answer(handle, mode).await?,
                SimEvent::SurveySubmitted { submission, .. } => {
                    tracing::info!(
                        "{} survey submitted after {} trades, mean score {:.2}",
                        submission.mode,
                        submission.trade_count,
                        submission.mean_score()
                    );
                }
                SimEvent::RunCompleted { summary, .. } => return Ok(summary),
                SimEvent::Notification { severity, message } => match severity {
                    Severity::Info => tracing::info!("{}", message),
                    Severity::Warning => tracing::warn!("{}", message),
                    Severity::Error => tracing::error!("{}", message),
                },
                SimEvent::Tick { .. } => {}
            }
        }
    }

    /// A milestone trade raises SIMPLE then DETAILED; the SIMPLE pass
    /// cannot complete the pending DETAILED survey and is left for it.
    async fn answer(&self, handle: &ClockHandle, mode: SurveyMode) -> Result<(), SimError> {
        let result = async {
            for question in 0..mode.questions().len() as u8 {
                handle.respond(question, self.score_for(mode, question)).await?;
            }
            handle.submit_survey().await
        }
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(SimError::IncompleteSurvey { answered, required }) => {
                tracing::debug!(
                    "{} survey deferred ({}/{} answered)",
                    mode,
                    answered,
                    required
                );
                Ok(())
            }
            // Nothing pending any more
            Err(SimError::InvalidSurveyResponse(reason)) => {
                tracing::debug!("{} survey skipped: {}", mode, reason);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn score_for(&self, mode: SurveyMode, question: u8) -> u8 {
        if mode == SurveyMode::Detailed && question < DISTRUST_STATEMENTS {
            MAX_SCORE + MIN_SCORE - self.trust_score
        } else {
            self.trust_score
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use replay_engine::{PriceSeries, SimConfig, SimulationClock};
    use sim_core::{extract_prices, PricePoint, Recommender};
    use std::sync::Arc;

    struct Scripted;

    #[async_trait]
    impl Recommender for Scripted {
        async fn recommend(&self, prompt: &str) -> Result<String, SimError> {
            // BUY, BUY, SELL, ... so holdings exist before every sell
            match extract_prices(prompt).last() {
                Some(&last) if last > 1.104 => Ok("SELL - take profit".to_string()),
                _ => Ok("BUY - trend is up".to_string()),
            }
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn series() -> PriceSeries {
        let points = (0..120)
            .map(|i| PricePoint::new(i * 60_000, 1.1 + (i % 3) as f64 * 0.0025))
            .collect();
        PriceSeries::new("EUR/USD", points).unwrap()
    }

    #[test]
    fn test_distrust_statements_are_inverted() {
        let pilot = Autopilot::new(true, 6);
        assert_eq!(pilot.score_for(SurveyMode::Detailed, 0), 2);
        assert_eq!(pilot.score_for(SurveyMode::Detailed, 4), 2);
        assert_eq!(pilot.score_for(SurveyMode::Detailed, 5), 6);
        assert_eq!(pilot.score_for(SurveyMode::Simple, 0), 6);
        assert_eq!(Autopilot::new(true, 42).trust_score, MAX_SCORE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drives_run_to_completion() {
        let config = SimConfig {
            window_length: 120,
            milestone_interval: 2,
            event_capacity: 4096,
            ..SimConfig::default()
        };
        let (clock, handle) = SimulationClock::new(config, &series(), Arc::new(Scripted)).unwrap();
        let mut events = handle.subscribe();
        let task = tokio::spawn(clock.run());

        let summary = Autopilot::new(true, 5)
            .drive(&handle, &mut events)
            .await
            .unwrap();
        handle.shutdown().await.unwrap();
        let run = task.await.unwrap();

        assert!(summary.trade_count > 0);
        assert_eq!(summary.trade_count, run.trades().len());
        assert_eq!(run.survey_log().len(), run.trades().len());
        assert!(run
            .survey_log()
            .iter()
            .any(|s| s.mode == SurveyMode::Detailed && s.responses.len() == 12));
        assert!(!run.survey().is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_does_not_trade() {
        let config = SimConfig {
            window_length: 40,
            ..SimConfig::default()
        };
        let (clock, handle) = SimulationClock::new(config, &series(), Arc::new(Scripted)).unwrap();
        let mut events = handle.subscribe();
        let task = tokio::spawn(clock.run());

        let summary = Autopilot::new(false, 4)
            .drive(&handle, &mut events)
            .await
            .unwrap();
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert_eq!(summary.trade_count, 0);
        assert_eq!(summary.total_profit, 0.0);
    }
}
