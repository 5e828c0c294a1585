//! Simulation Clock
//!
//! One actor task owns the [`SimulationRun`]. It multiplexes three inputs:
//! the tick timer, user commands from [`ClockHandle`], and recommender
//! results coming back from spawned advisory tasks. Restarting or changing
//! speed replaces both the run and the timer, so there is only ever one
//! pending tick.

use std::sync::Arc;
use std::time::Duration;

use sim_core::{Recommender, Severity, SimError, SimResult, TradeAction};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::advisory::{AdvisoryRequest, AdvisoryResponse};
use crate::config::{validate_speed, SimConfig};
use crate::events::{EventBus, SimEvent};
use crate::price_series::{PriceSeries, SimWindow};
use crate::run::{RunId, RunStatus, SimulationRun};
use crate::survey::{QuestionId, SurveySubmission};

const COMMAND_BUFFER: usize = 64;

type Reply<T> = oneshot::Sender<SimResult<T>>;

#[derive(Debug)]
pub enum Command {
    Trade {
        action: TradeAction,
        amount: Option<f64>,
    },
    SetTradeAmount {
        amount: f64,
        reply: Reply<()>,
    },
    SetSpeed {
        multiplier: f64,
        reply: Reply<RunId>,
    },
    Restart {
        reply: Reply<RunId>,
    },
    RespondSurvey {
        question: QuestionId,
        score: u8,
        reply: Reply<()>,
    },
    SubmitSurvey {
        reply: Reply<SurveySubmission>,
    },
    CloseSurvey,
    Shutdown,
}

/// Cloneable front door to a running clock
#[derive(Debug, Clone)]
pub struct ClockHandle {
    tx: mpsc::Sender<Command>,
    bus: EventBus,
}

impl ClockHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.bus.subscribe()
    }

    /// Queue a trade. The outcome arrives as a `TradeExecuted` event or a
    /// warning notification.
    pub async fn trade(&self, action: TradeAction, amount: Option<f64>) -> SimResult<()> {
        self.send(Command::Trade { action, amount }).await
    }

    pub async fn buy(&self, amount: Option<f64>) -> SimResult<()> {
        self.trade(TradeAction::Buy, amount).await
    }

    pub async fn sell(&self, amount: Option<f64>) -> SimResult<()> {
        self.trade(TradeAction::Sell, amount).await
    }

    pub async fn hold(&self) -> SimResult<()> {
        self.trade(TradeAction::Hold, None).await
    }

    pub async fn set_trade_amount(&self, amount: f64) -> SimResult<()> {
        self.request(|reply| Command::SetTradeAmount { amount, reply })
            .await
    }

    /// Change playback speed. Like [`restart`](Self::restart) this starts a
    /// fresh run at the new speed.
    pub async fn set_speed(&self, multiplier: f64) -> SimResult<RunId> {
        validate_speed(multiplier)?;
        self.request(|reply| Command::SetSpeed { multiplier, reply })
            .await
    }

    /// Abandon the current run and replay the same window from the start.
    pub async fn restart(&self) -> SimResult<RunId> {
        self.request(|reply| Command::Restart { reply }).await
    }

    pub async fn respond(&self, question: QuestionId, score: u8) -> SimResult<()> {
        self.request(|reply| Command::RespondSurvey {
            question,
            score,
            reply,
        })
        .await
    }

    pub async fn submit_survey(&self) -> SimResult<SurveySubmission> {
        self.request(|reply| Command::SubmitSurvey { reply }).await
    }

    pub async fn close_survey(&self) -> SimResult<()> {
        self.send(Command::CloseSurvey).await
    }

    pub async fn shutdown(&self) -> SimResult<()> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> SimResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SimError::RunNotActive)
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> SimResult<T> {
        let (reply, rx) = oneshot::channel();
        self.send(command(reply)).await?;
        rx.await.map_err(|_| SimError::RunNotActive)?
    }
}

pub struct SimulationClock {
    config: SimConfig,
    window: SimWindow,
    recommender: Arc<dyn Recommender>,
    run: SimulationRun,
    speed_multiplier: f64,
    bus: EventBus,
    commands: mpsc::Receiver<Command>,
    advisory_tx: mpsc::UnboundedSender<AdvisoryResponse>,
    advisory_rx: mpsc::UnboundedReceiver<AdvisoryResponse>,
}

impl SimulationClock {
    pub fn new(
        config: SimConfig,
        series: &PriceSeries,
        recommender: Arc<dyn Recommender>,
    ) -> SimResult<(Self, ClockHandle)> {
        config.validate()?;
        let window = series.slice(config.window_length)?;
        let speed_multiplier = config.speed_multiplier;

        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (advisory_tx, advisory_rx) = mpsc::unbounded_channel();
        let bus = EventBus::new(config.event_capacity);

        tracing::info!(
            "Simulation clock ready: {} ({} points), tick every {:?}, recommender {}",
            window.symbol(),
            window.len(),
            config.tick_interval(speed_multiplier),
            recommender.name()
        );

        let clock = Self {
            run: SimulationRun::new(&config, window.clone(), speed_multiplier),
            config,
            window,
            recommender,
            speed_multiplier,
            bus: bus.clone(),
            commands,
            advisory_tx,
            advisory_rx,
        };
        Ok((clock, ClockHandle { tx, bus }))
    }

    /// Drive the run until shutdown or until every handle is dropped.
    /// Returns the run as it stood at that moment.
    pub async fn run(mut self) -> SimulationRun {
        let started = self.run.start();
        self.bus.publish_all(started);
        let mut ticker = self.ticker();

        loop {
            tokio::select! {
                _ = ticker.tick(), if self.run.status() == RunStatus::Running => {
                    self.on_tick();
                }
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => {
                        if self.handle(command) {
                            ticker = self.ticker();
                        }
                    }
                },
                Some(response) = self.advisory_rx.recv() => {
                    let events = self.run.apply_advisory(response);
                    self.bus.publish_all(events);
                }
            }
        }

        tracing::info!(
            "Simulation clock stopped at tick {} ({})",
            self.run.tick_index(),
            self.run.status()
        );
        self.run
    }

    /// First tick one full period from now.
    fn ticker(&self) -> Interval {
        let period = self.tick_interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    fn tick_interval(&self) -> Duration {
        self.config.tick_interval(self.speed_multiplier)
    }

    fn on_tick(&mut self) {
        let outcome = self.run.tick();
        self.bus.publish_all(outcome.events);
        if let Some(request) = outcome.advisory_request {
            self.dispatch(request);
        }
    }

    fn dispatch(&self, request: AdvisoryRequest) {
        let recommender = Arc::clone(&self.recommender);
        let tx = self.advisory_tx.clone();
        tracing::debug!(
            "Requesting advisory for tick {} from {}",
            request.requested_tick,
            recommender.name()
        );
        tokio::spawn(async move {
            let prompt = request.prompt.clone();
            let call = tokio::spawn(async move { recommender.recommend(&prompt).await });
            // A panicking recommender still has to release the gate
            let result = match call.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(
                        "Advisory task for tick {} failed: {}",
                        request.requested_tick,
                        e
                    );
                    Err(SimError::AdvisoryUnavailable(format!("advisor task failed: {}", e)))
                }
            };
            // The clock may have shut down in the meantime
            let _ = tx.send(AdvisoryResponse { request, result });
        });
    }

    /// Replace the run with a fresh one over the same window. Anything still
    /// in flight for the old run is dropped when it arrives.
    fn reset(&mut self) -> RunId {
        let previous = self.run.id();
        self.run = SimulationRun::new(&self.config, self.window.clone(), self.speed_multiplier);
        tracing::info!("Run {} restarted as {}", previous, self.run.id());
        let started = self.run.start();
        self.bus.publish_all(started);
        self.run.id()
    }

    /// Apply a command. Returns true when the tick timer must be rebuilt.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Trade { action, amount } => {
                let events = self.run.trade(action, amount);
                self.bus.publish_all(events);
                false
            }
            Command::SetTradeAmount { amount, reply } => {
                let _ = reply.send(self.run.set_trade_amount(amount));
                false
            }
            Command::SetSpeed { multiplier, reply } => {
                if let Err(e) = validate_speed(multiplier) {
                    let _ = reply.send(Err(e));
                    return false;
                }
                self.speed_multiplier = multiplier;
                tracing::info!(
                    "Speed set to {}x, tick every {:?}",
                    multiplier,
                    self.tick_interval()
                );
                self.bus.publish(SimEvent::notification(
                    Severity::Info,
                    format!("Playback speed set to {}x, restarting the run", multiplier),
                ));
                let _ = reply.send(Ok(self.reset()));
                true
            }
            Command::Restart { reply } => {
                let _ = reply.send(Ok(self.reset()));
                true
            }
            Command::RespondSurvey {
                question,
                score,
                reply,
            } => {
                let _ = reply.send(self.run.record_survey_response(question, score));
                false
            }
            Command::SubmitSurvey { reply } => {
                let result = self.run.submit_survey();
                if let Ok(submission) = &result {
                    self.bus.publish(SimEvent::SurveySubmitted {
                        run_id: self.run.id(),
                        submission: submission.clone(),
                    });
                }
                let _ = reply.send(result);
                false
            }
            Command::CloseSurvey => {
                self.run.close_survey();
                false
            }
            // Intercepted by the run loop
            Command::Shutdown => false,
        }
    }
}
