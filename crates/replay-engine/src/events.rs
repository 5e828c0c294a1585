use serde::Serialize;
use sim_core::{Advisory, PricePoint, Severity};
use tokio::sync::broadcast;

use crate::run::{RunId, TradeRecord};
use crate::summary::ResultsSummary;
use crate::survey::{SurveyMode, SurveySubmission};

/// Everything the presentation layer needs to render a session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    RunStarted {
        run_id: RunId,
        symbol: String,
        window_length: usize,
        speed_multiplier: f64,
    },
    Tick {
        run_id: RunId,
        tick: u64,
        point: PricePoint,
        total_asset_value: f64,
    },
    AdvisoryReady {
        run_id: RunId,
        requested_tick: u64,
        /// Tick the run had reached when the advice arrived
        delivered_tick: u64,
        window: Vec<PricePoint>,
        advisory: Advisory,
    },
    TradeExecuted {
        run_id: RunId,
        record: TradeRecord,
    },
    SurveyRequired {
        run_id: RunId,
        mode: SurveyMode,
    },
    SurveySubmitted {
        run_id: RunId,
        submission: SurveySubmission,
    },
    RunCompleted {
        run_id: RunId,
        summary: ResultsSummary,
    },
    Notification {
        severity: Severity,
        message: String,
    },
}

impl SimEvent {
    pub fn notification(severity: Severity, message: impl Into<String>) -> Self {
        SimEvent::Notification {
            severity,
            message: message.into(),
        }
    }

    pub fn run_id(&self) -> Option<RunId> {
        match self {
            SimEvent::RunStarted { run_id, .. }
            | SimEvent::Tick { run_id, .. }
            | SimEvent::AdvisoryReady { run_id, .. }
            | SimEvent::TradeExecuted { run_id, .. }
            | SimEvent::SurveyRequired { run_id, .. }
            | SimEvent::SurveySubmitted { run_id, .. }
            | SimEvent::RunCompleted { run_id, .. } => Some(*run_id),
            SimEvent::Notification { .. } => None,
        }
    }
}

/// Fan-out of engine events to any number of subscribers
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SimEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: SimEvent) {
        // No subscribers is fine; the run does not depend on being observed
        let _ = self.tx.send(event);
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = SimEvent>) {
        for event in events {
            self.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = SimEvent::notification(Severity::Warning, "Insufficient funds");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "notification");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["message"], "Insufficient funds");
        assert!(event.run_id().is_none());
    }

    #[tokio::test]
    async fn test_bus_delivers_to_subscribers() {
        let bus = EventBus::new(8);
        bus.publish(SimEvent::notification(Severity::Info, "dropped"));

        let mut rx = bus.subscribe();
        let run_id = RunId::new();
        bus.publish(SimEvent::SurveyRequired {
            run_id,
            mode: SurveyMode::Simple,
        });

        let received = rx.recv().await.unwrap();
        assert_eq!(received.run_id(), Some(run_id));
    }
}
