//! Trust Survey Policy
//!
//! Two independent triggers: a short survey after every trade and a
//! detailed one every `milestone_interval` trades. Either pending flag makes
//! the survey active, which suppresses advisories and trades.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sim_core::{SimError, SimResult};

pub type QuestionId = u8;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 7;

pub const SIMPLE_QUESTIONS: [&str; 1] =
    ["How much do you trust the advisor's latest recommendation?"];

/// Trust-in-automation statements, each scored 1 (not at all) to 7 (extremely)
pub const TRUST_STATEMENTS: [&str; 12] = [
    "The advisor is deceptive.",
    "The advisor behaves in an underhanded manner.",
    "I am suspicious of the advisor's intent, action, or outputs.",
    "I am wary of the advisor.",
    "The advisor's actions will have a harmful or injurious outcome.",
    "I am confident in the advisor.",
    "The advisor provides security.",
    "The advisor has integrity.",
    "The advisor is dependable.",
    "The advisor is reliable.",
    "I can trust the advisor.",
    "I am familiar with the advisor.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyMode {
    None,
    Simple,
    Detailed,
}

impl SurveyMode {
    pub fn questions(&self) -> &'static [&'static str] {
        match self {
            SurveyMode::None => &[],
            SurveyMode::Simple => &SIMPLE_QUESTIONS,
            SurveyMode::Detailed => &TRUST_STATEMENTS,
        }
    }
}

impl std::fmt::Display for SurveyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurveyMode::None => write!(f, "none"),
            SurveyMode::Simple => write!(f, "simple"),
            SurveyMode::Detailed => write!(f, "detailed"),
        }
    }
}

/// A completed survey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveySubmission {
    pub mode: SurveyMode,
    /// Trades completed when the survey was answered
    pub trade_count: u32,
    pub responses: BTreeMap<QuestionId, u8>,
}

impl SurveySubmission {
    pub fn mean_score(&self) -> f64 {
        if self.responses.is_empty() {
            return 0.0;
        }
        self.responses.values().map(|&s| s as f64).sum::<f64>() / self.responses.len() as f64
    }
}

#[derive(Debug, Clone)]
pub struct SurveyPolicy {
    milestone_interval: u32,
    trade_count: u32,
    simple_pending: bool,
    detailed_pending: bool,
    responses: BTreeMap<QuestionId, u8>,
}

impl SurveyPolicy {
    pub fn new(milestone_interval: u32) -> Self {
        Self {
            milestone_interval: milestone_interval.max(1),
            trade_count: 0,
            simple_pending: false,
            detailed_pending: false,
            responses: BTreeMap::new(),
        }
    }

    /// Count an executed trade and return the survey modes it triggered.
    pub fn observe_trade(&mut self) -> Vec<SurveyMode> {
        self.trade_count += 1;
        let mut triggered = vec![SurveyMode::Simple];
        self.simple_pending = true;

        if self.trade_count.is_multiple_of(self.milestone_interval) {
            self.detailed_pending = true;
            triggered.push(SurveyMode::Detailed);
        }
        tracing::debug!(
            "Trade #{} triggered survey modes {:?}",
            self.trade_count,
            triggered
        );
        triggered
    }

    pub fn is_active(&self) -> bool {
        self.simple_pending || self.detailed_pending
    }

    /// Detailed takes precedence when both are pending.
    pub fn mode(&self) -> SurveyMode {
        if self.detailed_pending {
            SurveyMode::Detailed
        } else if self.simple_pending {
            SurveyMode::Simple
        } else {
            SurveyMode::None
        }
    }

    pub fn simple_pending(&self) -> bool {
        self.simple_pending
    }

    pub fn detailed_pending(&self) -> bool {
        self.detailed_pending
    }

    pub fn trade_count(&self) -> u32 {
        self.trade_count
    }

    pub fn responses(&self) -> &BTreeMap<QuestionId, u8> {
        &self.responses
    }

    pub fn record_response(&mut self, question: QuestionId, score: u8) -> SimResult<()> {
        let mode = self.mode();
        if mode == SurveyMode::None {
            return Err(SimError::InvalidSurveyResponse("no survey is pending".to_string()));
        }
        if question as usize >= mode.questions().len() {
            return Err(SimError::InvalidSurveyResponse(format!(
                "question {} does not exist in the {} survey",
                question, mode
            )));
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            return Err(SimError::InvalidSurveyResponse(format!(
                "score {} outside {}..={}",
                score, MIN_SCORE, MAX_SCORE
            )));
        }
        self.responses.insert(question, score);
        Ok(())
    }

    /// Finish the current survey once every question has a score.
    pub fn submit(&mut self) -> SimResult<SurveySubmission> {
        let mode = self.mode();
        if mode == SurveyMode::None {
            return Err(SimError::InvalidSurveyResponse("no survey is pending".to_string()));
        }
        let required = mode.questions().len();
        if self.responses.len() < required {
            return Err(SimError::IncompleteSurvey {
                answered: self.responses.len(),
                required,
            });
        }
        let submission = SurveySubmission {
            mode,
            trade_count: self.trade_count,
            responses: std::mem::take(&mut self.responses),
        };
        self.close();
        Ok(submission)
    }

    /// Dismiss every pending survey, discarding partial answers.
    pub fn close(&mut self) {
        self.simple_pending = false;
        self.detailed_pending = false;
        self.responses.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_trade_triggers_simple() {
        let mut policy = SurveyPolicy::new(5);
        for _ in 0..4 {
            assert_eq!(policy.observe_trade(), vec![SurveyMode::Simple]);
            assert_eq!(policy.mode(), SurveyMode::Simple);
            policy.close();
            assert!(!policy.is_active());
        }
    }

    #[test]
    fn test_milestones_fire_exactly_once_each() {
        let mut policy = SurveyPolicy::new(5);
        let mut detailed_at = Vec::new();
        for n in 1..=15u32 {
            let triggered = policy.observe_trade();
            assert!(triggered.contains(&SurveyMode::Simple));
            if triggered.contains(&SurveyMode::Detailed) {
                detailed_at.push(n);
            }
            policy.close();
        }
        assert_eq!(detailed_at, vec![5, 10, 15]);
    }

    #[test]
    fn test_both_flags_pending_and_detailed_wins() {
        let mut policy = SurveyPolicy::new(1);
        policy.observe_trade();
        assert!(policy.simple_pending());
        assert!(policy.detailed_pending());
        assert_eq!(policy.mode(), SurveyMode::Detailed);
    }

    #[test]
    fn test_close_discards_partial_responses() {
        let mut policy = SurveyPolicy::new(1);
        policy.observe_trade();
        policy.record_response(0, 4).unwrap();
        policy.record_response(3, 6).unwrap();

        policy.close();
        assert!(!policy.is_active());
        assert!(policy.responses().is_empty());
        assert_eq!(policy.trade_count(), 1);
    }

    #[test]
    fn test_submit_requires_all_answers() {
        let mut policy = SurveyPolicy::new(1);
        policy.observe_trade();
        policy.record_response(0, 5).unwrap();

        let err = policy.submit().unwrap_err();
        assert_eq!(err, SimError::IncompleteSurvey { answered: 1, required: 12 });
        assert!(policy.is_active());

        for q in 1..12 {
            policy.record_response(q, 7).unwrap();
        }
        let submission = policy.submit().unwrap();
        assert_eq!(submission.mode, SurveyMode::Detailed);
        assert_eq!(submission.responses.len(), 12);
        assert!((submission.mean_score() - (5.0 + 11.0 * 7.0) / 12.0).abs() < 1e-12);
        assert!(!policy.is_active());
    }

    #[test]
    fn test_response_validation() {
        let mut policy = SurveyPolicy::new(5);
        assert!(policy.record_response(0, 4).is_err());

        policy.observe_trade();
        assert!(policy.record_response(1, 4).is_err());
        assert!(policy.record_response(0, 0).is_err());
        assert!(policy.record_response(0, 8).is_err());
        policy.record_response(0, 3).unwrap();
        assert_eq!(policy.submit().unwrap().mode, SurveyMode::Simple);
    }
}
