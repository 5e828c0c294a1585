use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Insufficient funds: need {required:.2}, have {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("Insufficient holdings: need {required:.2} in value, hold {available:.2}")]
    InsufficientHoldings { required: f64, available: f64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Advisory unavailable: {0}")]
    AdvisoryUnavailable(String),

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("A survey is pending; dismiss or submit it first")]
    SurveyPending,

    #[error("Invalid survey response: {0}")]
    InvalidSurveyResponse(String),

    #[error("Survey incomplete: {answered} of {required} questions answered")]
    IncompleteSurvey { answered: usize, required: usize },

    #[error("Run is not active")]
    RunNotActive,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl SimError {
    /// Errors that only warn the user and leave the run untouched.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SimError::DataSource(_) | SimError::InvalidConfig(_))
    }
}

pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SimError::InsufficientFunds {
            required: 150.15,
            available: 100.0,
        };
        assert_eq!(err.to_string(), "Insufficient funds: need 150.15, have 100.00");
        assert_eq!(
            SimError::IncompleteSurvey { answered: 3, required: 12 }.to_string(),
            "Survey incomplete: 3 of 12 questions answered"
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(SimError::SurveyPending.is_recoverable());
        assert!(SimError::AdvisoryUnavailable("timeout".into()).is_recoverable());
        assert!(!SimError::DataSource("down".into()).is_recoverable());
    }
}
