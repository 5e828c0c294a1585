use sim_core::SimError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty response")]
    EmptyResponse,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<AdvisorError> for SimError {
    fn from(err: AdvisorError) -> Self {
        SimError::AdvisoryUnavailable(err.to_string())
    }
}

pub type AdvisorResult<T> = Result<T, AdvisorError>;
