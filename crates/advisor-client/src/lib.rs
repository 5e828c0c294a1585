pub mod chat;
pub mod error;
pub mod heuristic;

pub use chat::ChatAdvisorClient;
pub use error::{AdvisorError, AdvisorResult};
pub use heuristic::HeuristicAdvisor;

use std::time::Duration;

/// Configuration for the chat-completion advisor
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("ADVISOR_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("ADVISOR_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("ADVISOR_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            temperature: 0.2,
            timeout: Duration::from_secs(20),
        }
    }
}
