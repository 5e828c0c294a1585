use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sim_core::{Recommender, SimError};

use crate::error::{AdvisorError, AdvisorResult};
use crate::AdvisorConfig;

const SYSTEM_PROMPT: &str = "You are a cautious currency trading assistant inside an \
educational simulator. Answer briefly.";

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completion advisor
#[derive(Clone)]
pub struct ChatAdvisorClient {
    client: reqwest::Client,
    config: AdvisorConfig,
}

impl ChatAdvisorClient {
    pub fn new(config: AdvisorConfig) -> AdvisorResult<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub async fn complete(&self, prompt: &str) -> AdvisorResult<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            return Err(AdvisorError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        extract_reply(&body)
    }
}

fn extract_reply(body: &str) -> AdvisorResult<String> {
    let parsed: ChatResponse = serde_json::from_str(body)?;
    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| AdvisorError::InvalidResponse("no choices in completion".to_string()))?;

    if text.trim().is_empty() {
        return Err(AdvisorError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl Recommender for ChatAdvisorClient {
    async fn recommend(&self, prompt: &str) -> Result<String, SimError> {
        self.complete(prompt).await.map_err(|e| {
            tracing::warn!("Chat advisor request failed: {}", e);
            e.into()
        })
    }

    fn name(&self) -> &'static str {
        "chat"
    }
}
