//! Reasoning-service clients
//!
//! [`ReasoningClient`] is the seam between the bridge and whatever external
//! service turns a prompt into a completion. The HTTP implementation speaks
//! the common chat-completions shape; a mock lives here for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::BridgeError;

/// Environment variable carrying the reasoning-service API key.
pub const API_KEY_ENV: &str = "WORKBENCH_REASONING_API_KEY";
/// Environment variable overriding the reasoning-service base URL.
pub const BASE_URL_ENV: &str = "WORKBENCH_REASONING_BASE_URL";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Trait for reasoning-service implementations.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Obtain a completion for a system instruction plus user content.
    async fn complete(&self, system: &str, user: &str) -> Result<String, BridgeError>;

    /// Model identifier, for logging only.
    fn model_name(&self) -> &str;
}

/// Chat-completions request body.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Chat-completions response body (only the fields we read).
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// HTTP client for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    base_url: String,
    api_key: String,
    model: String,
    timeout_seconds: u64,
    temperature: f32,
    client: reqwest::Client,
}

impl ChatClient {
    /// Create a client against an explicit endpoint.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout_seconds: 60,
            temperature: 0.1,
            client: reqwest::Client::new(),
        }
    }

    /// Create a client from the environment. A missing key is not an error
    /// here; the first completion attempt degrades instead, which keeps the
    /// caller's never-failing contract intact.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        Self::new(base_url, api_key, DEFAULT_MODEL)
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ReasoningClient for ChatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, BridgeError> {
        if self.api_key.is_empty() {
            return Err(BridgeError::Config(format!(
                "no API key configured (set {API_KEY_ENV})"
            )));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        tracing::debug!(%url, model = %self.model, "sending reasoning request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .timeout(std::time::Duration::from_secs(self.timeout_seconds))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BridgeError::Timeout(self.timeout_seconds)
                } else {
                    BridgeError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| BridgeError::Parse(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BridgeError::Parse("response carried no completion".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// A mock client for exercising the bridge without a network.
pub struct MockReasoningClient {
    response: Result<String, fn() -> BridgeError>,
}

impl MockReasoningClient {
    /// A mock that returns the given completion.
    pub fn replying(response: impl Into<String>) -> Self {
        Self {
            response: Ok(response.into()),
        }
    }

    /// A mock that fails every completion with a connection error.
    pub fn failing() -> Self {
        Self {
            response: Err(|| BridgeError::Connection("mock failure".to_string())),
        }
    }
}

#[async_trait]
impl ReasoningClient for MockReasoningClient {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, BridgeError> {
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(make) => Err(make()),
        }
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
