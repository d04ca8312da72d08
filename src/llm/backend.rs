//! Model backends
//!
//! Each backend is a thin, hand-rolled client over one provider's HTTP API.
//! The reasoning loop and the dual dispatcher only see the `ChatBackend`
//! trait, which keeps them provider-agnostic and lets tests substitute a
//! scripted backend.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{BackendConfig, Provider};

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";
const OPENAI_BASE_URL: &str = "https://api.openai.com";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Failure of a single backend completion.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {backend} failed: {message}")]
    Transport { backend: String, message: String },

    #[error("{backend} API error ({status}): {message}")]
    Api {
        backend: String,
        status: u16,
        message: String,
    },

    #[error("{backend} returned an empty completion")]
    Empty { backend: String },
}

/// A remote model that turns a system prompt plus a user prompt into text.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, BackendError>;
}

/// Retry a completion with linear backoff. Transport and API failures both
/// count as attempts; the last error is surfaced unchanged.
pub async fn complete_with_retry(
    backend: &dyn ChatBackend,
    system: &str,
    prompt: &str,
    max_retries: u32,
) -> Result<String, BackendError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match backend.complete(system, prompt).await {
            Ok(text) => return Ok(text),
            Err(e) if attempt <= max_retries => {
                warn!(backend = backend.name(), attempt, error = %e, "completion failed, retrying");
                tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Build a backend from its config section, pulling the API key from the
/// configured environment variable.
pub fn from_config(cfg: &BackendConfig) -> Result<Arc<dyn ChatBackend>> {
    let api_key = std::env::var(&cfg.api_key_env)
        .with_context(|| format!("environment variable {} is not set", cfg.api_key_env))?;
    let backend: Arc<dyn ChatBackend> = match cfg.provider {
        Provider::Anthropic => Arc::new(AnthropicBackend::new(
            cfg.model.clone(),
            api_key,
            cfg.base_url.clone(),
            cfg.max_tokens,
        )?),
        Provider::Openai => Arc::new(OpenAiBackend::new(
            cfg.model.clone(),
            api_key,
            cfg.base_url.clone(),
        )?),
    };
    Ok(backend)
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(format!("vigil/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")
}

fn transport(backend: &str, e: reqwest::Error) -> BackendError {
    BackendError::Transport {
        backend: backend.to_string(),
        message: e.to_string(),
    }
}

// =============================================================================
// Anthropic Messages API
// =============================================================================

/// Client for the Anthropic `/v1/messages` endpoint.
pub struct AnthropicBackend {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContent {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

impl AnthropicBackend {
    pub fn new(
        model: String,
        api_key: String,
        base_url: Option<String>,
        max_tokens: u32,
    ) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            base_url: base_url.unwrap_or_else(|| ANTHROPIC_BASE_URL.to_string()),
            model,
            api_key,
            max_tokens,
        })
    }
}

#[async_trait]
impl ChatBackend for AnthropicBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, BackendError> {
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };
        debug!(model = %self.model, "anthropic: sending completion request");

        let response = self
            .http
            .post(format!(
                "{}/v1/messages",
                self.base_url.trim_end_matches('/')
            ))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport(&self.model, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(BackendError::Api {
                backend: self.model.clone(),
                status: status.as_u16(),
                message,
            });
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| transport(&self.model, e))?;

        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicContent::Text { text } => Some(text),
                AnthropicContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(BackendError::Empty {
                backend: self.model.clone(),
            });
        }
        Ok(text)
    }
}

// =============================================================================
// OpenAI-compatible chat completions
// =============================================================================

/// Client for an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiBackend {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

impl OpenAiBackend {
    pub fn new(model: String, api_key: String, base_url: Option<String>) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            base_url: base_url.unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            model,
            api_key,
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, BackendError> {
        let request = OpenAiRequest {
            model: &self.model,
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: 0.0,
        };
        debug!(model = %self.model, "openai: sending completion request");

        let response = self
            .http
            .post(format!(
                "{}/v1/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport(&self.model, e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                backend: self.model.clone(),
                status: status.as_u16(),
                message,
            });
        }

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| transport(&self.model, e))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(BackendError::Empty {
                backend: self.model.clone(),
            });
        }
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Scripted backend: pops one canned reply per `complete` call.
    pub struct ScriptedBackend {
        label: String,
        replies: Mutex<Vec<Result<String, String>>>,
    }

    impl ScriptedBackend {
        pub fn new(label: &str, replies: Vec<Result<&str, &str>>) -> Self {
            Self {
                label: label.to_string(),
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .rev()
                        .map(|r| r.map(String::from).map_err(String::from))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        fn name(&self) -> &str {
            &self.label
        }

        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, BackendError> {
            let next = self.replies.lock().unwrap().pop();
            match next {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(BackendError::Transport {
                    backend: self.label.clone(),
                    message,
                }),
                None => Err(BackendError::Empty {
                    backend: self.label.clone(),
                }),
            }
        }
    }
}
