//! Chat completions client
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint (SiliconFlow,
//! DeepSeek, ...). One call per rendered prompt; HTTP failures are classified
//! into [`UnitFailure`] variants so callers can tell authentication, quota and
//! rate-limit problems apart from generic backend errors.

use crate::types::{RenderedPrompt, TextGenerator, UnitFailure};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use scribe_common::config::BackendProfile;
use scribe_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("scribe-gen/", env!("CARGO_PKG_VERSION"));

/// Longest backend error message carried into a failure detail
const MAX_ERROR_CHARS: usize = 300;

/// Chat completions request body
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Chat completions response (only the fields we read)
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

/// OpenAI-compatible chat completions client
pub struct ChatClient {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
    rate_limiter: Option<DefaultDirectRateLimiter>,
}

impl ChatClient {
    /// Create client for a backend profile with an already-resolved key
    pub fn new(profile: &BackendProfile, api_key: String) -> Result<Self> {
        let timeout = Duration::from_secs(profile.timeout_secs.max(1));
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client build failed: {}", e)))?;

        let rate_limiter = profile
            .requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            http_client,
            endpoint: chat_endpoint(&profile.base_url),
            model: profile.model.clone(),
            api_key,
            timeout,
            rate_limiter,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// `<base_url>/chat/completions`, tolerating a trailing slash
pub fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Pull a readable message out of an error body
///
/// Handles `{"error": {"message": ...}}`, `{"message": ...}` and plain text.
fn extract_error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.pointer("/error/message")
                .or_else(|| json.get("message"))
                .or_else(|| json.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });

    let message = from_json.unwrap_or_else(|| body.trim().to_string());
    if message.chars().count() > MAX_ERROR_CHARS {
        let truncated: String = message.chars().take(MAX_ERROR_CHARS).collect();
        format!("{}...", truncated)
    } else {
        message
    }
}

#[async_trait]
impl TextGenerator for ChatClient {
    fn name(&self) -> &'static str {
        "chat-completions"
    }

    async fn generate(&self, prompt: &RenderedPrompt) -> std::result::Result<String, UnitFailure> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };

        debug!(endpoint = %self.endpoint, model = %self.model, "Sending chat completion request");

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UnitFailure::Timeout(self.timeout)
                } else {
                    UnitFailure::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(UnitFailure::from_status(
                status.as_u16(),
                extract_error_message(&error_text),
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| UnitFailure::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| UnitFailure::MalformedResponse("response has no message content".to_string()))
    }
}
