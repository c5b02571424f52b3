//! OpenAI-compatible chat completion client
//!
//! Works with any service exposing `POST {base_url}/chat/completions`
//! (DeepSeek by default).

use super::{ChatCompletion, ChatRequest};
use crate::messages::Turn;
use crate::{DeskpalError, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the chat completion service
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Optional instructions sent ahead of the history on every request
    pub system_prompt: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com".to_string(),
            api_key: String::new(),
            model: "deepseek-chat".to_string(),
            timeout_secs: 30,
            system_prompt: None,
        }
    }
}

impl ChatConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [Turn],
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Blocking HTTP client for the chat completion endpoint
pub struct OpenAiChatClient {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiChatClient {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DeskpalError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint(),
            api_key: config.api_key.clone(),
        })
    }
}

impl ChatCompletion for OpenAiChatClient {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
        debug!(
            "Chat request: model={}, {} turns",
            request.model,
            request.messages.len()
        );

        let body = CompletionBody {
            model: request.model,
            messages: request.messages,
            stream: false,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .map_err(|e| transport_error(e, request.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!("Chat request returned HTTP {}", status);
            return Err(DeskpalError::TransportFailure(format!(
                "HTTP {}: {}",
                status,
                body.trim()
            )));
        }

        let text = response
            .text()
            .map_err(|e| transport_error(e, request.timeout))?;
        parse_completion(&text)
    }
}

/// Map a reqwest failure onto the error taxonomy
pub(crate) fn transport_error(e: reqwest::Error, timeout: Duration) -> DeskpalError {
    if e.is_timeout() {
        DeskpalError::TimedOut(timeout.as_millis() as u64)
    } else {
        DeskpalError::TransportFailure(e.to_string())
    }
}

/// Extract the assistant content from a completion payload
pub fn parse_completion(payload: &str) -> Result<String> {
    let response: CompletionResponse = serde_json::from_str(payload)
        .map_err(|e| DeskpalError::MalformedResponse(format!("Invalid completion JSON: {}", e)))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| DeskpalError::MalformedResponse("Completion has no message content".into()))
}
