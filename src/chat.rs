//! Remote chat sink.
//!
//! The sink is a black box taking a role-tagged message list and returning
//! the reply text. [`OllamaClient`] talks to an Ollama server's
//! `/api/chat` endpoint with a blocking HTTP client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ChatConfig;

/// Errors from a chat round-trip.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("empty response from model {model}")]
    EmptyResponse { model: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Anything that can answer a list of chat messages.
pub trait ChatSink {
    fn send(&self, messages: &[ChatMessage]) -> Result<String, ChatError>;
}

impl<S: ChatSink + ?Sized> ChatSink for &S {
    fn send(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        (**self).send(messages)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

/// Blocking client for an Ollama server.
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OllamaClient {
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ChatSink for OllamaClient {
    fn send(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json()?;
        reply
            .message
            .map(|m| m.content)
            .ok_or_else(|| ChatError::EmptyResponse {
                model: self.model.clone(),
            })
    }
}

/// Send `messages`, logging both directions.
///
/// Failures are logged and returned as an `Error: ...` string so a caller
/// processing many repositories can carry on.
pub fn send_or_report(sink: &dyn ChatSink, messages: &[ChatMessage]) -> String {
    if let Some(last) = messages.last() {
        tracing::info!(role = ?last.role, content = %last.content, "sending chat request");
    }

    match sink.send(messages) {
        Ok(reply) => {
            tracing::info!(content = %reply, "received chat response");
            reply
        }
        Err(e) => {
            tracing::error!(error = %e, "chat request failed");
            format!("Error: {e}")
        }
    }
}
