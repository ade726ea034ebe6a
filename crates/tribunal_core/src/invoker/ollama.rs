//! Ollama-backed reasoning capability.
//!
//! Non-streaming `/api/chat` calls with `format: "json"`. HTTP 401/403 map to
//! authentication failures; anything else that goes wrong on the wire is a
//! transport failure.

use super::capability::{CapabilityFailure, ReasoningCapability, ReasoningRequest};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};
use tribunal_common::ReasonerConfig;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    format: &'a str,
    options: ChatOptions,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatReplyMessage,
}

pub struct OllamaCapability {
    http_client: reqwest::Client,
    url: String,
    model: String,
    temperature: f64,
}

impl OllamaCapability {
    pub fn new(config: &ReasonerConfig) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.request_timeout_secs))
                .build()
                .unwrap_or_default(),
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn classify(e: reqwest::Error) -> CapabilityFailure {
    if e.is_timeout() {
        CapabilityFailure::Timeout
    } else {
        CapabilityFailure::Transport(e.to_string())
    }
}

fn status_failure(status: StatusCode, body: &str) -> CapabilityFailure {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        CapabilityFailure::Authentication(format!("HTTP {}", status))
    } else {
        CapabilityFailure::Transport(format!("HTTP {}: {}", status, body))
    }
}

#[async_trait]
impl ReasoningCapability for OllamaCapability {
    async fn reason(&self, request: &ReasoningRequest) -> Result<String, CapabilityFailure> {
        let prompt = request.render_prompt();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            stream: false,
            format: "json",
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        debug!("[>] {} ({} prompt chars)", self.model, prompt.len());
        let response = self
            .http_client
            .post(format!("{}/api/chat", self.url))
            .json(&body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("[-] Ollama error {}: {}", status, text);
            return Err(status_failure(status, &text));
        }

        let chat: ChatResponse = response.json().await.map_err(classify)?;
        debug!("[<] {} ({} chars)", self.model, chat.message.content.len());
        Ok(chat.message.content)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
