//! OpenAI-compatible chat completion client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokitsuzuri_core::config::CompletionConfig;
use tokitsuzuri_core::{Message, Settings};
use tracing::{debug, error, warn};

use crate::base::{ClientFactory, CompletionClient, CompletionError, CompletionResult};

/// Chat completion request body
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for `<api_base>/chat/completions`
pub struct OpenAiClient {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|e| {
                    warn!("Failed to build HTTP client, timeout not applied: {}", e);
                    Client::new()
                }),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn build_request<'a>(
        &'a self,
        system_prompt: &str,
        history: &[Message],
        max_tokens: u32,
        temperature: f32,
    ) -> ChatCompletionRequest<'a> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(system_prompt));
        messages.extend_from_slice(history);
        ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens,
            temperature,
        }
    }

    /// Take the first choice's text
    fn parse_response(response: ChatCompletionResponse) -> CompletionResult<String> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::Transport("No choices in response".to_string()))?;

        match choice.message.content {
            Some(content) if !content.is_empty() => Ok(content),
            _ => Err(CompletionError::Transport(
                "Response choice has no content".to_string(),
            )),
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Message],
        max_tokens: u32,
        temperature: f32,
    ) -> CompletionResult<String> {
        let request = self.build_request(system_prompt, history, max_tokens, temperature);
        let url = self.endpoint();

        debug!(
            "Sending chat request to {} with model {} ({} messages)",
            url,
            self.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Chat completion failed: {} - {}", status, error_text);
            return Err(CompletionError::from_status(status.as_u16(), error_text));
        }

        let body = response.text().await?;
        let response_data: ChatCompletionResponse = serde_json::from_str(&body)?;
        Self::parse_response(response_data)
    }
}

/// Builds [`OpenAiClient`]s against a fixed endpoint
#[derive(Debug, Clone)]
pub struct OpenAiClientFactory {
    api_base: String,
    timeout: Duration,
}

impl OpenAiClientFactory {
    pub fn new(config: &CompletionConfig) -> Self {
        Self {
            api_base: config.api_base.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl ClientFactory for OpenAiClientFactory {
    fn create(&self, settings: &Settings) -> Arc<dyn CompletionClient> {
        Arc::new(OpenAiClient::new(
            settings.api_key.clone(),
            settings.model.clone(),
            self.api_base.clone(),
            self.timeout,
        ))
    }
}
