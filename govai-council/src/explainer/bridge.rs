//! Bridge to the text-generation service.
//!
//! The explainer treats text generation as a black box: a prompt goes in,
//! text comes out, and any failure is reported as an error for the caller
//! to capture.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use govai_common::LlmConfig;

/// Prompt-in, text-out generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Configuration for the LLM bridge.
#[derive(Debug, Clone)]
pub struct LlmBridgeConfig {
    /// Chat API base URL
    pub endpoint: String,
    /// Agent name to route the request to
    pub agent: String,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum retries for failed requests
    pub max_retries: u32,
    /// Backoff duration between retries
    pub retry_backoff: Duration,
}

impl Default for LlmBridgeConfig {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

impl From<&LlmConfig> for LlmBridgeConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            agent: config.agent.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Request body for the chat endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub channel: String,
    pub agent: String,
    pub message: String,
    pub stream: bool,
}

/// Response body from the chat endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub content: String,
}

/// HTTP text generator backed by the chat API.
pub struct LlmBridge {
    config: LlmBridgeConfig,
    client: reqwest::Client,
}

impl LlmBridge {
    /// Create a new bridge with the given configuration.
    pub fn new(config: LlmBridgeConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { config, client }
    }

    pub fn config(&self) -> &LlmBridgeConfig {
        &self.config
    }

    /// Send a request with retry logic.
    async fn send_request(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/api/v1/chat", self.config.endpoint);
        let max_attempts = self.config.max_retries + 1;

        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.try_send(&url, request).await {
                Ok(response) => {
                    info!(agent = %request.agent, attempt, "Generation request successful");
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        agent = %request.agent,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Generation request failed"
                    );
                    last_error = Some(e);

                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.retry_backoff).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Generation request was not attempted")))
    }

    /// Try to send a single request.
    async fn try_send(&self, url: &str, request: &ChatRequest) -> Result<ChatResponse> {
        debug!(url, agent = %request.agent, "Sending generation request");

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .context("Failed to send request to text-generation service")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Text-generation service error: HTTP {} - {}", status, error_text);
        }

        response
            .json::<ChatResponse>()
            .await
            .context("Failed to parse text-generation response")
    }
}

#[async_trait]
impl TextGenerator for LlmBridge {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            user_id: "govai-council".to_string(),
            channel: "api".to_string(),
            agent: self.config.agent.clone(),
            message: prompt.to_string(),
            stream: false,
        };

        let response = self.send_request(&request).await?;
        Ok(response.content)
    }
}
