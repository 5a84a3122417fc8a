use crate::config::ModelConfig;
use crate::error::{InferenceError, Result};
use crate::json::parse_json_object;
use crate::transport::{ChatRequest, ChatTransport, HttpTransport};
use serde_json::Value;
use std::sync::Arc;

/// Appended to the user content on every JSON retry
pub const JSON_REMINDER: &str = "Return valid JSON only. Do not include any prose or code fences.";

/// Retrying front end over a [`ChatTransport`]
#[derive(Clone)]
pub struct InferenceClient {
    config: ModelConfig,
    transport: Arc<dyn ChatTransport>,
}

impl std::fmt::Debug for InferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceClient")
            .field("model", &self.config.model_name)
            .field("url", &self.config.chat_completions_url())
            .finish_non_exhaustive()
    }
}

impl InferenceClient {
    /// Client talking HTTP to the configured endpoint
    pub fn new(config: ModelConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ModelConfig, transport: Arc<dyn ChatTransport>) -> Self {
        Self { config, transport }
    }

    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }

    #[must_use]
    pub fn max_output_tokens(&self) -> Option<u32> {
        self.config.max_output_tokens
    }

    /// Ask for a JSON object, re-prompting on unparsable replies
    pub async fn infer_json(&self, system_prompt: &str, user_content: &str) -> Result<Value> {
        let mut last_err = None;
        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.backoff(attempt - 1)).await;
            }
            let content = if attempt == 1 {
                user_content.to_string()
            } else {
                format!("{user_content}\n\n{JSON_REMINDER}")
            };

            let reply = match self.send(system_prompt, content, true).await {
                Ok(reply) => reply,
                Err(e) if e.is_retryable() => {
                    log::warn!("Inference attempt {attempt}/{} failed: {e}", self.config.max_attempts);
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(value) = parse_json_object(&reply) {
                return Ok(value);
            }
            let preview: String = reply.chars().take(120).collect();
            log::warn!(
                "Attempt {attempt}/{} returned non-JSON content: {preview:?}",
                self.config.max_attempts
            );
            last_err = Some(InferenceError::malformed(format!(
                "Reply is not a JSON object: {preview}"
            )));
        }
        Err(last_err.unwrap_or_else(|| InferenceError::transient("No inference attempts made")))
    }

    /// Ask for free-form text
    pub async fn infer_text(&self, system_prompt: &str, user_content: &str) -> Result<String> {
        let mut last_err = None;
        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.backoff(attempt - 1)).await;
            }
            match self.send(system_prompt, user_content.to_string(), false).await {
                Ok(reply) if !reply.trim().is_empty() => return Ok(reply),
                Ok(_) => {
                    log::warn!("Attempt {attempt}/{} returned an empty reply", self.config.max_attempts);
                    last_err = Some(InferenceError::malformed("Empty reply"));
                }
                Err(e) if e.is_retryable() => {
                    log::warn!("Inference attempt {attempt}/{} failed: {e}", self.config.max_attempts);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| InferenceError::transient("No inference attempts made")))
    }

    async fn send(&self, system_prompt: &str, user_content: String, json_mode: bool) -> Result<String> {
        let request = ChatRequest {
            system_prompt: system_prompt.to_string(),
            user_content,
            model: self.config.model_name.clone(),
            max_tokens: self.config.max_output_tokens,
            temperature: self.config.temperature,
            json_mode,
        };
        self.transport.complete(&request).await
    }
}
