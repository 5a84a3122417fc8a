use crate::error::{InferenceError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(2);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3600);
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Endpoint, model and retry policy for an OpenAI-compatible chat API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub api_base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model_name: String,
    /// `None` leaves the limit to the model
    pub max_output_tokens: Option<u32>,
    pub max_attempts: u32,
    #[serde(with = "duration_secs")]
    pub base_backoff: Duration,
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    pub temperature: f32,
}

impl ModelConfig {
    pub fn new(api_base_url: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            api_key: None,
            model_name: model_name.into(),
            max_output_tokens: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_max_output_tokens(mut self, tokens: Option<u32>) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.base_backoff = base;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let base = self.api_base_url.trim();
        if base.is_empty() {
            return Err(InferenceError::fatal("LLM_API_BASE_URL is not set"));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(InferenceError::fatal(format!(
                "API base URL must start with http:// or https://, got {base}"
            )));
        }
        if self.model_name.trim().is_empty() {
            return Err(InferenceError::fatal("LLM_MODEL_NAME is not set"));
        }
        if self.max_attempts == 0 {
            return Err(InferenceError::fatal("max_attempts must be at least 1"));
        }
        Ok(())
    }

    #[must_use]
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base_url.trim().trim_end_matches('/'))
    }

    /// Delay before retry number `retry` (1-based)
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(5);
        self.base_backoff.saturating_mul(factor)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
