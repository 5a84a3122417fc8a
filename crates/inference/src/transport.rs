use crate::config::ModelConfig;
use crate::error::{InferenceError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

const ERROR_BODY_PREVIEW: usize = 200;

/// One chat completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub user_content: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: f32,
    pub json_mode: bool,
}

impl ChatRequest {
    /// OpenAI-compatible request body
    #[must_use]
    pub fn payload(&self) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": self.system_prompt},
                {"role": "user", "content": self.user_content},
            ],
            "temperature": self.temperature,
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if self.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }
}

/// Sends a chat request and returns the assistant message text
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

/// `reqwest` transport for `POST {base}/chat/completions`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| InferenceError::fatal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: config.chat_completions_url(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let mut builder = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&request.payload());
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                InferenceError::fatal(format!("Invalid request to {}: {e}", self.url))
            } else {
                InferenceError::transient(format!("Request to {} failed: {e}", self.url))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| InferenceError::malformed(format!("Response is not JSON: {e}")))?;
        message_content(&envelope)
    }
}

/// Map a non-success HTTP status to the error taxonomy
#[must_use]
pub fn classify_status(status: u16, body: &str) -> InferenceError {
    let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
    let msg = format!("API error {status}: {preview}");
    match status {
        401 | 403 => InferenceError::fatal(format!("{msg} (check LLM_API_KEY)")),
        404 => InferenceError::fatal(format!(
            "{msg} (check LLM_API_BASE_URL and LLM_MODEL_NAME)"
        )),
        408 | 429 | 500..=599 => InferenceError::transient(msg),
        _ => InferenceError::fatal(msg),
    }
}

/// `choices[0].message.content` of a chat completion envelope
pub fn message_content(envelope: &Value) -> Result<String> {
    envelope
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            InferenceError::malformed("Response has no choices[0].message.content")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(max_tokens: Option<u32>, json_mode: bool) -> ChatRequest {
        ChatRequest {
            system_prompt: "sys".into(),
            user_content: "code".into(),
            model: "gpt-oss:120b".into(),
            max_tokens,
            temperature: 0.2,
            json_mode,
        }
    }

    #[test]
    fn payload_omits_unset_max_tokens() {
        let body = request(None, true).payload();
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["response_format"], json!({"type": "json_object"}));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "code");
    }

    #[test]
    fn payload_text_mode_with_limit() {
        let body = request(Some(4096), false).payload();
        assert_eq!(body["max_tokens"], 4096);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn status_mapping() {
        assert!(classify_status(401, "").is_fatal());
        assert!(classify_status(404, "no such model").is_fatal());
        assert!(classify_status(400, "bad").is_fatal());
        assert!(matches!(classify_status(429, ""), InferenceError::Transient(_)));
        assert!(matches!(classify_status(503, ""), InferenceError::Transient(_)));
        assert!(matches!(classify_status(408, ""), InferenceError::Transient(_)));
    }

    #[test]
    fn content_is_read_from_first_choice() {
        let envelope = json!({"choices": [{"message": {"role": "assistant", "content": "{}"}}]});
        assert_eq!(message_content(&envelope).unwrap(), "{}");
        assert!(matches!(
            message_content(&json!({"choices": []})),
            Err(InferenceError::MalformedResponse(_))
        ));
    }
}
