use thiserror::Error;

pub type Result<T> = std::result::Result<T, InferenceError>;

#[derive(Error, Debug)]
pub enum InferenceError {
    /// The service answered, but not with something usable
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    /// Timeouts, rate limits, server errors and network failures
    #[error("Transient inference failure: {0}")]
    Transient(String),

    /// Bad endpoint, model or credentials; retrying cannot help
    #[error("Inference configuration error: {0}")]
    FatalConfiguration(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl InferenceError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::FatalConfiguration(msg.into())
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalConfiguration(_))
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::MalformedResponse(_))
    }
}
