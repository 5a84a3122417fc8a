use crate::design_doc::DesignDocState;
use audit_inference::InferenceError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Chunker error: {0}")]
    ChunkerError(#[from] audit_code_chunker::ChunkerError),

    #[error("Cache error: {0}")]
    CacheError(#[from] audit_content_cache::CacheError),

    #[error("Inference error: {0}")]
    InferenceError(#[from] InferenceError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Illegal design document transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: DesignDocState,
        to: DesignDocState,
    },

    #[error("Unknown wear: {0}")]
    UnknownWear(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl PipelineError {
    /// Errors that must abort the whole run rather than one file or chunk
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InferenceError(e) if e.is_fatal())
    }

    pub(crate) fn invalid_path(path: &std::path::Path, why: &str) -> Self {
        Self::InvalidPath(format!("{}: {why}", path.display()))
    }
}
