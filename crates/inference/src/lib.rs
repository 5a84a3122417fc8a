//! Client for OpenAI-compatible chat completion APIs.
//!
//! [`InferenceClient`] adds bounded retries with exponential backoff,
//! tolerant JSON extraction and a stricter re-prompt when a reply does not
//! parse. The HTTP layer sits behind [`ChatTransport`] so callers can run
//! against a scripted transport in tests.

mod client;
mod config;
mod error;
mod json;
mod transport;

pub use client::{InferenceClient, JSON_REMINDER};
pub use config::{
    ModelConfig, DEFAULT_BASE_BACKOFF, DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_TEMPERATURE,
};
pub use error::{InferenceError, Result};
pub use json::parse_json_object;
pub use transport::{classify_status, message_content, ChatRequest, ChatTransport, HttpTransport};
