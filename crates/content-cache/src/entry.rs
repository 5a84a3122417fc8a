use crate::fingerprint::Fingerprint;
use audit_code_chunker::{parent_chunk_id, Chunk};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Everything needed to address and attribute one cached inference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub fingerprint: Fingerprint,
    pub chunk_id: String,
    pub wear_id: String,
    pub model_name: String,
}

impl CacheKey {
    #[must_use]
    pub fn new(
        source_text: &str,
        chunk_id: impl Into<String>,
        wear_id: impl Into<String>,
        model_name: impl Into<String>,
        max_output_tokens: Option<u32>,
    ) -> Self {
        let wear_id = wear_id.into();
        let model_name = model_name.into();
        Self {
            fingerprint: Fingerprint::compute(
                source_text,
                &wear_id,
                &model_name,
                max_output_tokens,
            ),
            chunk_id: chunk_id.into(),
            wear_id,
            model_name,
        }
    }

    #[must_use]
    pub fn for_chunk(
        chunk: &Chunk,
        wear_id: &str,
        model_name: &str,
        max_output_tokens: Option<u32>,
    ) -> Self {
        Self::new(
            &chunk.source_text,
            chunk.chunk_id.clone(),
            wear_id,
            model_name,
            max_output_tokens,
        )
    }

    /// Chunk id the entry is indexed under for invalidation
    #[must_use]
    pub fn index_id(&self) -> &str {
        parent_chunk_id(&self.chunk_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub chunk_id: String,
    pub wear_id: String,
    pub model_name: String,
    pub result: Value,
    /// Unix seconds
    pub created_at: u64,
}

impl CacheEntry {
    pub(crate) fn new(key: &CacheKey, result: Value) -> Self {
        Self {
            fingerprint: key.fingerprint.to_string(),
            chunk_id: key.chunk_id.clone(),
            wear_id: key.wear_id.clone(),
            model_name: key.model_name.clone(),
            result,
            created_at: unix_now(),
        }
    }
}

/// Fingerprints recorded for one parent chunk id
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct ChunkIndex {
    pub chunk_id: String,
    pub fingerprints: Vec<String>,
}

#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
