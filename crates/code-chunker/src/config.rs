use serde::{Deserialize, Serialize};

/// Default character ceiling for a single chunk.
///
/// Characters approximate tokens at roughly four per token; 2000 chars
/// leaves room in a 4k-token context for the system prompt and the reply.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 2000;

/// Configuration for code chunking behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk size in characters (hard limit enforced by the size guard)
    pub max_chunk_chars: usize,

    /// Emit `<module>` chunks for top-level code outside any definition
    pub emit_module_block: bool,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            emit_module_block: true,
        }
    }
}

impl ChunkerConfig {
    /// Config with a custom character ceiling
    pub fn with_max_chars(max_chunk_chars: usize) -> Self {
        Self {
            max_chunk_chars,
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_chunk_chars == 0 {
            return Err("max_chunk_chars must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = ChunkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_chunk_chars, 2000);
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        assert!(ChunkerConfig::with_max_chars(0).validate().is_err());
        assert!(ChunkerConfig::with_max_chars(1).validate().is_ok());
    }
}
