//! Run settings from `.env` and the process environment.

use anyhow::{bail, Context as AnyhowContext, Result};
use audit_inference::ModelConfig;
use audit_pipeline::{parse_concurrency, PipelineConfig, CONCURRENCY_ENV, DEFAULT_CONCURRENCY};
use serde_json::{json, Value};
use std::env;
use std::io;
use std::path::{Path, PathBuf};

pub const DOTENV_FILE: &str = ".env";

pub const API_BASE_URL_ENV: &str = "LLM_API_BASE_URL";
pub const API_KEY_ENV: &str = "LLM_API_KEY";
pub const MODEL_NAME_ENV: &str = "LLM_MODEL_NAME";
pub const MAX_OUTPUT_TOKENS_ENV: &str = "LLM_MAX_OUTPUT_TOKENS";
pub const DATA_DIR_ENV: &str = "AI_AUDIT_DATA_DIR";
pub const CHAR_LIMIT_ENV: &str = "AI_AUDIT_CHAR_LIMIT";

const DEFAULT_DATA_DIR: &str = "~/.ai_audit";
const DEFAULT_CHAR_LIMIT: usize = 2000;

/// Effective configuration for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
    pub model_name: Option<String>,
    pub max_output_tokens: Option<u32>,
    pub data_dir: PathBuf,
    pub concurrency: usize,
    pub char_limit: usize,
}

impl Settings {
    /// Load `.env` from the working directory, then read the environment
    pub fn load() -> Result<Self> {
        if apply_dotenv(Path::new(DOTENV_FILE))? {
            log::debug!("Loaded {DOTENV_FILE}");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let max_output_tokens = get(MAX_OUTPUT_TOKENS_ENV)
            .map(|raw| {
                raw.parse::<u32>()
                    .with_context(|| format!("{MAX_OUTPUT_TOKENS_ENV} must be a positive integer, got {raw:?}"))
            })
            .transpose()?;

        let char_limit = match get(CHAR_LIMIT_ENV) {
            None => DEFAULT_CHAR_LIMIT,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => bail!("{CHAR_LIMIT_ENV} must be a positive integer, got {raw:?}"),
            },
        };

        Ok(Self {
            api_base_url: get(API_BASE_URL_ENV),
            api_key: get(API_KEY_ENV),
            model_name: get(MODEL_NAME_ENV),
            max_output_tokens,
            data_dir: expand_home(&get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())),
            concurrency: parse_concurrency(get(CONCURRENCY_ENV).as_deref(), DEFAULT_CONCURRENCY),
            char_limit,
        })
    }

    /// Apply command-line overrides
    #[must_use]
    pub fn with_overrides(mut self, concurrency: Option<usize>, char_limit: Option<usize>) -> Self {
        if let Some(n) = concurrency {
            self.concurrency = n.clamp(1, audit_pipeline::MAX_CONCURRENCY);
        }
        if let Some(n) = char_limit.filter(|n| *n > 0) {
            self.char_limit = n;
        }
        self
    }

    /// Model configuration; fails when the endpoint or model is missing
    pub fn model_config(&self) -> Result<ModelConfig> {
        let Some(base) = &self.api_base_url else {
            bail!("{API_BASE_URL_ENV} is not set (add it to the environment or {DOTENV_FILE})");
        };
        let Some(model) = &self.model_name else {
            bail!("{MODEL_NAME_ENV} is not set (add it to the environment or {DOTENV_FILE})");
        };
        let config = ModelConfig::new(base.as_str(), model.as_str())
            .with_api_key(self.api_key.clone())
            .with_max_output_tokens(self.max_output_tokens);
        config.validate().context("Invalid model configuration")?;
        Ok(config)
    }

    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::new(&self.data_dir);
        config.char_limit = self.char_limit;
        config.concurrency = self.concurrency;
        config
    }

    /// Settings as JSON with the API key masked
    #[must_use]
    pub fn to_masked_json(&self) -> Value {
        json!({
            "api_base_url": self.api_base_url,
            "api_key": self.api_key.as_deref().map(mask_secret),
            "model_name": self.model_name,
            "max_output_tokens": self.max_output_tokens,
            "data_dir": self.data_dir,
            "concurrency": self.concurrency,
            "char_limit": self.char_limit,
        })
    }
}

/// Keep the last four characters of long secrets, hide the rest
#[must_use]
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

/// `~` and `~/...` resolved against the home directory
#[must_use]
pub fn expand_home(raw: &str) -> PathBuf {
    let home = dirs::home_dir();
    match (raw, home) {
        ("~", Some(home)) => home,
        (raw, Some(home)) if raw.starts_with("~/") => home.join(&raw[2..]),
        (raw, _) => PathBuf::from(raw),
    }
}

/// Export `.env` values the environment does not already define.
///
/// Returns `false` when there is no such file.
pub fn apply_dotenv(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(dotenvy::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", path.display())),
    }
}
