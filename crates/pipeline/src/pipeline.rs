use crate::error::{PipelineError, Result};
use crate::limits::ConcurrencyLimit;
use crate::orchestrator::{CallStats, WearOrchestrator};
use audit_code_chunker::{
    read_source, relative_path, Chunker, ChunkerConfig, ChunkerError, ChunkOutcome, Language,
    DEFAULT_MAX_CHUNK_CHARS,
};
use audit_content_cache::ContentCache;
use audit_inference::InferenceClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CACHE_DIR: &str = "cache";

/// Run-wide settings for [`Pipeline`]
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the cache and rationale stores
    pub data_dir: PathBuf,
    /// Character ceiling for chunks and prompts
    pub char_limit: usize,
    pub concurrency: usize,
}

impl PipelineConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            char_limit: DEFAULT_MAX_CHUNK_CHARS,
            concurrency: crate::limits::DEFAULT_CONCURRENCY,
        }
    }
}

/// Chunker, cache, model client and scheduler for one run.
///
/// The use cases live in their own modules as `impl Pipeline` blocks:
/// audits in `audit`, rationale in `rationale`, architecture review in
/// `architecture` and design documents in `design_doc`.
#[derive(Debug)]
pub struct Pipeline {
    pub(crate) chunker: Chunker,
    pub(crate) cache: Arc<ContentCache>,
    pub(crate) orchestrator: WearOrchestrator,
    pub(crate) data_dir: PathBuf,
    pub(crate) char_limit: usize,
}

impl Pipeline {
    /// Open the cache under `config.data_dir` and wire everything together
    pub async fn open(config: PipelineConfig, client: InferenceClient) -> Result<Self> {
        let cache = ContentCache::open(config.data_dir.join(CACHE_DIR)).await?;
        Self::with_cache(config, client, Arc::new(cache))
    }

    pub fn with_cache(
        config: PipelineConfig,
        client: InferenceClient,
        cache: Arc<ContentCache>,
    ) -> Result<Self> {
        let chunker = Chunker::new(ChunkerConfig::with_max_chars(config.char_limit))?;
        let limit = ConcurrencyLimit::new(config.concurrency);
        let orchestrator = WearOrchestrator::new(
            Arc::clone(&cache),
            Arc::new(client),
            limit,
            config.char_limit,
        );
        Ok(Self {
            chunker,
            cache,
            orchestrator,
            data_dir: config.data_dir,
            char_limit: config.char_limit,
        })
    }

    #[must_use]
    pub fn orchestrator(&self) -> &WearOrchestrator {
        &self.orchestrator
    }

    #[must_use]
    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn char_limit(&self) -> usize {
        self.char_limit
    }

    #[must_use]
    pub fn stats(&self) -> CallStats {
        self.orchestrator.counter().snapshot()
    }

    /// Flush the cache; call once at the end of a run
    pub async fn close(&self) -> Result<()> {
        self.cache.close().await?;
        Ok(())
    }

    /// Size-guarded chunks of `path`, ids relative to `root`.
    ///
    /// Empty files yield no chunks rather than an error.
    pub(crate) async fn chunk_file(&self, path: &Path, root: &Path) -> Result<ChunkOutcome> {
        let language = Language::from_path(path);
        let rel_path = relative_path(path, root);
        let chunker = self.chunker.clone();
        let owned = path.to_path_buf();
        let outcome = tokio::task::spawn_blocking(move || {
            let content = read_source(&owned)?;
            chunker.chunk_guarded(&rel_path, &content, language)
        })
        .await?;

        match outcome {
            Ok(outcome) => Ok(outcome),
            Err(ChunkerError::EmptyContent) => Ok(ChunkOutcome::default()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Canonical form of an existing directory
pub(crate) fn existing_dir(dir: &Path) -> Result<PathBuf> {
    let canonical = dir
        .canonicalize()
        .map_err(|e| PipelineError::invalid_path(dir, &e.to_string()))?;
    if !canonical.is_dir() {
        return Err(PipelineError::invalid_path(dir, "not a directory"));
    }
    Ok(canonical)
}
