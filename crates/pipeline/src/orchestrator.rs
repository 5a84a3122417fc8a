use crate::error::{PipelineError, Result};
use crate::limits::ConcurrencyLimit;
use crate::wear::{parse_issues, Issue, Wear, WHY_EXTRACTOR};
use audit_code_chunker::{truncate_to_limit, Chunk};
use audit_content_cache::{CacheKey, ContentCache};
use audit_inference::InferenceClient;
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Whether cached results may answer a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Serve hits from the cache, infer and store on a miss
    Use,
    /// Always infer, then store the fresh result
    Refresh,
}

impl CachePolicy {
    #[must_use]
    pub fn from_force(force: bool) -> Self {
        if force {
            Self::Refresh
        } else {
            Self::Use
        }
    }
}

/// Running tally of model calls and cache hits
#[derive(Debug, Default)]
pub struct CallCounter {
    calls: AtomicUsize,
    cache_hits: AtomicUsize,
    processing_errors: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallStats {
    pub calls: usize,
    pub cache_hits: usize,
    pub processing_errors: usize,
}

impl CallCounter {
    #[must_use]
    pub fn snapshot(&self) -> CallStats {
        CallStats {
            calls: self.calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            processing_errors: self.processing_errors.load(Ordering::Relaxed),
        }
    }

    fn call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    fn hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn processing_error(&self) {
        self.processing_errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// Issues found in one chunk by every wear of an audit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditResult {
    pub chunk_id: String,
    pub start_line: usize,
    pub issues: Vec<Issue>,
}

impl AuditResult {
    #[must_use]
    pub fn high_severity(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == crate::wear::Severity::High)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RationaleOutcome {
    Extracted { text: String, cached: bool },
    Failed { reason: String },
}

/// Runs wears over chunks through the cache, the model and a shared limit
#[derive(Debug, Clone)]
pub struct WearOrchestrator {
    cache: Arc<ContentCache>,
    client: Arc<InferenceClient>,
    limit: ConcurrencyLimit,
    counter: Arc<CallCounter>,
    char_limit: usize,
}

impl WearOrchestrator {
    pub fn new(
        cache: Arc<ContentCache>,
        client: Arc<InferenceClient>,
        limit: ConcurrencyLimit,
        char_limit: usize,
    ) -> Self {
        Self {
            cache,
            client,
            limit,
            counter: Arc::default(),
            char_limit,
        }
    }

    #[must_use]
    pub fn counter(&self) -> &CallCounter {
        &self.counter
    }

    #[must_use]
    pub fn limit(&self) -> &ConcurrencyLimit {
        &self.limit
    }

    #[must_use]
    pub fn client(&self) -> &InferenceClient {
        &self.client
    }

    pub async fn audit_chunk(
        &self,
        chunk: &Chunk,
        wears: &[&'static Wear],
        policy: CachePolicy,
    ) -> Result<AuditResult> {
        let mut results = self
            .audit_chunks(std::slice::from_ref(chunk), wears, policy)
            .await?;
        Ok(results.remove(0))
    }

    /// Audit every (chunk, wear) pair concurrently; results follow chunk order
    pub async fn audit_chunks(
        &self,
        chunks: &[Chunk],
        wears: &[&'static Wear],
        policy: CachePolicy,
    ) -> Result<Vec<AuditResult>> {
        let mut tasks = JoinSet::new();
        for (ci, chunk) in chunks.iter().enumerate() {
            for (wi, wear) in wears.iter().copied().enumerate() {
                let this = self.clone();
                let chunk = chunk.clone();
                tasks.spawn(async move {
                    let issues = this.run_issue_wear(&chunk, wear, policy).await;
                    (ci, wi, issues)
                });
            }
        }

        let mut done = Vec::with_capacity(chunks.len() * wears.len());
        while let Some(joined) = tasks.join_next().await {
            let (ci, wi, issues) = joined?;
            // A fatal error drops the set, aborting the remaining pairs
            done.push((ci, wi, issues?));
        }
        done.sort_by_key(|(ci, wi, _)| (*ci, *wi));

        let mut results: Vec<AuditResult> = chunks
            .iter()
            .map(|c| AuditResult {
                chunk_id: c.chunk_id.clone(),
                start_line: c.start_line,
                issues: Vec::new(),
            })
            .collect();
        for (ci, _, issues) in done {
            let start_line = results[ci].start_line;
            results[ci]
                .issues
                .extend(issues.into_iter().map(|i| i.resolved(start_line)));
        }
        Ok(results)
    }

    async fn run_issue_wear(
        &self,
        chunk: &Chunk,
        wear: &'static Wear,
        policy: CachePolicy,
    ) -> Result<Vec<Issue>> {
        let key = CacheKey::for_chunk(
            chunk,
            wear.id,
            self.client.model_name(),
            self.client.max_output_tokens(),
        );
        let _writer = self.cache.writer_lock(&key.fingerprint).await;

        if policy == CachePolicy::Use {
            if let Some(entry) = self.cache.lookup(&key.fingerprint).await {
                match parse_issues(&entry.result, wear.issue_type) {
                    Ok(issues) => {
                        self.counter.hit();
                        log::debug!("cache hit {} [{}]: {} issues", chunk.chunk_id, wear.id, issues.len());
                        return Ok(issues);
                    }
                    Err(e) => log::warn!("Discarding unusable cache entry for {}: {e}", chunk.chunk_id),
                }
            }
        }

        let prompt = self.user_content(chunk);
        let reply = {
            let _permit = self.limit.acquire().await;
            self.counter.call();
            self.client.infer_json(wear.system_prompt, &prompt).await
        };

        let outcome = match reply {
            Ok(value) => match parse_issues(&value, wear.issue_type) {
                Ok(issues) => {
                    if let Err(e) = self.cache.store(&key, value).await {
                        log::warn!("Failed to cache {} [{}]: {e}", chunk.chunk_id, wear.id);
                    }
                    log::debug!("{} [{}]: {} issues", chunk.chunk_id, wear.id, issues.len());
                    return Ok(issues);
                }
                Err(shape) => shape,
            },
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => e.to_string(),
        };

        log::warn!("{} [{}] recorded as processing error: {outcome}", chunk.chunk_id, wear.id);
        self.counter.processing_error();
        Ok(vec![Issue::processing_error(wear.id, outcome)])
    }

    /// What the model sees for a chunk: its source text and nothing else.
    ///
    /// Everything here must be covered by the chunk's fingerprint, so ids,
    /// paths and line numbers stay out.
    fn user_content(&self, chunk: &Chunk) -> String {
        truncate_to_limit(&chunk.source_text, self.char_limit)
    }

    /// Run the why-extractor over one chunk
    pub async fn extract_rationale(
        &self,
        chunk: &Chunk,
        policy: CachePolicy,
    ) -> Result<RationaleOutcome> {
        let wear = Wear::builtin(WHY_EXTRACTOR)
            .ok_or_else(|| PipelineError::UnknownWear(WHY_EXTRACTOR.to_string()))?;
        let key = CacheKey::for_chunk(
            chunk,
            wear.id,
            self.client.model_name(),
            self.client.max_output_tokens(),
        );
        let _writer = self.cache.writer_lock(&key.fingerprint).await;

        if policy == CachePolicy::Use {
            let cached = self.cache.lookup(&key.fingerprint).await.and_then(|entry| {
                entry.result.get("rationale").and_then(|v| v.as_str()).map(str::to_string)
            });
            if let Some(text) = cached {
                self.counter.hit();
                return Ok(RationaleOutcome::Extracted { text, cached: true });
            }
        }

        let prompt = self.user_content(chunk);
        let reply = {
            let _permit = self.limit.acquire().await;
            self.counter.call();
            self.client.infer_text(wear.system_prompt, &prompt).await
        };

        match reply {
            Ok(text) => {
                let text = text.trim().to_string();
                if let Err(e) = self.cache.store(&key, json!({ "rationale": text })).await {
                    log::warn!("Failed to cache rationale for {}: {e}", chunk.chunk_id);
                }
                Ok(RationaleOutcome::Extracted { text, cached: false })
            }
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                log::warn!("Rationale extraction failed for {}: {e}", chunk.chunk_id);
                self.counter.processing_error();
                Ok(RationaleOutcome::Failed {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Rationale for each chunk, concurrently, in chunk order
    pub async fn extract_rationales(
        &self,
        chunks: &[Chunk],
        policy: CachePolicy,
    ) -> Result<Vec<RationaleOutcome>> {
        let mut tasks = JoinSet::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let this = self.clone();
            let chunk = chunk.clone();
            tasks.spawn(async move { (i, this.extract_rationale(&chunk, policy).await) });
        }

        let mut done = Vec::with_capacity(chunks.len());
        while let Some(joined) = tasks.join_next().await {
            let (i, outcome) = joined?;
            done.push((i, outcome?));
        }
        done.sort_by_key(|(i, _)| *i);
        Ok(done.into_iter().map(|(_, o)| o).collect())
    }

    /// Send a prepared document prompt with the given wear, bounded by the shared limit
    pub async fn generate_document(&self, wear: &Wear, user_content: &str) -> Result<String> {
        let content = truncate_to_limit(user_content, self.char_limit);
        let _permit = self.limit.acquire().await;
        self.counter.call();
        Ok(self.client.infer_text(wear.system_prompt, &content).await?)
    }
}
