use crate::error::Result;
use crate::orchestrator::{CachePolicy, RationaleOutcome};
use crate::pipeline::{existing_dir, Pipeline};
use crate::run_lock::RunLock;
use crate::scanner::FileScanner;
use audit_code_chunker::relative_path;
use audit_content_cache::write_json_atomic;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const RATIONALE_DIR: &str = "rationale";

/// Design intent recorded for one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RationaleEntry {
    pub chunk_id: String,
    pub file_path: String,
    pub qualified_name: String,
    pub kind: String,
    pub rationale: String,
    /// RFC 3339, UTC
    pub extracted_at: String,
}

/// Per-project rationale file: chunk id -> entry
#[derive(Debug, Default)]
pub struct RationaleStore {
    path: PathBuf,
    entries: BTreeMap<String, RationaleEntry>,
}

impl RationaleStore {
    /// `<data_dir>/rationale/<hash of dir>.json`
    #[must_use]
    pub fn path_for(data_dir: &Path, dir: &Path) -> PathBuf {
        let digest = Sha256::digest(dir.to_string_lossy().as_bytes());
        let name: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
        data_dir.join(RATIONALE_DIR).join(format!("{name}.json"))
    }

    /// Load the store; a missing or unreadable file starts empty
    pub async fn load(path: PathBuf) -> Self {
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                log::warn!("Ignoring corrupt rationale store {}: {e}", path.display());
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, entries }
    }

    pub async fn save(&self) -> Result<()> {
        write_json_atomic(&self.path, &self.entries).await?;
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn contains(&self, chunk_id: &str) -> bool {
        self.entries.contains_key(chunk_id)
    }

    pub fn insert(&mut self, entry: RationaleEntry) {
        self.entries.insert(entry.chunk_id.clone(), entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose chunk id or text contains `filter` (case-insensitive)
    #[must_use]
    pub fn matching(&self, filter: Option<&str>) -> Vec<RationaleEntry> {
        let needle = filter
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty());
        self.entries
            .values()
            .filter(|entry| match &needle {
                None => true,
                Some(n) => {
                    entry.chunk_id.to_lowercase().contains(n)
                        || entry.rationale.to_lowercase().contains(n)
                }
            })
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RationaleReport {
    pub directory: PathBuf,
    pub store_path: PathBuf,
    pub extracted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_entries: usize,
}

impl Pipeline {
    /// Extract design rationale for every chunk under `dir`.
    ///
    /// Chunks already in the store are skipped unless `force` is set. The
    /// store is saved after each file, so an interrupted run keeps its
    /// progress.
    pub async fn extract_rationale(&self, dir: &Path, force: bool) -> Result<RationaleReport> {
        let root = existing_dir(dir)?;
        let store_path = RationaleStore::path_for(&self.data_dir, &root);
        let _lock = RunLock::acquire(&store_path.with_extension("lock")).await?;
        let mut store = RationaleStore::load(store_path).await;

        let mut report = RationaleReport {
            directory: root.clone(),
            store_path: store.path().to_path_buf(),
            ..RationaleReport::default()
        };
        let policy = CachePolicy::from_force(force);

        for file in FileScanner::new(&root).scan() {
            let rel = relative_path(&file, &root);
            let outcome = match self.chunk_file(&file, &root).await {
                Ok(chunked) => chunked,
                Err(e) => {
                    log::warn!("Skipping {rel}: {e}");
                    report.failed += 1;
                    continue;
                }
            };

            let (pending, existing): (Vec<_>, Vec<_>) = outcome
                .chunks
                .into_iter()
                .partition(|c| force || !store.contains(&c.chunk_id));
            report.skipped += existing.len();
            if pending.is_empty() {
                continue;
            }

            let outcomes = self
                .orchestrator
                .extract_rationales(&pending, policy)
                .await?;
            for (chunk, outcome) in pending.into_iter().zip(outcomes) {
                match outcome {
                    RationaleOutcome::Extracted { text, .. } => {
                        let preview: String = text.chars().take(60).collect();
                        log::debug!("{}: {preview}", chunk.chunk_id);
                        store.insert(RationaleEntry {
                            file_path: rel.clone(),
                            qualified_name: chunk.qualified_name,
                            kind: chunk.kind.as_str().to_string(),
                            rationale: text,
                            extracted_at: chrono::Utc::now().to_rfc3339(),
                            chunk_id: chunk.chunk_id,
                        });
                        report.extracted += 1;
                    }
                    RationaleOutcome::Failed { .. } => report.failed += 1,
                }
            }
            store.save().await?;
        }

        report.total_entries = store.len();
        log::info!(
            "Rationale: {} extracted, {} skipped, {} failed ({} stored in {})",
            report.extracted,
            report.skipped,
            report.failed,
            report.total_entries,
            report.store_path.display()
        );
        Ok(report)
    }

    /// Stored rationale for `dir`, optionally filtered, sorted by chunk id
    pub async fn list_rationale(&self, dir: &Path, filter: Option<&str>) -> Result<Vec<RationaleEntry>> {
        let root = existing_dir(dir)?;
        let store = RationaleStore::load(RationaleStore::path_for(&self.data_dir, &root)).await;
        Ok(store.matching(filter))
    }
}
