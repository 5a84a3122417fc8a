use crate::atomic::{write_json_atomic, TMP_SUFFIX};
use crate::entry::{CacheEntry, CacheKey, ChunkIndex};
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::locks::KeyedLocks;
use audit_code_chunker::parent_chunk_id;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::OwnedMutexGuard;

const ENTRIES_DIR: &str = "entries";
const CHUNKS_DIR: &str = "chunks";

/// Durable fingerprint → inference result store.
///
/// ```text
/// <root>/entries/<aa>/<bb>/<fingerprint>.json   one CacheEntry each
/// <root>/chunks/<aa>/<hash(chunk id)>.json      fingerprints per chunk
/// ```
///
/// Lookups never lock and never fail. Writers that must not duplicate an
/// inference hold [`ContentCache::writer_lock`] across lookup, inference
/// and store.
#[derive(Debug)]
pub struct ContentCache {
    root: PathBuf,
    writers: KeyedLocks,
    index_locks: KeyedLocks,
}

impl ContentCache {
    /// Open (creating if needed) the cache rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join(ENTRIES_DIR)).await?;
        tokio::fs::create_dir_all(root.join(CHUNKS_DIR)).await?;
        log::debug!("Opened content cache at {}", root.display());
        Ok(Self {
            root,
            writers: KeyedLocks::default(),
            index_locks: KeyedLocks::default(),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        let (a, b) = fingerprint.shard_dirs();
        self.root
            .join(ENTRIES_DIR)
            .join(a)
            .join(b)
            .join(format!("{fingerprint}.json"))
    }

    fn index_path(&self, chunk_id: &str) -> PathBuf {
        let digest = Sha256::digest(chunk_id.as_bytes());
        let name: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        self.root
            .join(CHUNKS_DIR)
            .join(&name[0..2])
            .join(format!("{name}.json"))
    }

    /// Cached entry for `fingerprint`; misses and unreadable entries are `None`
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let path = self.entry_path(fingerprint);
        let bytes = tokio::fs::read(&path).await.ok()?;
        match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) if entry.fingerprint == fingerprint.as_str() => Some(entry),
            Ok(_) => {
                log::warn!("Cache entry {} has a mismatched fingerprint", path.display());
                None
            }
            Err(e) => {
                log::warn!("Ignoring corrupt cache entry {}: {e}", path.display());
                None
            }
        }
    }

    /// Persist `result` under `key`, replacing any previous entry
    pub async fn store(&self, key: &CacheKey, result: Value) -> Result<CacheEntry> {
        let entry = CacheEntry::new(key, result);
        write_json_atomic(&self.entry_path(&key.fingerprint), &entry).await?;
        self.record_in_index(key.index_id(), key.fingerprint.as_str())
            .await?;
        log::debug!("Cached {} for {} ({})", key.wear_id, key.chunk_id, key.fingerprint);
        Ok(entry)
    }

    /// Exclusive per-fingerprint guard held across lookup, inference and store
    pub async fn writer_lock(&self, fingerprint: &Fingerprint) -> OwnedMutexGuard<()> {
        self.writers.lock(fingerprint.as_str()).await
    }

    /// Remove every entry recorded for `chunk_id` (and its `#n` sub-chunks).
    ///
    /// Returns how many entry files were actually deleted.
    pub async fn invalidate_all_for(&self, chunk_id: &str) -> Result<usize> {
        let chunk_id = parent_chunk_id(chunk_id);
        let _guard = self.index_locks.lock(chunk_id).await;
        let index_path = self.index_path(chunk_id);
        let Some(index) = read_index(&index_path).await else {
            return Ok(0);
        };

        let mut removed = 0;
        for raw in &index.fingerprints {
            let Ok(fp) = Fingerprint::parse(raw) else {
                continue;
            };
            match tokio::fs::remove_file(self.entry_path(&fp)).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        match tokio::fs::remove_file(&index_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        log::debug!("Invalidated {removed} cache entries for {chunk_id}");
        Ok(removed)
    }

    /// Remove temporary files left behind by interrupted writes
    pub async fn close(&self) -> Result<usize> {
        let root = self.root.clone();
        let swept = tokio::task::spawn_blocking(move || sweep_tmp_files(&root))
            .await
            .unwrap_or_else(|e| {
                log::warn!("Cache sweep task failed: {e}");
                Ok(0)
            })?;
        if swept > 0 {
            log::info!("Removed {swept} stale temporary cache files");
        }
        Ok(swept)
    }

    async fn record_in_index(&self, chunk_id: &str, fingerprint: &str) -> Result<()> {
        let _guard = self.index_locks.lock(chunk_id).await;
        let path = self.index_path(chunk_id);
        let mut index = read_index(&path).await.unwrap_or_else(|| ChunkIndex {
            chunk_id: chunk_id.to_string(),
            fingerprints: Vec::new(),
        });
        if index.fingerprints.iter().any(|f| f == fingerprint) {
            return Ok(());
        }
        index.fingerprints.push(fingerprint.to_string());
        write_json_atomic(&path, &index).await
    }
}

async fn read_index(path: &Path) -> Option<ChunkIndex> {
    let bytes = tokio::fs::read(path).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn sweep_tmp_files(root: &Path) -> Result<usize> {
    let mut swept = 0;
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(TMP_SUFFIX))
            {
                std::fs::remove_file(&path)?;
                swept += 1;
            }
        }
    }
    Ok(swept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    fn key(source: &str, chunk_id: &str, wear: &str) -> CacheKey {
        CacheKey::new(source, chunk_id, wear, "test-model", None)
    }

    #[tokio::test]
    async fn store_then_lookup() {
        let dir = tempdir().unwrap();
        let cache = ContentCache::open(dir.path()).await.unwrap();
        let k = key("def f(): pass", "a.py:f", "security");

        assert!(cache.lookup(&k.fingerprint).await.is_none());
        cache.store(&k, json!({"issues": []})).await.unwrap();

        let hit = cache.lookup(&k.fingerprint).await.unwrap();
        assert_eq!(hit.chunk_id, "a.py:f");
        assert_eq!(hit.wear_id, "security");
        assert_eq!(hit.result, json!({"issues": []}));
    }

    #[tokio::test]
    async fn later_store_wins() {
        let dir = tempdir().unwrap();
        let cache = ContentCache::open(dir.path()).await.unwrap();
        let k = key("x", "a.py:x", "security");
        cache.store(&k, json!({"v": 1})).await.unwrap();
        cache.store(&k, json!({"v": 2})).await.unwrap();
        assert_eq!(cache.lookup(&k.fingerprint).await.unwrap().result, json!({"v": 2}));
    }

    #[tokio::test]
    async fn corrupt_entry_is_a_miss() {
        let dir = tempdir().unwrap();
        let cache = ContentCache::open(dir.path()).await.unwrap();
        let k = key("x", "a.py:x", "security");
        let path = cache.entry_path(&k.fingerprint);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(cache.lookup(&k.fingerprint).await.is_none());
    }

    #[tokio::test]
    async fn invalidate_removes_all_wears_and_sub_chunks() {
        let dir = tempdir().unwrap();
        let cache = ContentCache::open(dir.path()).await.unwrap();
        let sec = key("part one", "a.py:big#1", "security");
        let read = key("part two", "a.py:big#2", "readability");
        let other = key("y", "a.py:other", "security");
        for k in [&sec, &read, &other] {
            cache.store(k, json!({})).await.unwrap();
        }

        assert_eq!(cache.invalidate_all_for("a.py:big").await.unwrap(), 2);
        assert!(cache.lookup(&sec.fingerprint).await.is_none());
        assert!(cache.lookup(&read.fingerprint).await.is_none());
        assert!(cache.lookup(&other.fingerprint).await.is_some());
        assert_eq!(cache.invalidate_all_for("a.py:big").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn close_sweeps_temporary_files() {
        let dir = tempdir().unwrap();
        let cache = ContentCache::open(dir.path()).await.unwrap();
        let stray = dir.path().join(ENTRIES_DIR).join("ab").join("cd");
        std::fs::create_dir_all(&stray).unwrap();
        std::fs::write(stray.join("dead.json.tmp"), b"partial").unwrap();

        assert_eq!(cache.close().await.unwrap(), 1);
        assert!(!stray.join("dead.json.tmp").exists());
    }
}
