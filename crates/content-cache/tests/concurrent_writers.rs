use audit_content_cache::{CacheKey, ContentCache};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn writer_lock_gives_one_inference_per_fingerprint() {
    let dir = tempdir().unwrap();
    let cache = Arc::new(ContentCache::open(dir.path()).await.unwrap());
    let key = CacheKey::new("def shared(): pass", "a.py:shared", "security", "m", None);
    let inferences = Arc::new(AtomicUsize::new(0));

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        let key = key.clone();
        let inferences = Arc::clone(&inferences);
        tasks.spawn(async move {
            let _guard = cache.writer_lock(&key.fingerprint).await;
            if cache.lookup(&key.fingerprint).await.is_none() {
                inferences.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                cache.store(&key, json!({"issues": []})).await.unwrap();
            }
        });
    }
    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }

    assert_eq!(inferences.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn entries_survive_reopen() {
    let dir = tempdir().unwrap();
    let key = CacheKey::new("fn main() {}", "main.rs:main", "readability", "m", Some(256));
    {
        let cache = ContentCache::open(dir.path()).await.unwrap();
        cache.store(&key, json!({"issues": [{"severity": "low"}]})).await.unwrap();
        cache.close().await.unwrap();
    }

    let reopened = ContentCache::open(dir.path()).await.unwrap();
    let entry = reopened.lookup(&key.fingerprint).await.unwrap();
    assert_eq!(entry.result["issues"][0]["severity"], "low");
    assert_eq!(reopened.invalidate_all_for("main.rs:main").await.unwrap(), 1);
}
