//! Content-addressed cache of inference results.
//!
//! Entries are keyed by a [`Fingerprint`] of the chunk text, the wear that
//! reviewed it and the model configuration, so unchanged code is never sent
//! for inference twice.
//!
//! ```no_run
//! use audit_content_cache::{CacheKey, ContentCache};
//! use serde_json::json;
//!
//! # async fn example() -> audit_content_cache::Result<()> {
//! let cache = ContentCache::open("/tmp/ai_audit/cache").await?;
//! let key = CacheKey::new("def f(): pass", "a.py:f", "security", "model", None);
//!
//! let _guard = cache.writer_lock(&key.fingerprint).await;
//! if cache.lookup(&key.fingerprint).await.is_none() {
//!     cache.store(&key, json!({"issues": []})).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod atomic;
mod entry;
mod error;
mod fingerprint;
mod locks;
mod store;

pub use atomic::{tmp_path, write_atomic, write_json_atomic, TMP_SUFFIX};
pub use entry::{unix_now, CacheEntry, CacheKey};
pub use error::{CacheError, Result};
pub use fingerprint::Fingerprint;
pub use store::ContentCache;
