use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const MAX_CONCURRENCY: usize = 32;
pub const CONCURRENCY_ENV: &str = "AI_AUDIT_CONCURRENCY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencySnapshot {
    pub limit: usize,
    pub in_flight: usize,
    pub waiters: usize,
}

#[must_use]
pub fn parse_concurrency(raw: Option<&str>, default_value: usize) -> usize {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
        .clamp(1, MAX_CONCURRENCY)
}

/// Bound on simultaneous inference calls, shared by every task of a run
#[derive(Debug, Clone)]
pub struct ConcurrencyLimit {
    semaphore: Arc<Semaphore>,
    limit: usize,
    in_flight: Arc<AtomicUsize>,
    waiters: Arc<AtomicUsize>,
}

impl ConcurrencyLimit {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.clamp(1, MAX_CONCURRENCY);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            in_flight: Arc::default(),
            waiters: Arc::default(),
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        let raw = std::env::var(CONCURRENCY_ENV).ok();
        Self::new(parse_concurrency(raw.as_deref(), DEFAULT_CONCURRENCY))
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub fn snapshot(&self) -> ConcurrencySnapshot {
        ConcurrencySnapshot {
            limit: self.limit,
            in_flight: self.in_flight.load(Ordering::Relaxed),
            waiters: self.waiters.load(Ordering::Relaxed),
        }
    }

    pub async fn acquire(&self) -> InferencePermit {
        // The semaphore is never closed; acquire failures are not expected.
        self.waiters.fetch_add(1, Ordering::Relaxed);
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .unwrap_or_else(|_| unreachable!("inference semaphore closed"));
        self.waiters.fetch_sub(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InferencePermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl Default for ConcurrencyLimit {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

pub struct InferencePermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InferencePermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_concurrency_defaults_and_clamps() {
        assert_eq!(parse_concurrency(None, 4), 4);
        assert_eq!(parse_concurrency(Some("   "), 4), 4);
        assert_eq!(parse_concurrency(Some("2"), 4), 2);
        assert_eq!(parse_concurrency(Some("0"), 4), 1);
        assert_eq!(parse_concurrency(Some("999"), 4), MAX_CONCURRENCY);
        assert_eq!(parse_concurrency(Some("abc"), 4), 4);
        assert_eq!(parse_concurrency(Some(" 5 "), 4), 5);
    }

    #[tokio::test]
    async fn permits_are_counted() {
        let limit = ConcurrencyLimit::new(2);
        let a = limit.acquire().await;
        let _b = limit.acquire().await;
        assert_eq!(limit.snapshot().in_flight, 2);
        drop(a);
        assert_eq!(
            limit.snapshot(),
            ConcurrencySnapshot {
                limit: 2,
                in_flight: 1,
                waiters: 0
            }
        );
    }
}
