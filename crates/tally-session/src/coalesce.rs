//! Per-key request coalescing.
//!
//! The allocation UI fires bursts of identical loads (typing in the
//! customer picker, focus changes re-triggering fetches). Instead of
//! hammering the collaborator, concurrent loads for the same key share
//! one in-flight fetch and all observe its single outcome.
//!
//! ```text
//! caller A ──► run(key) ──┐
//!                         ├──► one fetch ──► Result stored in OnceCell
//! caller B ──► run(key) ──┘                    │
//!                                              ├──► A gets a clone
//!                                              └──► B gets a clone
//! ```
//!
//! Entries are removed once the fetch settles; a later call with the
//! same key starts a fresh fetch. Failures are shared, not retried.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::error::LoadError;

type Slot<V> = Arc<OnceCell<Result<V, LoadError>>>;

/// In-flight registry mapping a key to the shared outcome slot of the
/// fetch currently running for it.
#[derive(Debug)]
pub struct Coalescer<K, V> {
    in_flight: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for Coalescer<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Coalescer<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Coalescer {
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `fetch` for `key`, unless a fetch for the same key is
    /// already in flight, in which case this call waits on it instead.
    /// Every caller receives a clone of the one stored outcome.
    pub async fn run<F, Fut>(&self, key: K, fetch: F) -> Result<V, LoadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, LoadError>>,
    {
        let slot = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(&key) {
                Some(slot) => {
                    debug!(?key, "coalesced onto in-flight fetch");
                    Arc::clone(slot)
                }
                None => {
                    let slot: Slot<V> = Arc::new(OnceCell::new());
                    in_flight.insert(key.clone(), Arc::clone(&slot));
                    slot
                }
            }
        };

        // Whoever gets here first runs the fetch; everyone else waits
        // for the cell to initialize and clones the stored result.
        let result = slot.get_or_init(|| fetch()).await.clone();

        // Remove the entry so later calls fetch fresh data. The
        // ptr_eq guard keeps a newer in-flight entry (registered after
        // this fetch settled but before we reacquired the lock) alive.
        let mut in_flight = self.in_flight.lock().await;
        if let Some(current) = in_flight.get(&key) {
            if Arc::ptr_eq(current, &slot) {
                in_flight.remove(&key);
            }
        }

        result
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_default_constructed_registry_works() {
        let coalescer: Coalescer<i64, u32> = Coalescer::default();
        let result = coalescer.run(1, || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_fetch() {
        let coalescer: Coalescer<i64, Vec<u32>> = Coalescer::new();
        let calls = AtomicUsize::new(0);

        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            // Force a yield so the second caller can join in
            tokio::task::yield_now().await;
            Ok(vec![1, 2, 3])
        };

        let (a, b) = tokio::join!(coalescer.run(7, fetch), coalescer.run(7, fetch));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), vec![1, 2, 3]);
        assert_eq!(b.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_independently() {
        let coalescer: Coalescer<i64, u32> = Coalescer::new();
        let calls = AtomicUsize::new(0);

        let fetch = |v: u32| {
            let calls = &calls;
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(v)
            }
        };

        let (a, b) = tokio::join!(coalescer.run(1, fetch(10)), coalescer.run(2, fetch(20)));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(a.unwrap(), 10);
        assert_eq!(b.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_failure_is_shared_by_all_callers() {
        let coalescer: Coalescer<i64, u32> = Coalescer::new();

        let fetch = || async {
            tokio::task::yield_now().await;
            Err(LoadError::Fetch("backend down".into()))
        };

        let (a, b) = tokio::join!(coalescer.run(5, fetch), coalescer.run(5, fetch));

        assert_eq!(a.unwrap_err(), LoadError::Fetch("backend down".into()));
        assert_eq!(b.unwrap_err(), LoadError::Fetch("backend down".into()));
    }

    #[tokio::test]
    async fn test_entry_removed_after_completion() {
        let coalescer: Coalescer<i64, u32> = Coalescer::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let result = coalescer
                .run(3, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(99)
                })
                .await;
            assert_eq!(result.unwrap(), 99);
        }

        // Sequential calls each get a fresh fetch
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let coalescer: Coalescer<i64, u32> = Coalescer::new();
        let calls = AtomicUsize::new(0);

        let first = coalescer
            .run(9, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LoadError::Fetch("flaky".into()))
            })
            .await;
        assert!(first.is_err());

        let second = coalescer
            .run(9, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
            .await;
        assert_eq!(second.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
