//! Bounded LRU cache of asynchronously loaded values.
//!
//! [`AsyncCache`] stores each key either as a finished value or as a load in
//! progress. Concurrent requests for the same key share one load:
//!
//! ```text
//! caller A ─┐                          ┌─► loader task
//!           ├─► AsyncCache (Pending) ──┤       │
//! caller B ─┘        ▲                 │       ▼
//!                    └── watch ◄───────┴── Ready / removed
//! ```
//!
//! Every caller holds a subscription on the shared load. Cancelling,
//! timing out or dropping the caller's future releases that subscription;
//! the load itself is only cancelled once the last subscription is gone.
//!
//! # Capacity
//!
//! Capacity counts entries, pending and ready alike, and eviction is strict
//! least-recently-used. A pending entry that is evicted keeps running for the
//! callers already waiting on it, but its result is not stored.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::DemError;

type LoadResult<V> = Option<Result<V, DemError>>;

/// Shared state of one in-progress load.
#[derive(Debug)]
struct Load {
    subscribers: AtomicUsize,
    cancel: CancellationToken,
}

enum Slot<V> {
    Pending {
        rx: watch::Receiver<LoadResult<V>>,
        load: Arc<Load>,
    },
    Ready(V),
}

struct Inner<K, V> {
    entries: Mutex<LruCache<K, Slot<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    evictions: AtomicU64,
}

/// Counters for monitoring cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered from a stored value.
    pub hits: u64,
    /// Requests that started a new load.
    pub misses: u64,
    /// Requests that joined a load already in progress.
    pub coalesced: u64,
    /// Entries dropped to stay within capacity.
    pub evictions: u64,
    /// Entries currently held, pending and ready.
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of requests that did not start a load.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses + self.coalesced;
        if total == 0 {
            0.0
        } else {
            (self.hits + self.coalesced) as f64 / total as f64
        }
    }
}

enum Lookup<V> {
    Hit(V),
    Join(watch::Receiver<LoadResult<V>>, Arc<Load>),
    Start(
        watch::Sender<LoadResult<V>>,
        watch::Receiver<LoadResult<V>>,
        Arc<Load>,
    ),
}

/// Deduplicating LRU cache over asynchronous loads.
pub struct AsyncCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for AsyncCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> AsyncCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(LruCache::new(
                    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
                )),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                coalesced: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.entries.lock().cap().get()
    }

    /// Returns the value for `key`, loading it if necessary.
    ///
    /// `loader` is only invoked when no entry exists. It receives the load's
    /// own cancellation token, which fires once every caller waiting on the
    /// load has gone away. The caller's `cancel` and `timeout` only detach
    /// this caller.
    pub async fn get_or_load<F, Fut>(
        &self,
        key: K,
        cancel: &CancellationToken,
        timeout: Duration,
        loader: F,
    ) -> Result<V, DemError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<V, DemError>> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(DemError::Cancelled);
        }

        let (rx, load) = match self.inner.lookup(&key) {
            Lookup::Hit(value) => return Ok(value),
            Lookup::Join(rx, load) => (rx, load),
            Lookup::Start(tx, rx, load) => {
                self.spawn_load(key.clone(), tx, Arc::clone(&load), loader);
                (rx, load)
            }
        };

        let _subscription = Subscription {
            inner: &self.inner,
            key: &key,
            load,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                trace!(key = ?key, "Caller cancelled");
                Err(DemError::Cancelled)
            }
            result = wait_for_result(rx) => result,
            _ = tokio::time::sleep(timeout) => {
                debug!(key = ?key, timeout_ms = timeout.as_millis() as u64, "Caller timed out");
                Err(DemError::Timeout(timeout))
            }
        }
    }

    fn spawn_load<F, Fut>(
        &self,
        key: K,
        tx: watch::Sender<LoadResult<V>>,
        load: Arc<Load>,
        loader: F,
    ) where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<V, DemError>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let token = load.cancel.clone();
        let work = loader(token.clone());

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(DemError::Cancelled),
                result = work => result,
            };
            inner.complete(&key, &load, &result);
            let _ = tx.send(Some(result));
        });
    }

    /// Returns true if `key` is stored or loading.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.entries.lock().contains(key)
    }

    /// Removes `key`. A load in progress keeps serving its current callers.
    pub fn invalidate(&self, key: &K) -> bool {
        self.inner.entries.lock().pop(key).is_some()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.inner.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            coalesced: self.inner.coalesced.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn lookup(&self, key: &K) -> Lookup<V> {
        let mut entries = self.entries.lock();

        if let Some(slot) = entries.get(key) {
            return match slot {
                Slot::Ready(value) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    trace!(key = ?key, "Cache hit");
                    Lookup::Hit(value.clone())
                }
                Slot::Pending { rx, load } => {
                    let waiters = load.subscribers.fetch_add(1, Ordering::AcqRel) + 1;
                    self.coalesced.fetch_add(1, Ordering::Relaxed);
                    debug!(key = ?key, waiters, "Joining in-flight load");
                    Lookup::Join(rx.clone(), Arc::clone(load))
                }
            };
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        let load = Arc::new(Load {
            subscribers: AtomicUsize::new(1),
            cancel: CancellationToken::new(),
        });
        let slot = Slot::Pending {
            rx: rx.clone(),
            load: Arc::clone(&load),
        };
        if let Some((evicted, _)) = entries.push(key.clone(), slot) {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            trace!(key = ?evicted, "Evicted least recently used entry");
        }
        debug!(key = ?key, entries = entries.len(), "Starting load");
        Lookup::Start(tx, rx, load)
    }

    /// Stores or discards a finished load, if its entry is still current.
    fn complete(&self, key: &K, load: &Arc<Load>, result: &Result<V, DemError>) {
        let mut entries = self.entries.lock();
        if !is_current(&entries, key, load) {
            return;
        }

        match result {
            Ok(value) => {
                // Replacing an existing key promotes it and never evicts.
                entries.put(key.clone(), Slot::Ready(value.clone()));
            }
            Err(e) => {
                entries.pop(key);
                if !e.is_cancelled() {
                    debug!(key = ?key, error = %e, "Load failed; entry removed");
                }
            }
        }
    }

    fn release(&self, key: &K, load: &Arc<Load>) {
        let mut entries = self.entries.lock();
        if load.subscribers.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        load.cancel.cancel();
        if is_current(&entries, key, load) {
            entries.pop(key);
            debug!(key = ?key, "Last waiter left; load cancelled");
        }
    }
}

/// True while `key` still maps to the pending slot of `load`.
fn is_current<K: Eq + Hash, V>(entries: &LruCache<K, Slot<V>>, key: &K, load: &Arc<Load>) -> bool {
    matches!(entries.peek(key), Some(Slot::Pending { load: l, .. }) if Arc::ptr_eq(l, load))
}

async fn wait_for_result<V: Clone>(
    mut rx: watch::Receiver<LoadResult<V>>,
) -> Result<V, DemError> {
    match rx.wait_for(Option::is_some).await {
        Ok(value) => match &*value {
            Some(result) => result.clone(),
            None => Err(DemError::Cancelled),
        },
        Err(_) => Err(DemError::Worker("load ended without a result".to_string())),
    }
}

/// A caller's claim on a shared load, released on drop.
struct Subscription<'a, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    inner: &'a Inner<K, V>,
    key: &'a K,
    load: Arc<Load>,
}

impl<K, V> Drop for Subscription<'_, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn drop(&mut self) {
        self.inner.release(self.key, &self.load);
    }
}
