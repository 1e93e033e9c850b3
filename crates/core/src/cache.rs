//! In-memory query cache with single-flight fetches and event-driven staleness.
//!
//! Entries never expire by time. They become stale only through
//! [`invalidate`](QueryCache::invalidate) / [`invalidate_all`](QueryCache::invalidate_all)
//! and disappear only through [`clear`](QueryCache::clear).
//!
//! - **Single-flight**: at most one fetch per key is outstanding; concurrent
//!   readers wait on the same result.
//! - **Stale-while-revalidate**: a stale entry keeps serving its last value
//!   from [`read`](QueryCache::read) while a refetch runs in the background.
//! - **Discard after clear**: a fetch whose entry was cleared (or superseded)
//!   still answers its waiters but is never written back.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::error::{Error, Result, StoreError, StoreErrorKind};

/// Producer-side view of the cache: the operations that mark data as
/// outdated, without access to values or fetches.
pub trait CacheControl: Send + Sync {
    fn invalidate(&self, key: &str);
    fn invalidate_all(&self);
    fn clear(&self);
}

impl<C: CacheControl + ?Sized> CacheControl for Arc<C> {
    fn invalidate(&self, key: &str) {
        (**self).invalidate(key)
    }

    fn invalidate_all(&self) {
        (**self).invalidate_all()
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// Result of a non-mutating [`peek`](QueryCache::peek).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    /// Loaded and not invalidated since.
    Fresh(V),
    /// Loaded, but invalidated; the next read refetches.
    Stale(V),
    /// Never loaded; a fetch is in flight.
    Pending,
    /// No entry, or never loaded with nothing in flight.
    Missing,
}

type Outcome<V> = Option<Result<V>>;

struct Flight<V> {
    id: u64,
    /// Entry epoch when the fetch started.
    epoch: u64,
    rx: watch::Receiver<Outcome<V>>,
}

struct Entry<V> {
    value: Option<V>,
    stale: bool,
    /// Bumped on every invalidation.
    epoch: u64,
    flight: Option<Flight<V>>,
}

impl<V> Entry<V> {
    fn new() -> Self {
        Self {
            value: None,
            stale: false,
            epoch: 0,
            flight: None,
        }
    }

    fn mark_stale(&mut self) {
        self.stale = true;
        self.epoch += 1;
    }
}

struct Inner<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    next_flight: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    discarded: AtomicU64,
}

impl<V: Clone> Inner<V> {
    /// Writes a finished fetch back, unless its entry was cleared or a newer
    /// fetch took over.
    fn complete(&self, key: &str, id: u64, result: &Result<V>) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            debug!(key, flight = id, "discarding fetch result for cleared entry");
            return;
        };

        let flight = match entry.flight.take() {
            Some(flight) if flight.id == id => flight,
            other => {
                entry.flight = other;
                self.discarded.fetch_add(1, Ordering::Relaxed);
                debug!(key, flight = id, "discarding superseded fetch result");
                return;
            }
        };

        match result {
            Ok(value) => {
                entry.value = Some(value.clone());
                // Invalidated while fetching: the value may predate the event.
                entry.stale = flight.epoch != entry.epoch;
                debug!(key, stale = entry.stale, "cache entry updated");
            }
            Err(e) => {
                entry.stale = true;
                debug!(key, error = %e, "fetch failed; keeping previous value");
            }
        }
    }
}

/// Delivers a flight's outcome exactly once. If the fetch task unwinds or is
/// dropped before finishing, the flight is closed with a failure so the next
/// read starts a new fetch.
struct FlightGuard<V: Clone> {
    inner: Weak<Inner<V>>,
    key: String,
    id: u64,
    tx: Option<watch::Sender<Outcome<V>>>,
}

impl<V: Clone> FlightGuard<V> {
    fn finish(&mut self, result: Result<V>) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        if let Some(inner) = self.inner.upgrade() {
            inner.complete(&self.key, self.id, &result);
        }
        let _ = tx.send(Some(result));
    }
}

impl<V: Clone> Drop for FlightGuard<V> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            debug!(key = %self.key, flight = self.id, "fetch ended without a result");
            self.finish(Err(abandoned_fetch()));
        }
    }
}

fn abandoned_fetch() -> Error {
    Error::FetchFailed(StoreError::new(
        StoreErrorKind::Other,
        "fetch ended without a result",
    ))
}

/// Process-wide cache of fetched values, keyed by string.
///
/// Cloning is cheap and every clone shares the same entries.
pub struct QueryCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for QueryCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for QueryCache<V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                next_flight: AtomicU64::new(1),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                fetches: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
            }),
        }
    }
}

impl<V> std::fmt::Debug for QueryCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.inner.entries.lock().len())
            .finish_non_exhaustive()
    }
}

impl<V> QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, fetching it with `loader` when needed.
    ///
    /// A fresh value is returned as is. A stale value is returned immediately
    /// while a refetch starts in the background. A missing value waits for
    /// the in-flight fetch, starting one if none exists.
    ///
    /// `loader` is only called to start a new fetch, while the cache is
    /// locked; it must not touch the cache before its future is polled.
    pub async fn read<F, Fut>(&self, key: &str, loader: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.lookup_or_fetch(key, loader, true).await
    }

    /// Like [`read`](Self::read), but a stale value is not served: waits for
    /// a fetch started after the latest invalidation.
    pub async fn revalidate<F, Fut>(&self, key: &str, loader: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.lookup_or_fetch(key, loader, false).await
    }

    async fn lookup_or_fetch<F, Fut>(&self, key: &str, loader: F, serve_stale: bool) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let rx = {
            let mut entries = self.inner.entries.lock();
            let entry = entries.entry(key.to_string()).or_insert_with(Entry::new);

            match entry.value.clone() {
                Some(value) if !entry.stale => {
                    self.inner.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(value);
                }
                Some(value) if serve_stale => {
                    self.inner.hits.fetch_add(1, Ordering::Relaxed);
                    self.ensure_flight(key, entry, loader);
                    return Ok(value);
                }
                _ => {
                    self.inner.misses.fetch_add(1, Ordering::Relaxed);
                    self.ensure_flight(key, entry, loader)
                }
            }
        };

        wait_for_outcome(rx).await
    }

    /// Joins the flight for the entry's current epoch, or starts one.
    fn ensure_flight<F, Fut>(&self, key: &str, entry: &mut Entry<V>, loader: F) -> watch::Receiver<Outcome<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if let Some(flight) = &entry.flight {
            if flight.epoch == entry.epoch {
                return flight.rx.clone();
            }
        }

        let id = self.inner.next_flight.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        entry.flight = Some(Flight {
            id,
            epoch: entry.epoch,
            rx: rx.clone(),
        });
        self.inner.fetches.fetch_add(1, Ordering::Relaxed);
        debug!(key, flight = id, "starting fetch");

        // Runs detached so a dropped reader never cancels the shared fetch.
        let fetch = loader();
        let mut guard = FlightGuard {
            inner: Arc::downgrade(&self.inner),
            key: key.to_string(),
            id,
            tx: Some(tx),
        };
        tokio::spawn(async move {
            let result = fetch.await;
            guard.finish(result);
        });

        rx
    }

    /// Marks `key` stale, keeping its last value readable.
    pub fn invalidate(&self, key: &str) {
        if let Some(entry) = self.inner.entries.lock().get_mut(key) {
            entry.mark_stale();
            debug!(key, "cache entry invalidated");
        }
    }

    /// Marks every entry stale.
    pub fn invalidate_all(&self) {
        let mut entries = self.inner.entries.lock();
        for entry in entries.values_mut() {
            entry.mark_stale();
        }
        debug!(count = entries.len(), "all cache entries invalidated");
    }

    /// Drops every entry. Fetches still in flight are detached from the cache
    /// and their results discarded.
    pub fn clear(&self) {
        let mut entries = self.inner.entries.lock();
        debug!(count = entries.len(), "cache cleared");
        entries.clear();
    }

    /// Inspects `key` without fetching or counting a hit.
    pub fn peek(&self, key: &str) -> Lookup<V> {
        let entries = self.inner.entries.lock();
        match entries.get(key) {
            None => Lookup::Missing,
            Some(entry) => match (&entry.value, entry.stale) {
                (Some(v), false) => Lookup::Fresh(v.clone()),
                (Some(v), true) => Lookup::Stale(v.clone()),
                (None, _) if entry.flight.is_some() => Lookup::Pending,
                (None, _) => Lookup::Missing,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            fetches: self.inner.fetches.load(Ordering::Relaxed),
            discarded: self.inner.discarded.load(Ordering::Relaxed),
        }
    }
}

impl<V> CacheControl for QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn invalidate(&self, key: &str) {
        QueryCache::invalidate(self, key)
    }

    fn invalidate_all(&self) {
        QueryCache::invalidate_all(self)
    }

    fn clear(&self) {
        QueryCache::clear(self)
    }
}

async fn wait_for_outcome<V: Clone>(mut rx: watch::Receiver<Outcome<V>>) -> Result<V> {
    let outcome = rx
        .wait_for(Option::is_some)
        .await
        .ok()
        .and_then(|done| done.clone());

    outcome.unwrap_or_else(|| Err(abandoned_fetch()))
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    /// Reads answered from a stored value, fresh or stale.
    pub hits: u64,
    /// Reads that had to wait for a fetch.
    pub misses: u64,
    /// Fetches started.
    pub fetches: u64,
    /// Fetch results dropped because their entry was cleared or superseded.
    pub discarded: u64,
}
