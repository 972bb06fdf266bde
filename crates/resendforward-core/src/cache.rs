//! Query cache service
//!
//! One [`QueryCache`] is shared by every query and mutation of a dashboard.
//! Entries are keyed by [`QueryKey`] (a root name plus resolved parameters).
//! Each issued request is tagged with a per-key sequence number; only the
//! newest request for a key may commit. At most one request per key is in
//! flight: later readers join it through a [`Ticket::Follower`] and receive
//! the same outcome. Invalidation marks entries stale, detaches the request in
//! flight and is announced as a [`CacheEvent`], the cached value itself is
//! never mutated in place.

use resendforward_common::{Error, Result};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::debug;

/// Composite cache key: root name plus resolved filter parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    pub root: &'static str,
    pub params: BTreeMap<&'static str, String>,
}

impl QueryKey {
    pub fn new(root: &'static str) -> Self {
        Self {
            root,
            params: BTreeMap::new(),
        }
    }

    pub fn with_params(root: &'static str, params: BTreeMap<&'static str, String>) -> Self {
        Self { root, params }
    }

    /// Add one parameter
    pub fn param(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.params.insert(name, value.into());
        self
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, "{{{}}}", params.join(","))?;
        }
        Ok(())
    }
}

/// Cache change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A fresh value was committed
    Updated(QueryKey),
    /// The entry was marked stale and should be refetched by its readers
    Invalidated(QueryKey),
}

/// Result of one request, as seen by everyone waiting on it
pub type Outcome = std::result::Result<Arc<dyn Any + Send + Sync>, Arc<Error>>;

/// Role handed out by [`QueryCache::join_or_begin`]
pub enum Ticket {
    /// Issue request `seq` and publish its outcome with [`QueryCache::finish`]
    Leader {
        seq: u64,
        done: watch::Sender<Option<Outcome>>,
    },
    /// Wait for the request already in flight
    Follower(watch::Receiver<Option<Outcome>>),
}

#[derive(Default)]
struct Entry {
    value: Option<Arc<dyn Any + Send + Sync>>,
    stale: bool,
    /// Sequence number of the newest issued request
    issued: u64,
    /// Requests up to this sequence number were issued before the last
    /// invalidation and commit stale
    stale_through: u64,
    in_flight: Option<watch::Receiver<Option<Outcome>>>,
}

/// Process-wide query cache
pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, Entry>>,
    events: broadcast::Sender<CacheEvent>,
}

impl QueryCache {
    /// Create a cache whose event channel buffers `capacity` events per receiver
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            entries: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Register a request for `key` without joining one in flight
    #[cfg(test)]
    pub(crate) async fn begin(&self, key: &QueryKey) -> u64 {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key.clone()).or_default();
        entry.issued += 1;
        entry.issued
    }

    /// Join the request in flight for `key`, or register a new one.
    ///
    /// A request whose leader went away without finishing is not joined.
    pub async fn join_or_begin(&self, key: &QueryKey) -> Ticket {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key.clone()).or_default();
        if let Some(pending) = &entry.in_flight {
            if pending.has_changed().is_ok() && pending.borrow().is_none() {
                return Ticket::Follower(pending.clone());
            }
        }
        entry.issued += 1;
        let (done, pending) = watch::channel(None);
        entry.in_flight = Some(pending);
        Ticket::Leader {
            seq: entry.issued,
            done,
        }
    }

    /// Hand the outcome of request `seq` to its followers
    pub async fn finish(
        &self,
        key: &QueryKey,
        seq: u64,
        done: watch::Sender<Option<Outcome>>,
        outcome: Outcome,
    ) {
        done.send_replace(Some(outcome));
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            if entry.issued == seq {
                entry.in_flight = None;
            }
        }
    }

    /// Whether `seq` is still the newest request issued for `key`
    pub async fn is_current(&self, key: &QueryKey, seq: u64) -> bool {
        let entries = self.entries.read().await;
        entries.get(key).map(|e| e.issued == seq).unwrap_or(false)
    }

    /// Commit the response of request `seq`.
    ///
    /// Fails with [`Error::Cancelled`] when a newer request for the same key
    /// has been issued since; the cached value is left untouched.
    pub async fn commit<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
        seq: u64,
        value: T,
    ) -> Result<Arc<T>> {
        let value = Arc::new(value);
        {
            let mut entries = self.entries.write().await;
            let entry = entries.entry(key.clone()).or_default();
            if seq < entry.issued {
                debug!(%key, seq, newest = entry.issued, "Dropping superseded response");
                return Err(Error::Cancelled);
            }
            entry.value = Some(value.clone() as Arc<dyn Any + Send + Sync>);
            entry.stale = seq <= entry.stale_through;
        }
        let _ = self.events.send(CacheEvent::Updated(key.clone()));
        Ok(value)
    }

    /// Classify a failed request: a superseded one becomes a benign cancellation
    pub async fn settle_error(&self, key: &QueryKey, seq: u64, error: Error) -> Error {
        if self.is_current(key, seq).await {
            error
        } else {
            debug!(%key, seq, "Dropping error of superseded request: {}", error);
            Error::Cancelled
        }
    }

    /// Last committed value for `key`, stale or not
    pub async fn get<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let entries = self.entries.read().await;
        let value = entries.get(key)?.value.clone()?;
        value.downcast::<T>().ok()
    }

    /// True when `key` has no fresh value
    pub async fn is_stale(&self, key: &QueryKey) -> bool {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .map(|e| e.stale || e.value.is_none())
            .unwrap_or(true)
    }

    /// Mark every entry under `root` stale and announce it.
    ///
    /// Returns the keys now stale under that root. Invalidating twice leaves
    /// the same set.
    pub async fn invalidate(&self, root: &str) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = {
            let mut entries = self.entries.write().await;
            entries
                .iter_mut()
                .filter(|(key, _)| key.root == root)
                .map(|(key, entry)| {
                    entry.stale = true;
                    entry.stale_through = entry.issued;
                    entry.in_flight = None;
                    key.clone()
                })
                .collect()
        };
        keys.sort();
        debug!(root, count = keys.len(), "Invalidated queries");
        for key in &keys {
            let _ = self.events.send(CacheEvent::Invalidated(key.clone()));
        }
        keys
    }

    /// Every key currently marked stale
    pub async fn stale_keys(&self) -> Vec<QueryKey> {
        let entries = self.entries.read().await;
        let mut keys: Vec<QueryKey> = entries
            .iter()
            .filter(|(_, e)| e.stale)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(256)
    }
}
