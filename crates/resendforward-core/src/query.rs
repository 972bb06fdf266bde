//! Queries, fetching and polling watches
//!
//! A [`Query`] pairs a cache key with a fetcher. [`QueryClient::fetch`] runs it
//! once through the cache; [`QueryClient::watch`] keeps it live: the last good
//! value stays visible while a refetch runs, the query is re-issued on a fixed
//! interval only while its data still holds in-flight records, and it is
//! re-issued whenever its key is invalidated. Readers of one key share a
//! single request, and a watch adopts any value another reader commits for
//! its key.

use crate::cache::{CacheEvent, Outcome, QueryCache, QueryKey, Ticket};
use crate::notify::{report_error, Notifier};
use resendforward_common::{Error, Result};
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::debug;

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;
type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// A read query
pub struct Query<T> {
    pub key: QueryKey,
    enabled: bool,
    fetcher: Fetcher<T>,
    poll_while: Option<fn(&T) -> bool>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            enabled: self.enabled,
            fetcher: self.fetcher.clone(),
            poll_while: self.poll_while,
        }
    }
}

impl<T: Send + Sync + 'static> Query<T> {
    pub fn new<F, Fut>(key: QueryKey, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            key,
            enabled: true,
            fetcher: Arc::new(move || Box::pin(fetch()) as BoxFuture<T>),
            poll_while: None,
        }
    }

    /// A disabled query is never issued
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Keep polling while `predicate` holds for the latest data
    pub fn poll_while(mut self, predicate: fn(&T) -> bool) -> Self {
        self.poll_while = Some(predicate);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn should_poll(&self, data: &T) -> bool {
        self.poll_while.map(|p| p(data)).unwrap_or(false)
    }
}

/// Observable state of a watched query
#[derive(Debug)]
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    /// `data` belongs to a previous key and is shown until the new one resolves
    pub is_placeholder: bool,
    pub is_fetching: bool,
    /// Message of the last surfaced failure; cleared by the next success
    pub error: Option<String>,
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            is_placeholder: self.is_placeholder,
            is_fetching: self.is_fetching,
            error: self.error.clone(),
        }
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_placeholder: false,
            is_fetching: false,
            error: None,
        }
    }
}

/// Runs queries through the shared cache
#[derive(Clone)]
pub struct QueryClient {
    cache: Arc<QueryCache>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
}

impl QueryClient {
    pub fn new(cache: Arc<QueryCache>, notifier: Arc<dyn Notifier>, interval: Duration) -> Self {
        Self {
            cache,
            notifier,
            interval,
        }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Issue `query` once.
    ///
    /// Returns `Ok(None)` without touching the backend when the query is
    /// disabled. A request already in flight for the same key is joined
    /// instead of repeated. Failures other than cancellation are reported to
    /// the notifier once, by the caller that issued the request.
    pub async fn fetch<T: Send + Sync + 'static>(&self, query: &Query<T>) -> Result<Option<Arc<T>>> {
        if !query.enabled {
            return Ok(None);
        }

        loop {
            match self.cache.join_or_begin(&query.key).await {
                Ticket::Leader { seq, done } => {
                    debug!(key = %query.key, seq, "Fetching query");
                    let result = match (query.fetcher)().await {
                        Ok(value) => self.cache.commit(&query.key, seq, value).await,
                        Err(e) => Err(self.cache.settle_error(&query.key, seq, e).await),
                    };
                    let outcome: Outcome = match &result {
                        Ok(value) => Ok(value.clone() as Arc<dyn Any + Send + Sync>),
                        Err(e) => Err(Arc::new(e.replicate())),
                    };
                    self.cache.finish(&query.key, seq, done, outcome).await;

                    if let Err(e) = &result {
                        report_error(self.notifier.as_ref(), e);
                    }
                    return result.map(Some);
                }
                Ticket::Follower(mut pending) => {
                    debug!(key = %query.key, "Joining request in flight");
                    let outcome = match pending.wait_for(|o| o.is_some()).await {
                        Ok(outcome) => outcome.clone(),
                        // leader dropped before finishing
                        Err(_) => continue,
                    };
                    return match outcome {
                        Some(Ok(value)) => value.downcast::<T>().map(Some).map_err(|_| {
                            Error::Internal(format!("Unexpected value type cached for {}", query.key))
                        }),
                        Some(Err(e)) => Err(e.replicate()),
                        None => continue,
                    };
                }
            }
        }
    }

    /// Serve the cached value when fresh, otherwise fetch.
    ///
    /// When the request is superseded the newest committed value is served.
    pub async fn read<T: Send + Sync + 'static>(&self, query: &Query<T>) -> Result<Option<Arc<T>>> {
        if !query.enabled {
            return Ok(None);
        }
        if !self.cache.is_stale(&query.key).await {
            if let Some(value) = self.cache.get::<T>(&query.key).await {
                return Ok(Some(value));
            }
        }
        match self.fetch(query).await {
            Err(e) if e.is_cancellation() => Ok(self.cache.get::<T>(&query.key).await),
            other => other,
        }
    }

    /// Keep `query` live in a background task
    pub fn watch<T: Send + Sync + 'static>(&self, query: Query<T>) -> QueryWatch<T> {
        let (state_tx, state_rx) = watch::channel(QueryState::default());
        let (query_tx, query_rx) = watch::channel(query);
        let events = self.cache.subscribe();
        let task = tokio::spawn(run_watch(self.clone(), query_rx, state_tx, events));
        QueryWatch {
            state: state_rx,
            query: query_tx,
            task,
        }
    }
}

/// Handle to a watched query; the background task stops when it is dropped
pub struct QueryWatch<T> {
    state: watch::Receiver<QueryState<T>>,
    query: watch::Sender<Query<T>>,
    task: JoinHandle<()>,
}

impl<T> QueryWatch<T> {
    pub fn state(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.clone()
    }

    /// Switch to a new query (e.g. after a filter change).
    ///
    /// A request still in flight for the previous query is dropped.
    pub fn set_query(&self, query: Query<T>) {
        self.query.send_replace(query);
    }

    /// Wait until the next fetch settles
    pub async fn next_settled(&mut self) -> Option<QueryState<T>> {
        loop {
            self.state.changed().await.ok()?;
            let state = self.state.borrow_and_update().clone();
            if !state.is_fetching {
                return Some(state);
            }
        }
    }
}

impl<T> Drop for QueryWatch<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_watch<T: Send + Sync + 'static>(
    client: QueryClient,
    mut queries: watch::Receiver<Query<T>>,
    state: watch::Sender<QueryState<T>>,
    mut events: broadcast::Receiver<CacheEvent>,
) {
    let mut query = queries.borrow_and_update().clone();
    let mut refetch = true;

    loop {
        if !query.enabled {
            state.send_if_modified(|s| {
                let had_state = s.data.is_some() || s.is_fetching || s.error.is_some();
                *s = QueryState::default();
                had_state
            });
            if queries.changed().await.is_err() {
                return;
            }
            query = queries.borrow_and_update().clone();
            refetch = true;
            continue;
        }

        let polling = if refetch {
            let cached = client.cache.get::<T>(&query.key).await;
            state.send_modify(|s| {
                match cached {
                    Some(data) => {
                        s.data = Some(data);
                        s.is_placeholder = false;
                    }
                    None => s.is_placeholder = s.data.is_some(),
                }
                s.is_fetching = true;
            });

            let outcome = tokio::select! {
                result = client.fetch(&query) => Some(result),
                changed = queries.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    None
                }
            };

            match outcome {
                None => {
                    debug!(key = %query.key, "Query replaced while in flight, superseding request");
                    query = queries.borrow_and_update().clone();
                    continue;
                }
                Some(Ok(Some(data))) => show(&state, &query, data),
                Some(Ok(None)) => {
                    state.send_modify(|s| s.is_fetching = false);
                    false
                }
                Some(Err(e)) if e.is_cancellation() => {
                    match client.cache.get::<T>(&query.key).await {
                        Some(data) => show(&state, &query, data),
                        None => {
                            state.send_modify(|s| s.is_fetching = false);
                            false
                        }
                    }
                }
                Some(Err(e)) => {
                    let keep_polling = {
                        let current = state.borrow();
                        !current.is_placeholder
                            && current.data.as_deref().map(|d| query.should_poll(d)).unwrap_or(false)
                    };
                    state.send_modify(|s| {
                        s.is_fetching = false;
                        s.error = Some(e.to_string());
                    });
                    keep_polling
                }
            }
        } else {
            match client.cache.get::<T>(&query.key).await {
                Some(data) => {
                    debug!(key = %query.key, "Adopting value committed by another reader");
                    show(&state, &query, data)
                }
                None => false,
            }
        };
        refetch = true;

        if polling {
            debug!(key = %query.key, interval = ?client.interval, "In-flight records remain, polling");
        } else {
            debug!(key = %query.key, "No in-flight records, polling stopped");
        }

        let sleep = async {
            if polling {
                tokio::time::sleep(client.interval).await
            } else {
                std::future::pending::<()>().await
            }
        };
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => break,
                changed = queries.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    query = queries.borrow_and_update().clone();
                    break;
                }
                event = events.recv() => match event {
                    Ok(CacheEvent::Invalidated(key)) if key == query.key => break,
                    Ok(CacheEvent::Updated(key)) if key == query.key => {
                        if !shows_latest(&client, &state, &key).await {
                            refetch = false;
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Cache events lagged, refetching");
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
            }
        }
    }
}

/// Publish settled data and report whether it should be polled
fn show<T: Send + Sync + 'static>(
    state: &watch::Sender<QueryState<T>>,
    query: &Query<T>,
    data: Arc<T>,
) -> bool {
    let polling = query.should_poll(&data);
    state.send_modify(|s| {
        s.data = Some(data);
        s.is_placeholder = false;
        s.is_fetching = false;
        s.error = None;
    });
    polling
}

/// Whether the watch already shows the value last committed for `key`
async fn shows_latest<T: Send + Sync + 'static>(
    client: &QueryClient,
    state: &watch::Sender<QueryState<T>>,
    key: &QueryKey,
) -> bool {
    let Some(latest) = client.cache.get::<T>(key).await else {
        return true;
    };
    let current = state.borrow();
    matches!(&current.data, Some(data) if Arc::ptr_eq(data, &latest))
}
