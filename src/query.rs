//! Queries with stale-time gated fetching and focus revalidation.
//!
//! This module provides [`Query`] and [`QueryClient`] for reading remote data
//! through a shared cache, similar to SWR or TanStack Query.
//!
//! # Lifecycle
//!
//! 1. [`Query::new`] seeds the query from the cache if the key already holds a
//!    value of the expected type. No fetch happens yet.
//! 2. [`Query::activate`] runs exactly one initial fetch and, when enabled,
//!    starts listening for focus events. Repeated activation is a no-op.
//! 3. [`Query::fetch`] skips the fetch operation while this query's last
//!    successful fetch is younger than the stale time and the cache holds a
//!    value. [`Query::refetch`] always fetches.
//! 4. [`Query::teardown`] (or dropping the last handle) stops the focus
//!    listener. Fetches already in flight still run to completion.
//!
//! Failures never escape the query: they are recorded in [`QueryState::error`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use futures::FutureExt;
//! use stale_query::prelude::*;
//!
//! # futures::executor::block_on(async {
//! let client = Arc::new(QueryClient::new());
//!
//! let query: Query<Vec<String>> = Query::new(
//!     &"todos",
//!     |_token| async { JsonResponse::ok(&["write docs"]) }.boxed(),
//!     client.clone(),
//! );
//! assert!(query.is_loading());
//!
//! query.refetch().await;
//! assert_eq!(query.data(), Some(vec!["write docs".to_string()]));
//! assert_eq!(client.cache().get::<Vec<String>>("todos").map(|t| t.len()), Some(1));
//! # });
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::config::QueryConfig;
use crate::focus::FocusEvents;
use crate::response::FetchResponse;

/// Error type for query operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Fetch failed: {0}")]
    FetchError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse failed: {0}")]
    ParseError(String),

    #[error("Fetch panicked: {0}")]
    Panicked(String),
}

/// The observable state of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState<T> {
    /// Last successfully fetched (or cache-seeded) value.
    pub data: Option<T>,
    /// Error of the last failed fetch, cleared by the next success.
    pub error: Option<QueryError>,
    /// `true` while a fetch operation is in flight.
    pub is_loading: bool,
    /// Number of fetch operations started by this query.
    pub fetch_count: u64,
    /// Start instant of the last successful fetch.
    pub last_fetch: Option<Instant>,
}

impl<T> QueryState<T> {
    fn seeded(data: Option<T>) -> Self {
        Self {
            is_loading: data.is_none(),
            data,
            error: None,
            fetch_count: 0,
            last_fetch: None,
        }
    }

    /// Returns `true` if the query holds data and no error.
    pub const fn is_success(&self) -> bool {
        self.data.is_some() && self.error.is_none()
    }

    /// Returns `true` if the last fetch failed.
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Shared context for queries and mutations.
///
/// The `QueryClient` owns:
/// - the [`CacheStore`] every query and mutation reads and writes
/// - the [`FocusEvents`] source used for focus revalidation
/// - the default [`QueryConfig`] applied to queries built with [`Query::new`]
///
/// Each client is fully isolated, so tests can create one per case.
///
/// # Example
///
/// ```rust
/// use stale_query::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let config = QueryConfig::new(Duration::from_secs(10), false);
/// let client = Arc::new(QueryClient::with_config(config));
///
/// // Whatever drives the UI reports focus changes here.
/// client.notify_focus();
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryClient {
    cache: CacheStore,
    focus: FocusEvents,
    config: QueryConfig,
}

impl QueryClient {
    /// Creates a new query client with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    /// Creates a new query client with the given default configuration.
    #[must_use]
    pub fn with_config(config: QueryConfig) -> Self {
        Self {
            cache: CacheStore::new(),
            focus: FocusEvents::new(),
            config,
        }
    }

    /// The cache shared by every query and mutation of this client.
    #[must_use]
    pub const fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// The focus source queries listen to.
    #[must_use]
    pub const fn focus(&self) -> &FocusEvents {
        &self.focus
    }

    /// The default query configuration.
    #[must_use]
    pub const fn config(&self) -> QueryConfig {
        self.config
    }

    /// Reports that the host surface regained focus.
    ///
    /// Returns the number of queries that were listening.
    pub fn notify_focus(&self) -> usize {
        self.focus.notify()
    }
}

type Fetcher<T> =
    Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<T, QueryError>> + Send + Sync>;

/// A cached, revalidating view of one remote resource.
///
/// `Query` is a cheap handle; clones share the same state. See the
/// [module documentation](self) for the lifecycle.
pub struct Query<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    key: String,
    fetcher: Fetcher<T>,
    client: Arc<QueryClient>,
    config: QueryConfig,
    state: watch::Sender<QueryState<T>>,
    activated: AtomicBool,
    token: CancellationToken,
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Query<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Creates a query using the client's default configuration.
    ///
    /// # Arguments
    ///
    /// * `key` - The cache key this query reads and writes
    /// * `fetcher` - Produces a response whose JSON body is the query data
    /// * `client` - The shared client
    pub fn new<F, R>(key: &impl ToString, fetcher: F, client: Arc<QueryClient>) -> Self
    where
        F: Fn(CancellationToken) -> BoxFuture<'static, Result<R, QueryError>>
            + Send
            + Sync
            + 'static,
        R: FetchResponse,
    {
        let config = client.config();
        Self::with_config(key, fetcher, client, config)
    }

    /// Creates a query with its own configuration.
    pub fn with_config<F, R>(
        key: &impl ToString,
        fetcher: F,
        client: Arc<QueryClient>,
        config: QueryConfig,
    ) -> Self
    where
        F: Fn(CancellationToken) -> BoxFuture<'static, Result<R, QueryError>>
            + Send
            + Sync
            + 'static,
        R: FetchResponse,
    {
        let key = key.to_string();
        let seeded = client.cache().get::<T>(&key);
        if seeded.is_some() {
            debug!(key, "seeded query from cache");
        }
        let (state, _) = watch::channel(QueryState::seeded(seeded));

        let fetcher: Fetcher<T> = Arc::new(move |token| {
            let response = fetcher(token);
            async move { response.await?.json::<T>().await }.boxed()
        });

        Self {
            inner: Arc::new(Inner {
                key,
                fetcher,
                client,
                config,
                state,
                activated: AtomicBool::new(false),
                token: CancellationToken::new(),
            }),
        }
    }

    /// Activates the query.
    ///
    /// The first call fetches (without forcing) and starts the focus listener
    /// if `refetch_on_window_focus` is enabled. Later calls do nothing.
    pub async fn activate(&self) {
        if self.inner.activated.swap(true, Ordering::AcqRel) {
            debug!(key = self.inner.key, "query already active");
            return;
        }
        if self.inner.config.refetch_on_window_focus {
            self.spawn_focus_listener();
        }
        self.fetch(false).await;
    }

    /// Fetches the data unless it is fresh.
    ///
    /// With `force` set the staleness check is bypassed. Fetches are not
    /// deduplicated: when two overlap, whichever settles last wins.
    pub async fn fetch(&self, force: bool) {
        let inner = &*self.inner;
        let key = inner.key.as_str();
        let now = Instant::now();
        let stale_time = inner.config.stale_time;
        // A zero stale time is always stale, even within one clock tick.
        let is_stale = stale_time.is_zero()
            || inner
                .state
                .borrow()
                .last_fetch
                .is_none_or(|last| now.duration_since(last) > stale_time);

        if !force && !is_stale && inner.client.cache().contains_as::<T>(key) {
            debug!(key, "cache hit, skipping fetch");
            return;
        }

        let mut attempt = 0;
        inner.state.send_modify(|state| {
            state.fetch_count += 1;
            state.is_loading = true;
            attempt = state.fetch_count;
        });
        let _loading = LoadingGuard {
            state: &inner.state,
        };
        info!(key, attempt, force, "fetch attempt");

        let token = inner.token.child_token();
        let result = AssertUnwindSafe(async { (inner.fetcher)(token).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(QueryError::Panicked(panic_message(&*panic))));

        match result {
            Ok(data) => {
                inner.client.cache().set(&inner.key, data.clone());
                inner.state.send_modify(|state| {
                    state.data = Some(data);
                    state.error = None;
                    state.last_fetch = Some(now);
                    state.is_loading = false;
                });
                info!(key, attempt, "fetch successful");
            }
            Err(error) => {
                warn!(key, attempt, %error, "fetch failed");
                inner.state.send_modify(|state| {
                    state.data = None;
                    state.error = Some(error);
                    state.is_loading = false;
                });
            }
        }
    }

    /// Fetches regardless of staleness.
    pub async fn refetch(&self) {
        self.fetch(true).await;
    }

    /// Runs [`refetch`](Self::refetch) on the tokio runtime.
    ///
    /// Useful from synchronous callbacks such as mutation `on_success` hooks.
    pub fn spawn_refetch(&self) -> JoinHandle<()> {
        let query = self.clone();
        tokio::spawn(async move { query.refetch().await })
    }

    fn spawn_focus_listener(&self) {
        let mut events = self.inner.client.focus().stream();
        let token = self.inner.token.clone();
        let weak = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    event = events.next() => {
                        let (Some(()), Some(inner)) = (event, weak.upgrade()) else {
                            break;
                        };
                        debug!(key = inner.key, "focus regained, revalidating");
                        let query = Self { inner };
                        tokio::spawn(async move { query.refetch().await });
                    }
                }
            }
        });
    }
}

impl<T> Query<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Stops focus revalidation for this query and every clone of it.
    pub fn teardown(&self) {
        debug!(key = self.inner.key, "query torn down");
        self.inner.token.cancel();
    }

    /// Returns `true` once the query has been torn down.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// The cache key of this query.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// The configuration this query was built with.
    #[must_use]
    pub fn config(&self) -> QueryConfig {
        self.inner.config
    }

    /// Returns a snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> QueryState<T> {
        self.inner.state.borrow().clone()
    }

    /// Returns the current data, if any.
    #[must_use]
    pub fn data(&self) -> Option<T> {
        self.inner.state.borrow().data.clone()
    }

    /// Returns the error of the last failed fetch.
    #[must_use]
    pub fn error(&self) -> Option<QueryError> {
        self.inner.state.borrow().error.clone()
    }

    /// Returns `true` while a fetch is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    /// Returns the number of fetches this query has started.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.inner.state.borrow().fetch_count
    }

    /// Returns a receiver notified on every state transition.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<QueryState<T>> {
        self.inner.state.subscribe()
    }

    /// Returns a stream of state snapshots, starting with the current one.
    pub fn subscribe(&self) -> BoxStream<'static, QueryState<T>> {
        WatchStream::new(self.watch()).boxed()
    }
}

/// Clears `is_loading` if a fetch is abandoned before it settles.
struct LoadingGuard<'a, T> {
    state: &'a watch::Sender<QueryState<T>>,
}

impl<T> Drop for LoadingGuard<'_, T> {
    fn drop(&mut self) {
        self.state
            .send_if_modified(|state| std::mem::replace(&mut state.is_loading, false));
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
