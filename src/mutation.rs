//! Mutations that write their results through to the query cache.
//!
//! This module provides [`Mutation`] for creating, updating or deleting
//! remote resources, similar to mutations in TanStack Query.
//!
//! # Write-through vs. refetch
//!
//! When [`MutationOptions::query_key`] is set, a successful mutation that
//! returns content overwrites the cache entry for that key. A mutation never
//! touches any [`Query`](crate::query::Query) directly; call sites that need
//! server-derived state (a delete that should shrink a list) refetch the
//! related query from their `on_success` callback.
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
//! let rename = Mutation::with_options(
//!     |name: String, _token| async move { Ok(Some(name.to_uppercase())) }.boxed(),
//!     client.clone(),
//!     MutationOptions::new().query_key(&"profile-name"),
//! );
//!
//! assert_eq!(rename.mutate("ada".to_string()).await.as_deref(), Some("ADA"));
//! assert_eq!(client.cache().get::<String>("profile-name").as_deref(), Some("ADA"));
//! # });
//! ```

use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::query::{QueryClient, QueryError, panic_message};

/// Error type for mutation operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("Mutation failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Mutation panicked: {0}")]
    Panicked(String),
}

impl MutationError {
    /// Wraps any displayable failure.
    pub fn failed(error: impl Display) -> Self {
        Self::Failed(error.to_string())
    }
}

/// The observable state of a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationState {
    /// `true` while the mutation operation is in flight.
    pub is_loading: bool,
    /// Error of the last failed mutation, cleared when the next one starts.
    pub error: Option<MutationError>,
}

type Mutator<V, D> = Arc<
    dyn Fn(V, CancellationToken) -> BoxFuture<'static, Result<Option<D>, MutationError>>
        + Send
        + Sync,
>;
type OnMutate<V> = Arc<dyn Fn(&V) + Send + Sync>;
type OnSuccess<V, D> = Arc<dyn Fn(Option<&D>, &V) + Send + Sync>;
type OnError<V> = Arc<dyn Fn(&MutationError, &V) + Send + Sync>;
type OnSettled<V, D> = Arc<dyn Fn(Option<&D>, Option<&MutationError>, &V) + Send + Sync>;

/// Lifecycle callbacks and cache target of a [`Mutation`].
///
/// Callbacks run synchronously on the task that awaits
/// [`Mutation::mutate`], in this order: `on_mutate`, then either
/// `on_success` or `on_error`, then `on_settled`.
pub struct MutationOptions<V, D> {
    on_mutate: Option<OnMutate<V>>,
    on_success: Option<OnSuccess<V, D>>,
    on_error: Option<OnError<V>>,
    on_settled: Option<OnSettled<V, D>>,
    query_key: Option<String>,
}

impl<V, D> Default for MutationOptions<V, D> {
    fn default() -> Self {
        Self {
            on_mutate: None,
            on_success: None,
            on_error: None,
            on_settled: None,
            query_key: None,
        }
    }
}

impl<V, D> MutationOptions<V, D> {
    /// Returns options with no callbacks and no cache key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the variables before the operation starts.
    #[must_use]
    pub fn on_mutate(mut self, f: impl Fn(&V) + Send + Sync + 'static) -> Self {
        self.on_mutate = Some(Arc::new(f));
        self
    }

    /// Called with the result (`None` for no content) and the variables.
    #[must_use]
    pub fn on_success(mut self, f: impl Fn(Option<&D>, &V) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    /// Called with the error and the variables when the mutation fails.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&MutationError, &V) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Called after `on_success` or `on_error`, whatever the outcome.
    #[must_use]
    pub fn on_settled(
        mut self,
        f: impl Fn(Option<&D>, Option<&MutationError>, &V) + Send + Sync + 'static,
    ) -> Self {
        self.on_settled = Some(Arc::new(f));
        self
    }

    /// Cache key that successful results are written to.
    #[must_use]
    pub fn query_key(mut self, key: &impl ToString) -> Self {
        self.query_key = Some(key.to_string());
        self
    }
}

/// A reusable mutation bound to one operation and one set of options.
///
/// `Mutation` is a cheap handle; clones share the same state.
pub struct Mutation<V, D> {
    inner: Arc<Inner<V, D>>,
}

struct Inner<V, D> {
    mutator: Mutator<V, D>,
    options: MutationOptions<V, D>,
    client: Arc<QueryClient>,
    state: watch::Sender<MutationState>,
    token: CancellationToken,
}

impl<V, D> Drop for Inner<V, D> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl<V, D> Clone for Mutation<V, D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V, D> Mutation<V, D>
where
    V: Clone + Send + Sync + 'static,
    D: Clone + Send + Sync + 'static,
{
    /// Creates a mutation without callbacks or cache target.
    pub fn new<F>(mutator: F, client: Arc<QueryClient>) -> Self
    where
        F: Fn(V, CancellationToken) -> BoxFuture<'static, Result<Option<D>, MutationError>>
            + Send
            + Sync
            + 'static,
    {
        Self::with_options(mutator, client, MutationOptions::default())
    }

    /// Creates a mutation with the given options.
    ///
    /// # Arguments
    ///
    /// * `mutator` - Performs the change; `Ok(None)` means "no content"
    /// * `client` - The shared client whose cache receives the result
    /// * `options` - Callbacks and the optional cache key
    pub fn with_options<F>(
        mutator: F,
        client: Arc<QueryClient>,
        options: MutationOptions<V, D>,
    ) -> Self
    where
        F: Fn(V, CancellationToken) -> BoxFuture<'static, Result<Option<D>, MutationError>>
            + Send
            + Sync
            + 'static,
    {
        let (state, _) = watch::channel(MutationState::default());
        Self {
            inner: Arc::new(Inner {
                mutator: Arc::new(mutator),
                options,
                client,
                state,
                token: CancellationToken::new(),
            }),
        }
    }

    /// Runs the mutation.
    ///
    /// Returns the result when the operation succeeded with content, `None`
    /// when it succeeded with no content or failed. Failures are read from
    /// [`error`](Self::error).
    pub async fn mutate(&self, variables: V) -> Option<D> {
        let inner = &*self.inner;
        let options = &inner.options;
        let query_key = options.query_key.as_deref();

        inner.state.send_modify(|state| {
            state.is_loading = true;
            state.error = None;
        });
        let _loading = LoadingGuard {
            state: &inner.state,
        };

        if let Some(on_mutate) = &options.on_mutate {
            on_mutate(&variables);
        }
        debug!(query_key, "mutation started");

        let token = inner.token.child_token();
        let input = variables.clone();
        let result = AssertUnwindSafe(async { (inner.mutator)(input, token).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(MutationError::Panicked(panic_message(&*panic))));

        match result {
            Ok(data) => {
                if let (Some(key), Some(value)) = (query_key, &data) {
                    inner.client.cache().set(&key, value.clone());
                    debug!(query_key = key, "mutation result written to cache");
                }
                info!(query_key, no_content = data.is_none(), "mutation successful");

                if let Some(on_success) = &options.on_success {
                    on_success(data.as_ref(), &variables);
                }
                if let Some(on_settled) = &options.on_settled {
                    on_settled(data.as_ref(), None, &variables);
                }
                data
            }
            Err(error) => {
                warn!(query_key, %error, "mutation failed");
                inner
                    .state
                    .send_modify(|state| state.error = Some(error.clone()));

                if let Some(on_error) = &options.on_error {
                    on_error(&error, &variables);
                }
                if let Some(on_settled) = &options.on_settled {
                    on_settled(None, Some(&error), &variables);
                }
                None
            }
        }
    }

    /// Runs [`mutate`](Self::mutate) on the tokio runtime.
    pub fn spawn_mutate(&self, variables: V) -> JoinHandle<Option<D>> {
        let mutation = self.clone();
        tokio::spawn(async move { mutation.mutate(variables).await })
    }

    /// Returns a snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> MutationState {
        self.inner.state.borrow().clone()
    }

    /// Returns `true` while the mutation is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    /// Returns the error of the last failed mutation.
    #[must_use]
    pub fn error(&self) -> Option<MutationError> {
        self.inner.state.borrow().error.clone()
    }

    /// The cache key results are written to, if any.
    #[must_use]
    pub fn query_key(&self) -> Option<&str> {
        self.inner.options.query_key.as_deref()
    }

    /// Returns a receiver notified on every state transition.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<MutationState> {
        self.inner.state.subscribe()
    }
}

/// Clears `is_loading` once the mutation and its callbacks are done.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<MutationState>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state
            .send_if_modified(|state| std::mem::replace(&mut state.is_loading, false));
    }
}
