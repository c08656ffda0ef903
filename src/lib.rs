//! # stale-query - stale-time gated queries and write-through mutations
//!
//! stale-query is a client-side data fetching layer in the style of SWR or
//! TanStack Query. It keeps the last known value of every remote resource in a
//! shared, in-memory cache and decides per call site whether a fetch is needed.
//!
//! ## Core Components
//!
//! - [`QueryClient`](query::QueryClient): Injected context owning the cache, the
//!   focus source and the default configuration
//! - [`Query`](query::Query): Fetches one resource on activation or when stale,
//!   tracks loading/error state, revalidates on focus
//! - [`Mutation`](mutation::Mutation): Runs an effectful operation and writes its
//!   result through to the cache
//! - [`CacheStore`](cache::CacheStore): Type-erased key-value store shared by both
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use futures::FutureExt;
//! use stale_query::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Arc::new(QueryClient::with_config(QueryConfig::new(
//!         Duration::from_secs(10),
//!         true,
//!     )));
//!
//!     let todos: Query<Vec<String>> = Query::new(
//!         &"todos",
//!         |_token| async { JsonResponse::ok(&["buy milk"]) }.boxed(),
//!         client.clone(),
//!     );
//!     todos.activate().await;
//!
//!     let refresh = todos.clone();
//!     let add = Mutation::with_options(
//!         |title: String, _token| async move { Ok(Some(title)) }.boxed(),
//!         client.clone(),
//!         MutationOptions::new().on_success(move |_, _| {
//!             refresh.spawn_refetch();
//!         }),
//!     );
//!     add.mutate("walk the dog".to_string()).await;
//!
//!     // The host reports focus changes; active queries revalidate.
//!     client.notify_focus();
//! }
//! ```
//!
//! ## Concurrency
//!
//! Fetches are not deduplicated. When several fetches of the same query
//! overlap, whichever settles last determines the final state.

pub mod cache;
pub mod config;
pub mod focus;
pub mod mutation;
pub mod prelude;
pub mod query;
pub mod response;
