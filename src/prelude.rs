//! Prelude module for convenient imports.
//!
//! ```
//! use stale_query::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`QueryClient`], [`Query`], [`QueryState`], [`QueryError`] - Reading data
//! - [`Mutation`], [`MutationOptions`], [`MutationState`], [`MutationError`] - Changing data
//! - [`QueryConfig`] - Staleness and focus settings
//! - [`FetchResponse`], [`JsonResponse`] - What fetch operations resolve to
//! - [`CancellationToken`] - Handed to every fetch and mutation operation

pub use crate::config::QueryConfig;
pub use crate::mutation::{Mutation, MutationError, MutationOptions, MutationState};
pub use crate::query::{Query, QueryClient, QueryError, QueryState};
pub use crate::response::{FetchResponse, JsonResponse};
pub use tokio_util::sync::CancellationToken;
