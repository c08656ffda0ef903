//! Todo list example demonstrating Query and Mutation with a shared cache.
//!
//! This example shows:
//! - A query that loads the list once and serves it from cache while fresh
//! - Mutations that refetch the list from their `on_success` callback
//! - A delete that returns no content and therefore leaves the cache alone
//! - Focus revalidation driven by the host
//!
//! The backend is an in-memory todo store, so no network is needed.
//!
//! Run with: `RUST_LOG=stale_query=debug cargo run --example todo`

use std::sync::{Arc, Mutex};
use std::time::Duration;

use color_eyre::eyre::{Result, eyre};
use futures::FutureExt;
use futures::StreamExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use stale_query::prelude::*;
use tracing_subscriber::EnvFilter;

/// A todo item as stored by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Todo {
    id: u32,
    title: String,
    completed: bool,
}

/// In-memory backend standing in for a REST API.
#[derive(Debug, Clone, Default)]
struct Backend {
    todos: Arc<Mutex<Vec<Todo>>>,
}

impl Backend {
    fn list(&self) -> BoxFuture<'static, Result<JsonResponse, QueryError>> {
        let todos = self
            .todos
            .lock()
            .map(|todos| todos.clone())
            .map_err(|e| QueryError::FetchError(e.to_string()));
        async move { JsonResponse::ok(&todos?) }.boxed()
    }

    fn add(&self, title: String) -> BoxFuture<'static, Result<Option<Todo>, MutationError>> {
        let created = self
            .todos
            .lock()
            .map(|mut todos| {
                let id = todos.iter().map(|t| t.id).max().map_or(1, |max| max + 1);
                let todo = Todo {
                    id,
                    title,
                    completed: false,
                };
                todos.push(todo.clone());
                todo
            })
            .map_err(MutationError::failed);
        async move { created.map(Some) }.boxed()
    }

    /// Deleting answers with no content.
    fn delete(&self, id: u32) -> BoxFuture<'static, Result<Option<()>, MutationError>> {
        let removed = self
            .todos
            .lock()
            .map(|mut todos| todos.retain(|t| t.id != id))
            .map_err(MutationError::failed);
        async move { removed.map(|()| None) }.boxed()
    }
}

fn render(state: &QueryState<Vec<Todo>>) {
    if state.is_loading {
        println!("  [fetch #{}] loading...", state.fetch_count);
    } else if let Some(error) = &state.error {
        println!("  error loading todos: {error}");
    } else if let Some(todos) = &state.data {
        let titles: Vec<_> = todos
            .iter()
            .map(|t| {
                let mark = if t.completed { "x" } else { " " };
                format!("[{mark}] #{} {}", t.id, t.title)
            })
            .collect();
        println!("  [fetch #{}] todos: {}", state.fetch_count, titles.join(", "));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = Arc::new(QueryClient::new());
    let backend = Backend::default();

    let list_backend = backend.clone();
    let todos: Query<Vec<Todo>> = Query::with_config(
        &"todos",
        move |_token| list_backend.list(),
        client.clone(),
        QueryConfig::new(Duration::from_secs(10), true),
    );

    // Print every state transition, like a view re-rendering.
    let mut states = todos.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(state) = states.next().await {
            render(&state);
        }
    });

    println!("activating");
    todos.activate().await;

    let refresh = todos.clone();
    let add_backend = backend.clone();
    let add = Mutation::with_options(
        move |title: String, _token| add_backend.add(title),
        client.clone(),
        MutationOptions::new()
            .query_key(&"todos")
            .on_mutate(|title: &String| println!("adding {title:?}"))
            .on_success(move |_, _| {
                refresh.spawn_refetch();
            }),
    );

    let refresh = todos.clone();
    let delete_backend = backend.clone();
    let delete = Mutation::with_options(
        move |id: u32, _token| delete_backend.delete(id),
        client.clone(),
        MutationOptions::new()
            .query_key(&"todos")
            .on_success(move |_, id| {
                println!("deleted #{id}");
                refresh.spawn_refetch();
            }),
    );

    for title in ["buy milk", "walk the dog", "write docs"] {
        add.mutate(title.to_string())
            .await
            .ok_or_else(|| eyre!("adding {title:?} failed: {:?}", add.error()))?;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    delete.mutate(2).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    println!("fresh fetch without force");
    todos.fetch(false).await;

    println!("window regained focus");
    client.notify_focus();
    tokio::time::sleep(Duration::from_millis(20)).await;

    println!("total fetches: {}", todos.fetch_count());
    todos.teardown();
    drop(todos);
    printer.abort();

    Ok(())
}
