// In-memory todo API shared by the integration tests.
// Mirrors a tiny REST backend: list, add (201 with the new item), delete (no content).

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use stale_query::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: u32,
    pub title: String,
    pub completed: bool,
}

impl Todo {
    pub fn new(id: u32, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            completed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTodo {
    pub title: String,
    pub completed: bool,
}

impl NewTodo {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            completed: false,
        }
    }
}

pub type Fetch = BoxFuture<'static, Result<JsonResponse, QueryError>>;
pub type Mutate<D> = BoxFuture<'static, Result<Option<D>, MutationError>>;

#[derive(Debug, Clone, Default)]
pub struct TodoApi {
    todos: Arc<Mutex<Vec<Todo>>>,
    list_calls: Arc<AtomicUsize>,
    offline: Arc<AtomicBool>,
}

impl TodoApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_todos(todos: Vec<Todo>) -> Self {
        let api = Self::new();
        *api.todos.lock().unwrap() = todos;
        api
    }

    pub fn todos(&self) -> Vec<Todo> {
        self.todos.lock().unwrap().clone()
    }

    /// Number of times the list endpoint was hit.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// While offline every list request fails with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn fetch_todos(&self) -> impl Fn(CancellationToken) -> Fetch + Send + Sync + 'static {
        let api = self.clone();
        move |_token| {
            api.list_calls.fetch_add(1, Ordering::SeqCst);
            let offline = api.offline.load(Ordering::SeqCst);
            let todos = api.todos();
            async move {
                if offline {
                    return Err(QueryError::NetworkError("connection refused".to_string()));
                }
                JsonResponse::ok(&todos)
            }
            .boxed()
        }
    }

    pub fn add_todo(
        &self,
    ) -> impl Fn(NewTodo, CancellationToken) -> Mutate<Todo> + Send + Sync + 'static {
        let api = self.clone();
        move |new_todo, _token| {
            let mut todos = api.todos.lock().unwrap();
            let id = todos.iter().map(|t| t.id).max().map_or(1, |max| max + 1);
            let todo = Todo {
                id,
                title: new_todo.title,
                completed: new_todo.completed,
            };
            todos.push(todo.clone());
            async move { Ok(Some(todo)) }.boxed()
        }
    }

    pub fn delete_todo(
        &self,
    ) -> impl Fn(u32, CancellationToken) -> Mutate<()> + Send + Sync + 'static {
        let api = self.clone();
        move |id, _token| {
            api.todos.lock().unwrap().retain(|t| t.id != id);
            async { Ok(None) }.boxed()
        }
    }
}
