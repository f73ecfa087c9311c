use crate::domain::todo::{NewTodo, Todo, TodoId, UserId};
use crate::repo::ApiError;

/// Why a single-item update was sent. A rename that succeeds also closes the
/// row's editor; a toggle does not touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Toggle,
    Rename,
}

/// A call to the remote service, described as data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Load { user_id: UserId },
    Add(NewTodo),
    Update { todo: Todo, kind: UpdateKind },
    Delete { id: TodoId },
    UpdateMany(Vec<Todo>),
    DeleteMany(Vec<TodoId>),
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Load { .. } => "load",
            Request::Add(_) => "add",
            Request::Update { kind: UpdateKind::Toggle, .. } => "toggle",
            Request::Update { kind: UpdateKind::Rename, .. } => "rename",
            Request::Delete { .. } => "delete",
            Request::UpdateMany(_) => "toggle-all",
            Request::DeleteMany(_) => "clear-completed",
        }
    }
}

/// The settled result of a [`Request`].
///
/// Bulk outcomes keep what was sent next to each result so the receiver can
/// undo the optimistic part of a failed item.
#[derive(Debug)]
pub enum Outcome {
    Loaded(Result<Vec<Todo>, ApiError>),
    Added(Result<Todo, ApiError>),
    Updated {
        id: TodoId,
        kind: UpdateKind,
        result: Result<Todo, ApiError>,
    },
    Deleted {
        id: TodoId,
        result: Result<(), ApiError>,
    },
    UpdatedMany(Vec<(Todo, Result<Todo, ApiError>)>),
    DeletedMany(Vec<(TodoId, Result<(), ApiError>)>),
}

#[derive(Debug)]
pub struct Partition<K, T> {
    pub succeeded: Vec<(K, T)>,
    pub failed: Vec<(K, ApiError)>,
}

impl<K, T> Partition<K, T> {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Splits fanned-out results into succeeded and failed sets, keeping order.
pub fn partition<K, T>(results: Vec<(K, Result<T, ApiError>)>) -> Partition<K, T> {
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for (key, result) in results {
        match result {
            Ok(value) => succeeded.push((key, value)),
            Err(e) => failed.push((key, e)),
        }
    }
    Partition { succeeded, failed }
}
