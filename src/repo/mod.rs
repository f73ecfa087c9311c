use std::future::Future;

use thiserror::Error;

use crate::domain::todo::{NewTodo, Todo, TodoId, UserId};

pub mod http;
pub mod memory;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("todo {0} not found")]
    NotFound(TodoId),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("request task failed: {0}")]
    Task(String),
}

/// The remote todo service.
///
/// Methods return `Send` futures so a dispatcher can run them on a
/// multi-thread runtime.
pub trait TodoRepository: Send + Sync + 'static {
    fn list(&self, user_id: UserId) -> impl Future<Output = Result<Vec<Todo>, ApiError>> + Send;
    fn create(&self, draft: NewTodo) -> impl Future<Output = Result<Todo, ApiError>> + Send;
    fn update(&self, todo: Todo) -> impl Future<Output = Result<Todo, ApiError>> + Send;
    fn delete(&self, id: TodoId) -> impl Future<Output = Result<(), ApiError>> + Send;
}
