use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use anyhow::{Result, anyhow};
use futures::future::join_all;
use tokio::runtime::Runtime;
use tokio::task::JoinError;
use tracing::{debug, warn};

use super::request::{Outcome, Request};
use crate::repo::{ApiError, TodoRepository};

/// Runs requests against the repository in the background and hands their
/// outcomes back to the UI thread.
pub struct Dispatcher<R: TodoRepository> {
    runtime: Runtime,
    repo: Arc<R>,
    tx: Sender<Outcome>,
    rx: Receiver<Outcome>,
}

impl<R: TodoRepository> Dispatcher<R> {
    pub fn new(repo: R) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| anyhow!("failed to build tokio runtime: {e}"))?;
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            runtime,
            repo: Arc::new(repo),
            tx,
            rx,
        })
    }

    pub fn submit(&self, request: Request) {
        debug!(request = request.name(), "dispatching");
        let repo = Arc::clone(&self.repo);
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let outcome = execute(repo, request).await;
            if tx.send(outcome).is_err() {
                warn!("outcome dropped: UI loop is gone");
            }
        });
    }

    /// Outcomes that settled since the last call, in settle order.
    pub fn drain(&self) -> Vec<Outcome> {
        self.rx.try_iter().collect()
    }

    #[cfg(test)]
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<Outcome> {
        self.rx.recv_timeout(timeout).ok()
    }
}

async fn execute<R: TodoRepository>(repo: Arc<R>, request: Request) -> Outcome {
    match request {
        Request::Load { user_id } => Outcome::Loaded(repo.list(user_id).await),
        Request::Add(draft) => Outcome::Added(repo.create(draft).await),
        Request::Update { todo, kind } => {
            let id = todo.id;
            Outcome::Updated {
                id,
                kind,
                result: repo.update(todo).await,
            }
        }
        Request::Delete { id } => Outcome::Deleted {
            id,
            result: repo.delete(id).await,
        },
        Request::UpdateMany(todos) => {
            let handles: Vec<_> = todos
                .iter()
                .cloned()
                .map(|todo| {
                    let repo = Arc::clone(&repo);
                    tokio::spawn(async move { repo.update(todo).await })
                })
                .collect();
            let results = join_all(handles).await.into_iter().map(settle);
            Outcome::UpdatedMany(todos.into_iter().zip(results).collect())
        }
        Request::DeleteMany(ids) => {
            let handles: Vec<_> = ids
                .iter()
                .map(|&id| {
                    let repo = Arc::clone(&repo);
                    tokio::spawn(async move { repo.delete(id).await })
                })
                .collect();
            let results = join_all(handles).await.into_iter().map(settle);
            Outcome::DeletedMany(ids.into_iter().zip(results).collect())
        }
    }
}

fn settle<T>(joined: Result<Result<T, ApiError>, JoinError>) -> Result<T, ApiError> {
    joined.unwrap_or_else(|e| Err(ApiError::Task(e.to_string())))
}
