use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use super::{ApiError, TodoRepository};
use crate::domain::todo::{NewTodo, Todo, TodoId, UserId};

/// Client for the remote `/todos` REST resource.
#[derive(Debug, Clone)]
pub struct HttpTodoRepo {
    client: Client,
    base_url: String,
}

impl HttpTodoRepo {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to init HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/todos", self.base_url)
    }

    fn item_url(&self, id: TodoId) -> String {
        format!("{}/todos/{id}", self.base_url)
    }
}

impl TodoRepository for HttpTodoRepo {
    async fn list(&self, user_id: UserId) -> Result<Vec<Todo>, ApiError> {
        debug!(user_id, "GET /todos");
        let resp = self
            .client
            .get(self.collection_url())
            .query(&[("userId", user_id)])
            .send()
            .await
            .map_err(transport)?;
        let resp = check_status(resp, None).await?;
        resp.json().await.map_err(decode)
    }

    async fn create(&self, draft: NewTodo) -> Result<Todo, ApiError> {
        debug!(title = %draft.title, "POST /todos");
        let resp = self
            .client
            .post(self.collection_url())
            .json(&draft)
            .send()
            .await
            .map_err(transport)?;
        let resp = check_status(resp, None).await?;
        resp.json().await.map_err(decode)
    }

    async fn update(&self, todo: Todo) -> Result<Todo, ApiError> {
        debug!(id = todo.id, completed = todo.completed, "PATCH /todos/{{id}}");
        let resp = self
            .client
            .patch(self.item_url(todo.id))
            .json(&todo)
            .send()
            .await
            .map_err(transport)?;
        let resp = check_status(resp, Some(todo.id)).await?;
        resp.json().await.map_err(decode)
    }

    async fn delete(&self, id: TodoId) -> Result<(), ApiError> {
        debug!(id, "DELETE /todos/{{id}}");
        let resp = self
            .client
            .delete(self.item_url(id))
            .send()
            .await
            .map_err(transport)?;
        check_status(resp, Some(id)).await?;
        Ok(())
    }
}

async fn check_status(resp: Response, id: Option<TodoId>) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::NOT_FOUND
        && let Some(id) = id
    {
        return Err(ApiError::NotFound(id));
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

fn transport(e: reqwest::Error) -> ApiError {
    ApiError::Transport(e.to_string())
}

fn decode(e: reqwest::Error) -> ApiError {
    ApiError::Decode(e.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::{
        Json, Router,
        extract::{Path, Query, State},
        http::StatusCode,
        routing::{get, patch},
    };

    use super::*;

    /// Id the mock server always answers with a 500.
    const BROKEN_ID: TodoId = 999;

    #[derive(Default)]
    struct Store {
        next_id: TodoId,
        todos: Vec<Todo>,
    }

    type Db = Arc<Mutex<Store>>;

    fn mock_app(db: Db) -> Router {
        Router::new()
            .route("/todos", get(list_todos).post(create_todo))
            .route("/todos/{id}", patch(update_todo).delete(delete_todo))
            .with_state(db)
    }

    async fn list_todos(
        State(db): State<Db>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Vec<Todo>> {
        let user_id: Option<UserId> = params.get("userId").and_then(|v| v.parse().ok());
        let store = db.lock().unwrap();
        Json(
            store
                .todos
                .iter()
                .filter(|t| Some(t.user_id) == user_id)
                .cloned()
                .collect(),
        )
    }

    async fn create_todo(
        State(db): State<Db>,
        Json(draft): Json<NewTodo>,
    ) -> (StatusCode, Json<Todo>) {
        let mut store = db.lock().unwrap();
        store.next_id += 1;
        let todo = Todo {
            id: store.next_id,
            user_id: draft.user_id,
            title: draft.title,
            completed: draft.completed,
        };
        store.todos.push(todo.clone());
        (StatusCode::CREATED, Json(todo))
    }

    async fn update_todo(
        State(db): State<Db>,
        Path(id): Path<TodoId>,
        Json(input): Json<Todo>,
    ) -> Result<Json<Todo>, (StatusCode, String)> {
        if id == BROKEN_ID {
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string()));
        }
        let mut store = db.lock().unwrap();
        let todo = store
            .todos
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or((StatusCode::NOT_FOUND, String::new()))?;
        todo.title = input.title;
        todo.completed = input.completed;
        Ok(Json(todo.clone()))
    }

    async fn delete_todo(State(db): State<Db>, Path(id): Path<TodoId>) -> StatusCode {
        let mut store = db.lock().unwrap();
        let before = store.todos.len();
        store.todos.retain(|t| t.id != id);
        if store.todos.len() < before {
            StatusCode::OK
        } else {
            StatusCode::NOT_FOUND
        }
    }

    async fn spawn_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let db: Db = Arc::new(Mutex::new(Store::default()));
        tokio::spawn(async move { axum::serve(listener, mock_app(db)).await.unwrap() });
        format!("http://{addr}/")
    }

    fn repo(base: &str) -> HttpTodoRepo {
        HttpTodoRepo::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let repo = repo("http://localhost:3000/");
        assert_eq!(repo.collection_url(), "http://localhost:3000/todos");
        assert_eq!(repo.item_url(4), "http://localhost:3000/todos/4");
    }

    #[tokio::test]
    async fn crud_lifecycle_against_mock_server() {
        let base = spawn_server().await;
        let repo = repo(&base);

        assert!(repo.list(1).await.unwrap().is_empty());

        let created = repo.create(NewTodo::new(1, "Write tests")).await.unwrap();
        assert_eq!(created.title, "Write tests");
        assert!(created.id > 0);
        repo.create(NewTodo::new(2, "Other user")).await.unwrap();

        let listed = repo.list(1).await.unwrap();
        assert_eq!(listed, vec![created.clone()]);

        let updated = repo.update(created.with_completed(true)).await.unwrap();
        assert!(updated.completed);

        repo.delete(created.id).await.unwrap();
        assert!(repo.list(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_todo_maps_to_not_found() {
        let base = spawn_server().await;
        let err = repo(&base).delete(42).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(42)));
    }

    #[tokio::test]
    async fn server_error_keeps_status_and_body() {
        let base = spawn_server().await;
        let todo = Todo {
            id: BROKEN_ID,
            user_id: 1,
            title: "x".to_string(),
            completed: false,
        };
        let err = repo(&base).update(todo).await.unwrap_err();
        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = repo(&format!("http://{addr}")).list(1).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
