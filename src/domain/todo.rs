use serde::{Deserialize, Serialize};

pub type TodoId = i64;
pub type UserId = i64;

/// Id carried by the placeholder row while an add is in flight.
pub const PLACEHOLDER_ID: TodoId = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: TodoId,
    pub user_id: UserId,
    pub title: String,
    pub completed: bool,
}

impl Todo {
    pub fn placeholder(user_id: UserId, title: impl Into<String>) -> Self {
        Self {
            id: PLACEHOLDER_ID,
            user_id,
            title: title.into(),
            completed: false,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.id == PLACEHOLDER_ID
    }

    pub fn with_completed(&self, completed: bool) -> Self {
        Self {
            completed,
            ..self.clone()
        }
    }

    pub fn with_title(&self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..self.clone()
        }
    }
}

/// Body of `POST /todos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTodo {
    pub user_id: UserId,
    pub title: String,
    pub completed: bool,
}

impl NewTodo {
    pub fn new(user_id: UserId, title: impl Into<String>) -> Self {
        Self {
            user_id,
            title: title.into(),
            completed: false,
        }
    }
}
