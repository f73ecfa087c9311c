use std::collections::HashSet;
use std::sync::Mutex;

use super::{ApiError, TodoRepository};
use crate::domain::todo::{NewTodo, Todo, TodoId, UserId};

#[derive(Default)]
struct State {
    next_id: TodoId,
    items: Vec<Todo>,
    failing: HashSet<TodoId>,
    fail_list: bool,
    fail_create: bool,
}

/// In-process stand-in for the remote service, used by `--demo`.
///
/// Tests can mark ids as failing so every update or delete of them returns
/// a 500, to exercise partial failures of bulk operations.
#[derive(Default)]
pub struct InMemoryTodoRepo {
    state: Mutex<State>,
}

impl InMemoryTodoRepo {
    pub fn with_seed(seed: impl IntoIterator<Item = Todo>) -> Self {
        let repo = Self::default();
        {
            let mut state = repo.lock();
            state.items.extend(seed);
            state.next_id = state.items.iter().map(|t| t.id).max().unwrap_or(0);
        }
        repo
    }

    #[cfg(test)]
    pub fn fail_on(&self, id: TodoId) {
        self.lock().failing.insert(id);
    }

    #[cfg(test)]
    pub fn fail_list(&self) {
        self.lock().fail_list = true;
    }

    #[cfg(test)]
    pub fn fail_create(&self) {
        self.lock().fail_create = true;
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> Vec<Todo> {
        self.lock().items.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn injected(what: &str) -> ApiError {
    ApiError::Status {
        status: 500,
        body: format!("injected {what} failure"),
    }
}

impl TodoRepository for InMemoryTodoRepo {
    async fn list(&self, user_id: UserId) -> Result<Vec<Todo>, ApiError> {
        let state = self.lock();
        if state.fail_list {
            return Err(injected("list"));
        }
        Ok(state
            .items
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create(&self, draft: NewTodo) -> Result<Todo, ApiError> {
        let mut state = self.lock();
        if state.fail_create {
            return Err(injected("create"));
        }
        state.next_id += 1;
        let todo = Todo {
            id: state.next_id,
            user_id: draft.user_id,
            title: draft.title,
            completed: draft.completed,
        };
        state.items.push(todo.clone());
        Ok(todo)
    }

    async fn update(&self, todo: Todo) -> Result<Todo, ApiError> {
        let mut state = self.lock();
        if state.failing.contains(&todo.id) {
            return Err(injected("update"));
        }
        let existing = state
            .items
            .iter_mut()
            .find(|t| t.id == todo.id)
            .ok_or(ApiError::NotFound(todo.id))?;
        existing.title = todo.title;
        existing.completed = todo.completed;
        Ok(existing.clone())
    }

    async fn delete(&self, id: TodoId) -> Result<(), ApiError> {
        let mut state = self.lock();
        if state.failing.contains(&id) {
            return Err(injected("delete"));
        }
        let pos = state
            .items
            .iter()
            .position(|t| t.id == id)
            .ok_or(ApiError::NotFound(id))?;
        state.items.remove(pos);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(f)
    }

    #[test]
    fn ids_continue_after_seed() {
        let repo = InMemoryTodoRepo::with_seed([Todo {
            id: 10,
            user_id: 1,
            title: "seeded".to_string(),
            completed: false,
        }]);
        let created = block_on(repo.create(NewTodo::new(1, "next"))).unwrap();
        assert_eq!(created.id, 11);
        assert_eq!(repo.snapshot().len(), 2);
    }

    #[test]
    fn failing_ids_reject_update_and_delete() {
        let repo = InMemoryTodoRepo::default();
        let todo = block_on(repo.create(NewTodo::new(1, "a"))).unwrap();
        repo.fail_on(todo.id);

        assert!(block_on(repo.update(todo.with_completed(true))).is_err());
        assert!(block_on(repo.delete(todo.id)).is_err());
        assert_eq!(repo.snapshot(), vec![todo]);
    }

    #[test]
    fn list_is_scoped_to_user() {
        let repo = InMemoryTodoRepo::default();
        block_on(repo.create(NewTodo::new(1, "mine"))).unwrap();
        block_on(repo.create(NewTodo::new(2, "theirs"))).unwrap();
        let mine = block_on(repo.list(1)).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "mine");
    }
}
