use std::collections::HashMap;
use std::time::Instant;

use tracing::{info, warn};

use crate::domain::filter::Filter;
use crate::domain::notice::{ErrorBanner, ErrorMessage};
use crate::domain::todo::{NewTodo, Todo, TodoId, UserId};
use crate::repo::ApiError;
use crate::usecase::request::{Outcome, Request, UpdateKind, partition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Adding,
    Editing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditState {
    pub id: TodoId,
    pub draft: String,
}

/// Root UI state. Intents return the [`Request`] to send, if any; settled
/// requests come back through [`App::apply`].
pub struct App {
    pub user_id: UserId,
    pub todos: Vec<Todo>,
    pub filter: Filter,
    pub query: String,
    pub mode: InputMode,
    pub input_loading: bool,
    pub temp_todo: Option<Todo>,
    pub editing: Option<EditState>,
    pub banner: ErrorBanner,
    pub selected: usize,
    // in-flight request count per row
    pending: HashMap<TodoId, usize>,
}

impl App {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            todos: Vec::new(),
            filter: Filter::All,
            query: String::new(),
            mode: InputMode::Normal,
            input_loading: false,
            temp_todo: None,
            editing: None,
            banner: ErrorBanner::default(),
            selected: 0,
            pending: HashMap::new(),
        }
    }

    pub fn load(&self) -> Request {
        Request::Load {
            user_id: self.user_id,
        }
    }

    // ---- derived state ----

    /// Filtered collection, followed by the placeholder of an add in flight.
    pub fn visible(&self) -> Vec<&Todo> {
        let mut rows = self.filter.apply(&self.todos);
        if let Some(temp) = self.temp_todo.as_ref() {
            rows.push(temp);
        }
        rows
    }

    pub fn active_count(&self) -> usize {
        self.todos.iter().filter(|t| !t.completed).count()
    }

    pub fn completed_count(&self) -> usize {
        self.todos.len() - self.active_count()
    }

    pub fn all_completed(&self) -> bool {
        !self.todos.is_empty() && self.todos.iter().all(|t| t.completed)
    }

    pub fn is_loading(&self, todo: &Todo) -> bool {
        if todo.is_placeholder() {
            return self.input_loading;
        }
        self.pending.contains_key(&todo.id)
    }

    pub fn selected_todo(&self) -> Option<&Todo> {
        self.visible()
            .get(self.selected)
            .copied()
            .filter(|t| !t.is_placeholder())
    }

    fn find(&self, id: TodoId) -> Option<&Todo> {
        self.todos.iter().find(|t| t.id == id)
    }

    // ---- navigation ----

    pub fn select_next(&mut self) {
        let len = self.visible().len();
        if len > 0 {
            self.selected = (self.selected + 1).min(len - 1);
        }
    }

    pub fn select_previous(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let len = self.visible().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    // ---- error banner ----

    pub fn tick(&mut self, now: Instant) {
        self.banner.expire(now);
    }

    pub fn dismiss_error(&mut self) {
        self.banner.dismiss();
    }

    fn fail(&mut self, message: ErrorMessage, err: Option<&ApiError>) {
        match err {
            Some(e) => warn!(error = %e, "{message}"),
            None => info!("{message}"),
        }
        self.banner.raise(message, Instant::now());
    }

    // ---- new todo input ----

    pub fn begin_add(&mut self) {
        self.mode = InputMode::Adding;
    }

    pub fn leave_input(&mut self) {
        self.mode = InputMode::Normal;
    }

    pub fn push_query(&mut self, c: char) {
        if !self.input_loading {
            self.query.push(c);
        }
    }

    pub fn pop_query(&mut self) {
        if !self.input_loading {
            self.query.pop();
        }
    }

    pub fn submit_new(&mut self) -> Option<Request> {
        if self.input_loading {
            return None;
        }
        let title = self.query.trim();
        if title.is_empty() {
            self.fail(ErrorMessage::TitleShouldNotBeEmpty, None);
            return None;
        }
        let title = title.to_string();
        self.input_loading = true;
        self.temp_todo = Some(Todo::placeholder(self.user_id, title.clone()));
        Some(Request::Add(NewTodo::new(self.user_id, title)))
    }

    // ---- single row ----

    pub fn toggle(&mut self, id: TodoId) -> Option<Request> {
        let todo = self.find(id)?.clone();
        self.begin_pending(id);
        Some(Request::Update {
            todo: todo.with_completed(!todo.completed),
            kind: UpdateKind::Toggle,
        })
    }

    pub fn delete(&mut self, id: TodoId) -> Option<Request> {
        self.find(id)?;
        self.begin_pending(id);
        Some(Request::Delete { id })
    }

    pub fn begin_edit(&mut self, id: TodoId) {
        if let Some(todo) = self.find(id) {
            self.editing = Some(EditState {
                id,
                draft: todo.title.clone(),
            });
            self.mode = InputMode::Editing;
        }
    }

    pub fn push_draft(&mut self, c: char) {
        if let Some(edit) = self.editing.as_mut() {
            edit.draft.push(c);
        }
    }

    pub fn pop_draft(&mut self) {
        if let Some(edit) = self.editing.as_mut() {
            edit.draft.pop();
        }
    }

    pub fn cancel_edit(&mut self) {
        self.close_editor();
    }

    /// Commits the editor: unchanged titles close it, empty titles delete the
    /// row, anything else is sent as a rename. The editor stays open until
    /// the server confirms.
    pub fn commit_edit(&mut self) -> Option<Request> {
        let edit = self.editing.clone()?;
        let Some(todo) = self.find(edit.id).cloned() else {
            self.close_editor();
            return None;
        };
        let title = edit.draft.trim();
        if title == todo.title {
            self.close_editor();
            return None;
        }
        if title.is_empty() {
            return self.delete(todo.id);
        }
        self.begin_pending(todo.id);
        Some(Request::Update {
            todo: todo.with_title(title),
            kind: UpdateKind::Rename,
        })
    }

    fn close_editor(&mut self) {
        self.editing = None;
        if self.mode == InputMode::Editing {
            self.mode = InputMode::Normal;
        }
    }

    // ---- bulk ----

    /// Completes every active todo, or reactivates all when all are done.
    /// Applied optimistically; failed items are reverted when results land.
    pub fn toggle_all(&mut self) -> Option<Request> {
        if self.todos.is_empty() {
            return None;
        }
        let target = !self.all_completed();
        let batch: Vec<Todo> = self
            .todos
            .iter()
            .filter(|t| t.completed != target)
            .map(|t| t.with_completed(target))
            .collect();
        for todo in &batch {
            self.replace(todo.clone());
            self.begin_pending(todo.id);
        }
        self.clamp_selection();
        Some(Request::UpdateMany(batch))
    }

    pub fn clear_completed(&mut self) -> Option<Request> {
        let ids: Vec<TodoId> = self
            .todos
            .iter()
            .filter(|t| t.completed)
            .map(|t| t.id)
            .collect();
        if ids.is_empty() {
            return None;
        }
        for id in &ids {
            self.begin_pending(*id);
        }
        Some(Request::DeleteMany(ids))
    }

    // ---- reconciliation ----

    pub fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Loaded(Ok(todos)) => {
                info!(count = todos.len(), "todos loaded");
                self.todos = todos;
            }
            Outcome::Loaded(Err(e)) => self.fail(ErrorMessage::UnableToLoad, Some(&e)),
            Outcome::Added(result) => {
                match result {
                    Ok(todo) => {
                        let shown = self.filter.matches(&todo);
                        self.todos.push(todo);
                        self.query.clear();
                        if shown {
                            self.selected = self.filter.apply(&self.todos).len() - 1;
                        }
                    }
                    Err(e) => self.fail(ErrorMessage::UnableToAdd, Some(&e)),
                }
                self.input_loading = false;
                self.temp_todo = None;
            }
            Outcome::Updated { id, kind, result } => {
                self.end_pending(id);
                match result {
                    Ok(todo) => {
                        self.replace(todo);
                        if kind == UpdateKind::Rename && self.is_editing(id) {
                            self.close_editor();
                        }
                    }
                    Err(e) => self.fail(ErrorMessage::UnableToUpdate, Some(&e)),
                }
            }
            Outcome::Deleted { id, result } => {
                self.end_pending(id);
                match result {
                    Ok(()) => self.remove(id),
                    Err(e) => self.fail(ErrorMessage::UnableToDelete, Some(&e)),
                }
            }
            Outcome::UpdatedMany(results) => {
                let outcome = partition(results);
                let failed = outcome.has_failures();
                for (sent, todo) in outcome.succeeded {
                    self.end_pending(sent.id);
                    self.replace(todo);
                }
                for (sent, e) in &outcome.failed {
                    self.end_pending(sent.id);
                    warn!(id = sent.id, error = %e, "toggle-all item failed, reverting");
                    if let Some(current) = self.todos.iter_mut().find(|t| t.id == sent.id) {
                        current.completed = !sent.completed;
                    }
                }
                if failed {
                    self.fail(ErrorMessage::UnableToUpdate, None);
                }
            }
            Outcome::DeletedMany(results) => {
                let outcome = partition(results);
                let failed = outcome.has_failures();
                for (id, ()) in outcome.succeeded {
                    self.end_pending(id);
                    self.remove(id);
                }
                for (id, e) in &outcome.failed {
                    self.end_pending(*id);
                    warn!(id, error = %e, "clear-completed item failed");
                }
                if failed {
                    self.fail(ErrorMessage::UnableToDelete, None);
                }
            }
        }
        self.clamp_selection();
    }

    fn is_editing(&self, id: TodoId) -> bool {
        self.editing.as_ref().is_some_and(|e| e.id == id)
    }

    fn replace(&mut self, todo: Todo) {
        if let Some(slot) = self.todos.iter_mut().find(|t| t.id == todo.id) {
            *slot = todo;
        }
    }

    fn remove(&mut self, id: TodoId) {
        self.todos.retain(|t| t.id != id);
        if self.is_editing(id) {
            self.close_editor();
        }
    }

    fn begin_pending(&mut self, id: TodoId) {
        *self.pending.entry(id).or_insert(0) += 1;
    }

    fn end_pending(&mut self, id: TodoId) {
        if let Some(count) = self.pending.get_mut(&id) {
            *count -= 1;
            if *count == 0 {
                self.pending.remove(&id);
            }
        }
    }
}
