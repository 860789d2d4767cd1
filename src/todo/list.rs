//! Todo list operations
//!
//! Every mutation validates first and leaves the list untouched when input is
//! rejected. Accepted changes are saved right away; if saving fails the error
//! is returned but the in-memory change is kept.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::store::KeyValueStore;
use super::{StorageError, Todo, TodoError, ValidationError};
use crate::clock::Clock;

/// Key the todo collection is stored under
pub const STORAGE_KEY: &str = "todos";

/// Maximum todo text length in characters
pub const MAX_TEXT_CHARS: usize = 100;

/// Counts shown alongside the list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TodoStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

/// Ordered todo collection backed by a key/value store
pub struct TodoList {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    todos: Vec<Todo>,
    warning: Option<String>,
}

impl TodoList {
    /// Loads the list from `store`
    ///
    /// A missing entry gives an empty list. An unreadable or corrupt entry also
    /// gives an empty list, and the problem is kept in `warning()`.
    pub fn open(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let (todos, warning) = match load(store.as_ref()) {
            Ok(todos) => {
                tracing::debug!(count = todos.len(), "loaded todos");
                (todos, None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not load todos, starting with an empty list");
                (Vec::new(), Some(format!("{}; starting with an empty list", e)))
            }
        };

        Self {
            store,
            clock,
            todos,
            warning,
        }
    }

    /// Problem encountered while loading, if any
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    /// Todos in display order, newest first
    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    pub fn get(&self, id: u64) -> Option<&Todo> {
        self.todos.iter().find(|t| t.id == id)
    }

    pub fn stats(&self) -> TodoStats {
        let total = self.todos.len();
        let completed = self.todos.iter().filter(|t| t.completed).count();
        TodoStats {
            total,
            completed,
            pending: total - completed,
        }
    }

    /// Adds a todo at the front of the list
    pub fn add(&mut self, text: &str) -> Result<Todo, TodoError> {
        let text = self.validate_text(text, None)?;
        let todo = Todo {
            id: self.next_id(),
            text,
            completed: false,
            created_at: self.now(),
            completed_at: None,
            updated_at: None,
        };

        self.todos.insert(0, todo.clone());
        tracing::info!(id = todo.id, "added todo");
        self.save()?;
        Ok(todo)
    }

    /// Replaces the text of an existing todo
    pub fn edit(&mut self, id: u64, text: &str) -> Result<(), TodoError> {
        let index = self.index_of(id)?;
        let text = self.validate_text(text, Some(id))?;
        let now = self.now();

        let todo = &mut self.todos[index];
        todo.text = text;
        todo.updated_at = Some(now);
        tracing::info!(id, "edited todo");
        self.save()?;
        Ok(())
    }

    /// Flips the completed flag; returns the new state
    pub fn toggle(&mut self, id: u64) -> Result<bool, TodoError> {
        let index = self.index_of(id)?;
        let now = self.now();

        let todo = &mut self.todos[index];
        todo.completed = !todo.completed;
        todo.completed_at = todo.completed.then_some(now);
        let completed = todo.completed;
        tracing::info!(id, completed, "toggled todo");
        self.save()?;
        Ok(completed)
    }

    /// Removes a todo and returns it
    pub fn remove(&mut self, id: u64) -> Result<Todo, TodoError> {
        let index = self.index_of(id)?;
        let removed = self.todos.remove(index);
        tracing::info!(id, "removed todo");
        self.save()?;
        Ok(removed)
    }

    /// Removes every completed todo; returns how many were removed
    pub fn clear_completed(&mut self) -> Result<usize, TodoError> {
        let before = self.todos.len();
        self.todos.retain(|t| !t.completed);
        let removed = before - self.todos.len();
        if removed > 0 {
            tracing::info!(removed, "cleared completed todos");
            self.save()?;
        }
        Ok(removed)
    }

    /// Writes the current list to the store
    pub fn save(&self) -> Result<(), StorageError> {
        let json = serde_json::to_string(&self.todos)?;
        self.store.set(STORAGE_KEY, &json).inspect_err(|e| {
            tracing::error!(error = %e, "failed to save todos");
        })
    }

    /// The list as pretty-printed JSON
    pub fn export_json(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string_pretty(&self.todos)?)
    }

    /// Writes `todos_YYYY-MM-DD.json` into `dir` and returns its path
    pub fn export_to(&self, dir: &Path) -> Result<PathBuf, StorageError> {
        let date = self.now().format("%Y-%m-%d");
        let path = dir.join(format!("todos_{}.json", date));
        fs::create_dir_all(dir)?;
        fs::write(&path, self.export_json()?)?;
        tracing::info!(path = %path.display(), count = self.todos.len(), "exported todos");
        Ok(path)
    }

    /// Replaces the whole list with the todos in `json`
    ///
    /// The document must be a JSON array whose elements are todo records with
    /// distinct ids. On any rejection the current list is kept.
    pub fn import_json(&mut self, json: &str) -> Result<usize, TodoError> {
        let todos = parse_import(json)?;
        let count = todos.len();
        self.todos = todos;
        tracing::info!(count, "imported todos");
        self.save()?;
        Ok(count)
    }

    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.clock.now_millis()).unwrap_or_default()
    }

    /// Millisecond timestamp, bumped past the largest existing id
    ///
    /// When the largest id is `u64::MAX` the smallest unused id is taken instead.
    fn next_id(&self) -> u64 {
        let now = u64::try_from(self.clock.now_millis()).unwrap_or(0);
        let max_existing = self.todos.iter().map(|t| t.id).max();
        match max_existing {
            Some(max) if max >= now => max
                .checked_add(1)
                .unwrap_or_else(|| self.smallest_unused_id()),
            _ => now,
        }
    }

    fn smallest_unused_id(&self) -> u64 {
        let used: HashSet<u64> = self.todos.iter().map(|t| t.id).collect();
        (0..).find(|id| !used.contains(id)).unwrap_or_default()
    }

    fn index_of(&self, id: u64) -> Result<usize, ValidationError> {
        self.todos
            .iter()
            .position(|t| t.id == id)
            .ok_or(ValidationError::UnknownId(id))
    }

    /// Trims and checks todo text; `editing` excludes that id from the duplicate check
    fn validate_text(&self, text: &str, editing: Option<u64>) -> Result<String, ValidationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::Empty);
        }

        let len = text.chars().count();
        if len > MAX_TEXT_CHARS {
            return Err(ValidationError::TooLong {
                len,
                max: MAX_TEXT_CHARS,
            });
        }

        let duplicate = self
            .todos
            .iter()
            .any(|t| Some(t.id) != editing && t.text == text);
        if duplicate {
            return Err(ValidationError::Duplicate(text.to_string()));
        }

        Ok(text.to_string())
    }
}

impl std::fmt::Debug for TodoList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoList")
            .field("todos", &self.todos)
            .field("warning", &self.warning)
            .finish_non_exhaustive()
    }
}

fn load(store: &dyn KeyValueStore) -> Result<Vec<Todo>, StorageError> {
    match store.get(STORAGE_KEY)? {
        Some(content) => {
            serde_json::from_str(&content).map_err(|e| StorageError::Corrupt(e.to_string()))
        }
        None => Ok(Vec::new()),
    }
}

fn parse_import(json: &str) -> Result<Vec<Todo>, ValidationError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| ValidationError::InvalidJson(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(ValidationError::NotAnArray);
    };

    let mut seen = HashSet::new();
    let mut todos = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let todo: Todo = serde_json::from_value(item).map_err(|e| ValidationError::InvalidRecord {
            index,
            reason: e.to_string(),
        })?;
        if !seen.insert(todo.id) {
            return Err(ValidationError::InvalidRecord {
                index,
                reason: format!("duplicate id {}", todo.id),
            });
        }
        todos.push(todo);
    }
    Ok(todos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::todo::MemoryStore;
    use tempfile::TempDir;

    const START_MILLIS: i64 = 1_720_000_000_000;

    /// Store whose writes always fail
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Io(std::io::Error::other("disk unavailable")))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::other("disk unavailable")))
        }
    }

    fn create_test_list() -> (TodoList, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(START_MILLIS));
        let list = TodoList::open(store.clone(), clock.clone());
        (list, store, clock)
    }

    fn stored(store: &MemoryStore) -> Vec<Todo> {
        let json = store.get(STORAGE_KEY).unwrap().expect("todos should be saved");
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_open_empty_store() {
        let (list, _store, _clock) = create_test_list();
        assert!(list.todos().is_empty());
        assert!(list.warning().is_none());
    }

    #[test]
    fn test_open_corrupt_store_is_empty_with_warning() {
        let store = Arc::new(MemoryStore::with_value(STORAGE_KEY, "{ not json"));
        let list = TodoList::open(store, Arc::new(ManualClock::new(START_MILLIS)));

        assert!(list.todos().is_empty());
        assert!(list.warning().is_some_and(|w| w.contains("unreadable")));
    }

    #[test]
    fn test_open_failing_store_is_empty_with_warning() {
        let list = TodoList::open(Arc::new(BrokenStore), Arc::new(ManualClock::new(START_MILLIS)));
        assert!(list.todos().is_empty());
        assert!(list.warning().is_some());
    }

    #[test]
    fn test_add_trims_prepends_and_saves() {
        let (mut list, store, clock) = create_test_list();

        let first = list.add("  buy milk  ").expect("add should succeed");
        clock.advance(5);
        let second = list.add("walk dog").expect("add should succeed");

        assert_eq!(first.text, "buy milk");
        assert_eq!(first.id, START_MILLIS as u64);
        assert_eq!(second.id, START_MILLIS as u64 + 5);
        assert_eq!(list.todos()[0].text, "walk dog");
        assert_eq!(list.todos()[1].text, "buy milk");
        assert!(!first.completed);
        assert_eq!(first.created_at.timestamp_millis(), START_MILLIS);
        assert_eq!(stored(&store), list.todos());
    }

    #[test]
    fn test_ids_stay_unique_when_clock_does_not_move() {
        let (mut list, _store, _clock) = create_test_list();
        let a = list.add("a").unwrap();
        let b = list.add("b").unwrap();
        assert_ne!(a.id, b.id);
        assert!(b.id > a.id);
    }

    #[test]
    fn test_add_after_importing_max_id_does_not_overflow() {
        let (mut list, _store, _clock) = create_test_list();
        list.import_json(r#"[{"id": 18446744073709551615, "text": "max"}, {"id": 0, "text": "zero"}]"#)
            .expect("import should succeed");

        let added = list.add("next").expect("add should succeed");

        assert_eq!(added.id, 1);
        assert_eq!(list.todos().len(), 3);
        let ids: HashSet<u64> = list.todos().iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_add_rejects_empty() {
        let (mut list, store, _clock) = create_test_list();

        let err = list.add("   ").unwrap_err();

        assert!(matches!(err, TodoError::Validation(ValidationError::Empty)));
        assert!(list.todos().is_empty());
        assert_eq!(store.get(STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn test_add_rejects_too_long() {
        let (mut list, _store, _clock) = create_test_list();

        assert!(list.add(&"x".repeat(MAX_TEXT_CHARS)).is_ok());
        let err = list.add(&"y".repeat(MAX_TEXT_CHARS + 1)).unwrap_err();

        assert!(matches!(
            err,
            TodoError::Validation(ValidationError::TooLong { len: 101, max: 100 })
        ));
        assert_eq!(list.todos().len(), 1);
    }

    #[test]
    fn test_add_rejects_duplicate() {
        let (mut list, _store, _clock) = create_test_list();
        list.add("buy milk").unwrap();

        let err = list.add(" buy milk ").unwrap_err();

        assert!(matches!(err, TodoError::Validation(ValidationError::Duplicate(_))));
        assert_eq!(list.todos().len(), 1);
    }

    #[test]
    fn test_edit_updates_text_and_timestamp() {
        let (mut list, store, clock) = create_test_list();
        let todo = list.add("draft").unwrap();
        clock.advance(1_000);

        list.edit(todo.id, "final").expect("edit should succeed");

        let edited = list.get(todo.id).unwrap();
        assert_eq!(edited.text, "final");
        assert_eq!(
            edited.updated_at.map(|t| t.timestamp_millis()),
            Some(START_MILLIS + 1_000)
        );
        assert_eq!(stored(&store)[0].text, "final");
    }

    #[test]
    fn test_edit_same_text_is_not_duplicate() {
        let (mut list, _store, _clock) = create_test_list();
        let todo = list.add("same").unwrap();
        assert!(list.edit(todo.id, "same").is_ok());
    }

    #[test]
    fn test_edit_rejects_other_duplicate_and_unknown_id() {
        let (mut list, _store, _clock) = create_test_list();
        let a = list.add("a").unwrap();
        list.add("b").unwrap();

        assert!(matches!(
            list.edit(a.id, "b"),
            Err(TodoError::Validation(ValidationError::Duplicate(_)))
        ));
        assert!(matches!(
            list.edit(42, "c"),
            Err(TodoError::Validation(ValidationError::UnknownId(42)))
        ));
        assert_eq!(list.get(a.id).unwrap().text, "a");
    }

    #[test]
    fn test_toggle_sets_and_clears_completed_at() {
        let (mut list, _store, _clock) = create_test_list();
        let todo = list.add("task").unwrap();

        assert!(list.toggle(todo.id).unwrap());
        assert!(list.get(todo.id).unwrap().completed_at.is_some());

        assert!(!list.toggle(todo.id).unwrap());
        assert!(list.get(todo.id).unwrap().completed_at.is_none());
    }

    #[test]
    fn test_remove_and_clear_completed() {
        let (mut list, store, clock) = create_test_list();
        let a = list.add("a").unwrap();
        clock.advance(1);
        let b = list.add("b").unwrap();
        clock.advance(1);
        let c = list.add("c").unwrap();

        list.toggle(a.id).unwrap();
        list.toggle(c.id).unwrap();
        assert_eq!(
            list.stats(),
            TodoStats {
                total: 3,
                completed: 2,
                pending: 1
            }
        );

        assert_eq!(list.clear_completed().unwrap(), 2);
        assert_eq!(list.clear_completed().unwrap(), 0);
        assert_eq!(list.todos().len(), 1);

        let removed = list.remove(b.id).unwrap();
        assert_eq!(removed.text, "b");
        assert!(list.todos().is_empty());
        assert!(stored(&store).is_empty());
        assert!(matches!(
            list.remove(b.id),
            Err(TodoError::Validation(ValidationError::UnknownId(_)))
        ));
    }

    #[test]
    fn test_save_failure_keeps_in_memory_change() {
        let mut list = TodoList::open(Arc::new(BrokenStore), Arc::new(ManualClock::new(START_MILLIS)));

        let err = list.add("kept anyway").unwrap_err();

        assert!(matches!(err, TodoError::Storage(StorageError::Io(_))));
        assert_eq!(list.todos().len(), 1);
        assert_eq!(list.todos()[0].text, "kept anyway");
    }

    #[test]
    fn test_import_replaces_collection() {
        let (mut list, store, _clock) = create_test_list();
        list.add("old").unwrap();

        let json = r#"[
            {"id": 1, "text": "imported one", "completed": true, "created_at": "2024-01-01T00:00:00Z"},
            {"id": 2, "text": "imported two"}
        ]"#;
        let count = list.import_json(json).expect("import should succeed");

        assert_eq!(count, 2);
        assert_eq!(list.todos().len(), 2);
        assert_eq!(list.todos()[0].text, "imported one");
        assert!(list.todos()[0].completed);
        assert!(!list.todos()[1].completed);
        assert_eq!(stored(&store).len(), 2);
    }

    #[test]
    fn test_import_non_array_is_rejected_and_list_untouched() {
        let (mut list, store, _clock) = create_test_list();
        list.add("keep me").unwrap();
        let before = list.todos().to_vec();

        let err = list.import_json(r#"{"id": 1, "text": "object"}"#).unwrap_err();

        assert!(matches!(err, TodoError::Validation(ValidationError::NotAnArray)));
        assert_eq!(list.todos(), before.as_slice());
        assert_eq!(stored(&store), before);
    }

    #[test]
    fn test_import_invalid_json_and_records_are_rejected() {
        let (mut list, _store, _clock) = create_test_list();
        list.add("keep me").unwrap();

        assert!(matches!(
            list.import_json("not json"),
            Err(TodoError::Validation(ValidationError::InvalidJson(_)))
        ));
        assert!(matches!(
            list.import_json(r#"[{"id": 1, "text": "ok"}, {"text": "no id"}]"#),
            Err(TodoError::Validation(ValidationError::InvalidRecord { index: 1, .. }))
        ));
        assert!(matches!(
            list.import_json(r#"[{"id": 1, "text": "a"}, {"id": 1, "text": "b"}]"#),
            Err(TodoError::Validation(ValidationError::InvalidRecord { index: 1, .. }))
        ));
        assert_eq!(list.todos().len(), 1);
        assert_eq!(list.todos()[0].text, "keep me");
    }

    #[test]
    fn test_export_then_import_restores_list() {
        let (mut list, _store, _clock) = create_test_list();
        list.add("one").unwrap();
        list.add("two").unwrap();
        let exported = list.export_json().unwrap();

        let (mut other, _store, _clock) = create_test_list();
        other.import_json(&exported).unwrap();

        assert_eq!(other.todos(), list.todos());
    }

    #[test]
    fn test_export_to_writes_dated_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let (mut list, _store, _clock) = create_test_list();
        list.add("exported").unwrap();

        let path = list.export_to(temp_dir.path()).expect("export should succeed");

        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "todos_2024-07-03.json"
        );
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"exported\""));
    }
}
