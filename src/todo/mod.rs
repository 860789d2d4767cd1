//! Persisted todo list
//!
//! A small ordered list of todo items kept in a `KeyValueStore`, with input
//! validation and JSON import/export.

mod list;
mod store;

pub use list::{TodoList, TodoStats, MAX_TEXT_CHARS, STORAGE_KEY};
pub use store::{FileStore, KeyValueStore, MemoryStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single todo item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: u64,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// User input that was rejected before any change was made
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Todo text cannot be empty")]
    Empty,

    #[error("Todo text is {len} characters long; the limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("A todo with text '{0}' already exists")]
    Duplicate(String),

    #[error("No todo with id {0}")]
    UnknownId(u64),

    #[error("Import must be a JSON array of todos")]
    NotAnArray,

    #[error("Import is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Import element {index} is not a valid todo: {reason}")]
    InvalidRecord { index: usize, reason: String },
}

/// Failure reading or writing persisted todos
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize todos: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Stored todos are unreadable: {0}")]
    Corrupt(String),
}

/// Errors returned by todo list operations
#[derive(Debug, Error)]
pub enum TodoError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
