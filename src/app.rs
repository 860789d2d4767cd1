//! Application wiring and command dispatch for fetchdesk
//!
//! `AppContext` owns the long-lived pieces (the fetch orchestrator, the cache
//! snapshot location and the todo store) and runs one parsed command against
//! them, writing human-readable output to the given writer.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::cache::CacheManager;
use crate::cli::{CacheAction, CliError, Command, StartupConfig, TodoAction};
use crate::clock::{Clock, SystemClock};
use crate::data::{find_user, search_users, FetchError, HttpRecordSource, RecordSource};
use crate::orchestrator::{FetchOrchestrator, SNAPSHOT_NAME};
use crate::random::ThreadRandom;
use crate::render;
use crate::todo::{FileStore, KeyValueStore, TodoError, TodoList};

/// Top-level error for a command run
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Cli(#[from] CliError),

    #[error("{0}. Check your connection and try again, or pass --refresh to bypass the cache")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Todo(#[from] TodoError),

    #[error("No user with id {0}")]
    UnknownUser(u64),

    #[error("Could not determine a data directory; pass --data-dir")]
    NoDataDir,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a command needs to run
pub struct AppContext {
    orchestrator: FetchOrchestrator,
    cache_manager: Option<CacheManager>,
    todo_store: Option<Arc<dyn KeyValueStore>>,
    clock: Arc<dyn Clock>,
}

impl AppContext {
    /// Builds the production context from startup configuration
    ///
    /// The cache snapshot lives in `<data-dir>/cache` when a data directory is
    /// given, otherwise in the XDG cache directory. It is restored here so
    /// fresh entries from an earlier run are served without a request.
    pub fn new(config: &StartupConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let source: Arc<dyn RecordSource> = Arc::new(HttpRecordSource::with_timeout(
            config.api_url.clone(),
            config.request_timeout,
        ));
        let orchestrator =
            FetchOrchestrator::new(source, clock.clone(), Arc::new(ThreadRandom), config.ttl);

        let cache_manager = if config.persist_cache {
            let manager = match &config.data_dir {
                Some(dir) => Some(CacheManager::with_dir(dir.join("cache"))),
                None => CacheManager::new(),
            };
            if manager.is_none() {
                tracing::warn!("no cache directory available, caching for this run only");
            }
            manager
        } else {
            None
        };

        let todo_store: Option<Arc<dyn KeyValueStore>> = match &config.data_dir {
            Some(dir) => Some(Arc::new(FileStore::with_dir(dir.clone()))),
            None => FileStore::new().map(|store| Arc::new(store) as Arc<dyn KeyValueStore>),
        };

        let context = Self::with_parts(orchestrator, cache_manager, todo_store, clock);
        context.restore_cache();
        context
    }

    /// Builds a context from already constructed parts
    pub fn with_parts(
        orchestrator: FetchOrchestrator,
        cache_manager: Option<CacheManager>,
        todo_store: Option<Arc<dyn KeyValueStore>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orchestrator,
            cache_manager,
            todo_store,
            clock,
        }
    }

    pub fn orchestrator(&self) -> &FetchOrchestrator {
        &self.orchestrator
    }

    /// Loads the cache snapshot, if one is configured
    pub fn restore_cache(&self) -> usize {
        self.cache_manager
            .as_ref()
            .map_or(0, |manager| self.orchestrator.restore_from(manager))
    }

    /// Writes the cache snapshot, if one is configured
    ///
    /// A failed write only costs the next run a refetch, so it is logged
    /// rather than returned.
    fn persist_cache(&self) {
        if let Some(manager) = &self.cache_manager {
            if let Err(e) = self.orchestrator.persist_to(manager) {
                tracing::warn!(dir = %manager.dir().display(), error = %e, "failed to write cache snapshot");
            }
        }
    }

    /// Runs one command, writing its output to `out`
    pub async fn run(&self, command: &Command, out: &mut dyn Write) -> Result<(), AppError> {
        match command {
            Command::Users { refresh, search } => self.show_users(*refresh, search.as_deref(), out).await,
            Command::Posts { user_ids, refresh } => self.show_posts(user_ids, *refresh, out).await,
            Command::Cache { action } => self.run_cache(action, out),
            Command::Todo { action } => self.run_todo(action, out),
        }
    }

    async fn show_users(
        &self,
        refresh: bool,
        search: Option<&str>,
        out: &mut dyn Write,
    ) -> Result<(), AppError> {
        let users = self.orchestrator.users(refresh).await?;
        self.persist_cache();

        let shown = match search {
            Some(query) => search_users(&users, query),
            None => users.iter().collect(),
        };
        render::render_users(out, &shown)?;
        Ok(())
    }

    /// Shows posts per user; ids are checked against the user list first
    async fn show_posts(
        &self,
        user_ids: &[u64],
        refresh: bool,
        out: &mut dyn Write,
    ) -> Result<(), AppError> {
        let users = self.orchestrator.users(false).await?;
        if let Some(&missing) = user_ids.iter().find(|&&id| find_user(&users, id).is_none()) {
            self.persist_cache();
            return Err(AppError::UnknownUser(missing));
        }

        let results = self.orchestrator.load_posts_for(user_ids, refresh).await;
        self.persist_cache();

        let mut first_error = None;
        for (user_id, result) in results {
            match result {
                Ok(posts) => {
                    let name = find_user(&users, user_id)
                        .map(|u| u.display_name.as_str())
                        .unwrap_or_default();
                    let heading = format!("{}'s posts ({})", name, posts.len());
                    render::render_posts(out, &heading, &posts)?;
                }
                Err(e) => {
                    writeln!(out, "== Posts for user {} failed to load ==", user_id)?;
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn run_cache(&self, action: &CacheAction, out: &mut dyn Write) -> Result<(), AppError> {
        match action {
            CacheAction::Stats => {
                render::render_cache_stats(out, &self.orchestrator.cache_stats())?;
            }
            CacheAction::Clear => {
                self.orchestrator.clear_cache();
                if let Some(manager) = &self.cache_manager {
                    manager.remove_snapshot(SNAPSHOT_NAME)?;
                }
                writeln!(out, "Cache cleared")?;
            }
        }
        Ok(())
    }

    fn open_todos(&self) -> Result<TodoList, AppError> {
        let store = self.todo_store.clone().ok_or(AppError::NoDataDir)?;
        let list = TodoList::open(store, self.clock.clone());
        if let Some(warning) = list.warning() {
            eprintln!("warning: {}", warning);
        }
        Ok(list)
    }

    fn run_todo(&self, action: &TodoAction, out: &mut dyn Write) -> Result<(), AppError> {
        let mut list = self.open_todos()?;

        match action {
            TodoAction::List => {
                render::render_todos(out, list.todos(), list.stats())?;
            }
            TodoAction::Add { text } => {
                let todo = list.add(text)?;
                writeln!(out, "Added todo {}: {}", todo.id, todo.text)?;
            }
            TodoAction::Edit { id, text } => {
                list.edit(*id, text)?;
                writeln!(out, "Updated todo {}", id)?;
            }
            TodoAction::Toggle { id } => {
                let state = if list.toggle(*id)? { "done" } else { "not done" };
                writeln!(out, "Marked todo {} as {}", id, state)?;
            }
            TodoAction::Remove { id } => {
                let removed = list.remove(*id)?;
                writeln!(out, "Removed todo {}: {}", removed.id, removed.text)?;
            }
            TodoAction::ClearCompleted => {
                let removed = list.clear_completed()?;
                writeln!(out, "Removed {} completed todo(s)", removed)?;
            }
            TodoAction::Export { dir } => {
                let dir = dir.clone().unwrap_or_else(|| PathBuf::from("."));
                let path = list.export_to(&dir).map_err(TodoError::from)?;
                writeln!(out, "Exported {} todo(s) to {}", list.todos().len(), path.display())?;
            }
            TodoAction::Import { file } => {
                let content = fs::read_to_string(file)?;
                let count = list.import_json(&content)?;
                writeln!(out, "Imported {} todo(s)", count)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("orchestrator", &self.orchestrator)
            .field("cache_manager", &self.cache_manager)
            .finish_non_exhaustive()
    }
}
