//! Command-line interface parsing for fetchdesk
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! a validated `StartupConfig`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::data::remote::DEFAULT_API_URL;

/// Error types for CLI argument parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    /// The API URL is not an absolute http(s) URL
    #[error("Invalid API URL: '{0}'. Expected an absolute http:// or https:// URL")]
    InvalidApiUrl(String),

    /// A zero TTL would make every cached entry stale immediately
    #[error("--ttl-secs must be greater than zero")]
    ZeroTtl,

    /// A zero timeout would fail every request
    #[error("--timeout-secs must be greater than zero")]
    ZeroTimeout,
}

/// fetchdesk - Browse users and posts from a REST API, and keep a local todo list
#[derive(Parser, Debug)]
#[command(name = "fetchdesk")]
#[command(about = "Browse users and posts from a REST API with a time-bound cache, and keep a local todo list")]
#[command(version)]
pub struct Cli {
    /// Base URL of the record API
    #[arg(long, global = true, env = "FETCHDESK_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// How long fetched collections stay fresh, in seconds
    #[arg(long, global = true, default_value_t = 300, value_name = "SECS")]
    pub ttl_secs: u64,

    /// Give up on a request after this many seconds
    #[arg(long, global = true, default_value_t = 10, value_name = "SECS")]
    pub timeout_secs: u64,

    /// Keep todos and the cache snapshot in this directory instead of the XDG defaults
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Do not read or write the cache snapshot; cache only for this run
    #[arg(long, global = true)]
    pub no_cache_file: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List users, optionally filtered
    Users {
        /// Bypass the cache and fetch again
        #[arg(long)]
        refresh: bool,

        /// Case-insensitive match on name, username, email or company
        #[arg(short, long, value_name = "QUERY")]
        search: Option<String>,
    },

    /// Show posts written by one or more users
    Posts {
        /// User ids to show posts for
        #[arg(required = true, value_name = "USER_ID")]
        user_ids: Vec<u64>,

        /// Bypass the cache and fetch again
        #[arg(long)]
        refresh: bool,
    },

    /// Inspect or clear the record cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage the local todo list
    Todo {
        #[command(subcommand)]
        action: TodoAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CacheAction {
    /// Show cached keys and an estimated payload size
    Stats,
    /// Drop every cached collection
    Clear,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum TodoAction {
    /// Show all todos
    List,
    /// Add a todo
    Add { text: String },
    /// Change the text of a todo
    Edit { id: u64, text: String },
    /// Mark a todo done, or not done
    Toggle { id: u64 },
    /// Delete a todo
    Remove { id: u64 },
    /// Delete every completed todo
    ClearCompleted,
    /// Write the list to todos_YYYY-MM-DD.json
    Export {
        /// Directory to write into (defaults to the current directory)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
    /// Replace the list with the todos in a JSON file
    Import { file: PathBuf },
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupConfig {
    /// Base URL of the record API, without a trailing slash
    pub api_url: String,
    /// Cache time-to-live
    pub ttl: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Directory override for todos and the cache snapshot
    pub data_dir: Option<PathBuf>,
    /// Whether the cache is read from and written to disk
    pub persist_cache: bool,
    /// Whether debug logging is enabled
    pub verbose: bool,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ttl: crate::cache::DEFAULT_TTL,
            request_timeout: crate::data::remote::DEFAULT_TIMEOUT,
            data_dir: None,
            persist_cache: true,
            verbose: false,
        }
    }
}

/// Checks that `url` is an absolute http(s) URL
///
/// # Returns
/// * `Ok(String)` with any trailing slash removed
/// * `Err(CliError::InvalidApiUrl)` otherwise
pub fn parse_api_url(url: &str) -> Result<String, CliError> {
    let parsed =
        reqwest::Url::parse(url.trim()).map_err(|_| CliError::InvalidApiUrl(url.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.cannot_be_a_base() {
        return Err(CliError::InvalidApiUrl(url.to_string()));
    }
    Ok(url.trim().trim_end_matches('/').to_string())
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with appropriate settings
    /// * `Err(CliError)` if a value is out of range
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.ttl_secs == 0 {
            return Err(CliError::ZeroTtl);
        }
        if cli.timeout_secs == 0 {
            return Err(CliError::ZeroTimeout);
        }

        Ok(StartupConfig {
            api_url: parse_api_url(&cli.api_url)?,
            ttl: Duration::from_secs(cli.ttl_secs),
            request_timeout: Duration::from_secs(cli.timeout_secs),
            data_dir: cli.data_dir.clone(),
            persist_cache: !cli.no_cache_file,
            verbose: cli.verbose,
        })
    }
}
