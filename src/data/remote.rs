//! REST API client for user and post records
//!
//! Fetches collections from a JSONPlaceholder-style API and validates that the
//! body is an array of records before handing it on.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use super::{Post, User};

/// Default base URL for the record API
pub const DEFAULT_API_URL: &str = "https://jsonplaceholder.typicode.com";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when fetching records
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not complete or returned a non-success status
    #[error("Network error{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Network {
        status: Option<u16>,
        message: String,
    },

    /// The body was not valid JSON
    #[error("Failed to parse JSON response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The body parsed but did not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Network {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

impl FetchError {
    /// HTTP status carried by a network failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Network { status, .. } => *status,
            _ => None,
        }
    }
}

/// A kind of remote collection and its cache identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Every user
    Users,
    /// Posts written by one user
    UserPosts(u64),
}

impl Resource {
    /// Key under which the enriched collection is cached
    pub fn cache_key(&self) -> String {
        match self {
            Resource::Users => "users".to_string(),
            Resource::UserPosts(user_id) => format!("posts_{}", user_id),
        }
    }

    /// Endpoint URL for this resource under `base_url`
    pub fn endpoint(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            Resource::Users => format!("{}/users", base),
            Resource::UserPosts(user_id) => format!("{}/posts?userId={}", base, user_id),
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Users => write!(f, "users"),
            Resource::UserPosts(user_id) => write!(f, "posts of user {}", user_id),
        }
    }
}

/// Source of raw record collections
///
/// Implemented over HTTP by `HttpRecordSource`; tests substitute fakes.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetches every user record
    async fn fetch_users(&self) -> Result<Vec<User>, FetchError>;

    /// Fetches the posts written by `user_id`
    async fn fetch_user_posts(&self, user_id: u64) -> Result<Vec<Post>, FetchError>;
}

/// Record source backed by a REST API
#[derive(Debug, Clone)]
pub struct HttpRecordSource {
    client: Client,
    base_url: String,
}

impl Default for HttpRecordSource {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl HttpRecordSource {
    /// Creates a source for `base_url` with the default timeout
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Creates a source for `base_url` whose requests give up after `timeout`
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(client, base_url)
    }

    /// Creates a source using a preconfigured HTTP client
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Base URL requests are issued against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issues a GET and returns the body as a list of records
    async fn fetch_collection<T: DeserializeOwned>(
        &self,
        resource: Resource,
    ) -> Result<Vec<T>, FetchError> {
        let url = resource.endpoint(&self.base_url);
        tracing::debug!(%url, "requesting {}", resource);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Network {
                status: Some(status.as_u16()),
                message: format!(
                    "request for {} failed: {}",
                    resource,
                    status.canonical_reason().unwrap_or("unknown status")
                ),
            });
        }

        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text)?;
        parse_collection(body)
    }
}

#[async_trait]
impl RecordSource for HttpRecordSource {
    async fn fetch_users(&self) -> Result<Vec<User>, FetchError> {
        self.fetch_collection(Resource::Users).await
    }

    async fn fetch_user_posts(&self, user_id: u64) -> Result<Vec<Post>, FetchError> {
        self.fetch_collection(Resource::UserPosts(user_id)).await
    }
}

/// Checks that `body` is an array and decodes each element as a record
pub fn parse_collection<T: DeserializeOwned>(body: Value) -> Result<Vec<T>, FetchError> {
    let items = match body {
        Value::Array(items) => items,
        other => {
            return Err(FetchError::MalformedResponse(format!(
                "expected an array of records, got {}",
                json_kind(&other)
            )));
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            if !item.is_object() {
                return Err(FetchError::MalformedResponse(format!(
                    "element {} is {}, not a record",
                    i,
                    json_kind(&item)
                )));
            }
            serde_json::from_value(item).map_err(|e| {
                FetchError::MalformedResponse(format!("element {} is not a valid record: {}", i, e))
            })
        })
        .collect()
}

/// Short description of a JSON value's type
fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
