//! Core data models for fetchdesk
//!
//! This module contains the raw records returned by the REST API, the
//! enriched records handed to the presentation layer, and the helpers that
//! search them.

pub mod enrich;
pub mod remote;

pub use enrich::{enrich_post, enrich_user, Enricher};
pub use remote::{FetchError, HttpRecordSource, RecordSource, Resource};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Field decoders that never reject a present value
///
/// `#[serde(default)]` only covers missing fields. These also map `null` and
/// wrongly typed values to the field default, so one odd field never fails a
/// whole collection.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        })
    }

    pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_u64().unwrap_or_default(),
            Value::String(s) => s.trim().parse().unwrap_or_default(),
            _ => 0,
        })
    }

    /// A nested record, or `None` when the value is not an object
    pub fn record<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(deserializer)?;
        if !value.is_object() {
            return Ok(None);
        }
        Ok(serde_json::from_value(value).ok())
    }
}

/// A user record as returned by `GET /users`
///
/// Every field defaults when missing, `null` or of the wrong type, so that
/// enrichment never has to fail on partial records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    #[serde(deserialize_with = "lenient::id")]
    pub id: u64,
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub username: String,
    #[serde(deserialize_with = "lenient::string")]
    pub email: String,
    #[serde(deserialize_with = "lenient::string")]
    pub phone: String,
    #[serde(deserialize_with = "lenient::string")]
    pub website: String,
    #[serde(deserialize_with = "lenient::record")]
    pub address: Option<Address>,
    #[serde(deserialize_with = "lenient::record")]
    pub company: Option<Company>,
}

/// Postal address of a user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    #[serde(deserialize_with = "lenient::string")]
    pub street: String,
    #[serde(deserialize_with = "lenient::string")]
    pub suite: String,
    #[serde(deserialize_with = "lenient::string")]
    pub city: String,
    #[serde(deserialize_with = "lenient::string")]
    pub zipcode: String,
    #[serde(deserialize_with = "lenient::record")]
    pub geo: Option<Geo>,
}

/// Coordinates, kept as the strings the API sends
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geo {
    #[serde(deserialize_with = "lenient::string")]
    pub lat: String,
    #[serde(deserialize_with = "lenient::string")]
    pub lng: String,
}

/// Employer of a user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Company {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(rename = "catchPhrase", deserialize_with = "lenient::string")]
    pub catch_phrase: String,
    #[serde(deserialize_with = "lenient::string")]
    pub bs: String,
}

/// A post record as returned by `GET /posts?userId=<id>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Post {
    #[serde(deserialize_with = "lenient::id")]
    pub id: u64,
    #[serde(rename = "userId", deserialize_with = "lenient::id")]
    pub user_id: u64,
    #[serde(deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(deserialize_with = "lenient::string")]
    pub body: String,
}

/// A user with derived display fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedUser {
    #[serde(flatten)]
    pub user: User,
    /// Single-line address, or the unknown-address sentinel
    pub full_address: String,
    /// `name`, falling back to `username`
    pub display_name: String,
    /// Avatar image URL derived from the display name
    pub avatar_url: String,
    /// Placeholder presence flag
    pub is_online: bool,
}

/// A post with derived display fields and placeholder engagement data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPost {
    #[serde(flatten)]
    pub post: Post,
    /// Body truncated for list display
    pub excerpt: String,
    /// Estimated reading time at 200 words per minute
    pub read_time_minutes: u32,
    /// Placeholder publish date
    pub published_at: DateTime<Utc>,
    /// Placeholder like counter
    pub likes: u32,
    /// Placeholder comment counter
    pub comments: u32,
}

impl EnrichedPost {
    /// Human-readable reading time, e.g. "2 min read"
    pub fn read_time_label(&self) -> String {
        format!("{} min read", self.read_time_minutes)
    }
}

/// Filters users by a case-insensitive substring match
///
/// The query is trimmed and matched against name, username, email and company
/// name. A blank query returns every user.
pub fn search_users<'a>(users: &'a [EnrichedUser], query: &str) -> Vec<&'a EnrichedUser> {
    let term = query.trim().to_lowercase();
    if term.is_empty() {
        return users.iter().collect();
    }

    users
        .iter()
        .filter(|u| {
            let user = &u.user;
            user.name.to_lowercase().contains(&term)
                || user.username.to_lowercase().contains(&term)
                || user.email.to_lowercase().contains(&term)
                || user
                    .company
                    .as_ref()
                    .is_some_and(|c| c.name.to_lowercase().contains(&term))
        })
        .collect()
}

/// Looks up a user by id
pub fn find_user(users: &[EnrichedUser], id: u64) -> Option<&EnrichedUser> {
    users.iter().find(|u| u.user.id == id)
}
