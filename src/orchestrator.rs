//! Read-through fetch orchestration
//!
//! `FetchOrchestrator` answers requests for record collections from the
//! `TimedCache` while it is fresh, and otherwise fetches from the
//! `RecordSource`, enriches the records and writes them back.
//!
//! There is no single-flight guard: two loads of the same key that both miss
//! the cache will both hit the source, and the later completion wins.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::cache::{CacheManager, CacheStats, TimedCache};
use crate::clock::Clock;
use crate::data::{EnrichedPost, EnrichedUser, Enricher, FetchError, RecordSource, Resource};
use crate::random::RandomSource;

/// Name of the on-disk cache snapshot
pub const SNAPSHOT_NAME: &str = "records";

/// An enriched collection as stored in the cache
///
/// Collections are shared behind `Arc`, so a cache hit hands out the same
/// allocation that was cached rather than a copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "records", rename_all = "snake_case")]
pub enum Collection {
    Users(Arc<Vec<EnrichedUser>>),
    Posts(Arc<Vec<EnrichedPost>>),
}

impl Collection {
    /// Number of records in the collection
    pub fn len(&self) -> usize {
        match self {
            Collection::Users(users) => users.len(),
            Collection::Posts(posts) => posts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Coordinates cache lookups, remote fetches and enrichment
pub struct FetchOrchestrator {
    source: Arc<dyn RecordSource>,
    enricher: Enricher,
    cache: Mutex<TimedCache<Collection>>,
}

impl FetchOrchestrator {
    /// Creates an orchestrator with an empty cache
    ///
    /// # Arguments
    /// * `source` - Where raw records come from
    /// * `clock` - Time source for cache freshness and placeholder dates
    /// * `rng` - Random source for placeholder enrichment fields
    /// * `ttl` - How long a cached collection stays fresh
    pub fn new(
        source: Arc<dyn RecordSource>,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
        ttl: Duration,
    ) -> Self {
        Self {
            source,
            enricher: Enricher::new(clock.clone(), rng),
            cache: Mutex::new(TimedCache::new(ttl, clock)),
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, TimedCache<Collection>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads a collection, serving it from the cache while fresh
    ///
    /// With `force_refresh` the cache is bypassed and the source is always
    /// queried. On success the enriched collection replaces the cache entry
    /// for the resource. On failure the cache is left untouched, so an older
    /// entry stays readable, and the error is returned to the caller.
    pub async fn load(
        &self,
        resource: Resource,
        force_refresh: bool,
    ) -> Result<Collection, FetchError> {
        let key = resource.cache_key();

        if !force_refresh {
            let cached = self.lock_cache().get_fresh(&key).cloned();
            if let Some(hit) = cached {
                tracing::debug!(%key, records = hit.len(), "cache hit");
                return Ok(hit);
            }
        }

        tracing::debug!(%key, force_refresh, "fetching {}", resource);
        let fetched = match resource {
            Resource::Users => self
                .source
                .fetch_users()
                .await
                .map(|users| Collection::Users(Arc::new(self.enricher.users(users)))),
            Resource::UserPosts(user_id) => self
                .source
                .fetch_user_posts(user_id)
                .await
                .map(|posts| Collection::Posts(Arc::new(self.enricher.posts(posts)))),
        };

        match fetched {
            Ok(collection) => {
                tracing::info!(%key, records = collection.len(), "fetched {}", resource);
                self.lock_cache().set(key, collection.clone());
                Ok(collection)
            }
            Err(e) => {
                tracing::warn!(%key, error = %e, "failed to fetch {}", resource);
                Err(e)
            }
        }
    }

    /// Loads every user
    pub async fn users(&self, force_refresh: bool) -> Result<Arc<Vec<EnrichedUser>>, FetchError> {
        match self.load(Resource::Users, force_refresh).await? {
            Collection::Users(users) => Ok(users),
            Collection::Posts(_) => Err(FetchError::MalformedResponse(
                "cache entry for users holds posts".to_string(),
            )),
        }
    }

    /// Loads the posts written by `user_id`
    pub async fn user_posts(
        &self,
        user_id: u64,
        force_refresh: bool,
    ) -> Result<Arc<Vec<EnrichedPost>>, FetchError> {
        match self.load(Resource::UserPosts(user_id), force_refresh).await? {
            Collection::Posts(posts) => Ok(posts),
            Collection::Users(_) => Err(FetchError::MalformedResponse(format!(
                "cache entry for posts of user {} holds users",
                user_id
            ))),
        }
    }

    /// Loads posts for several users concurrently
    ///
    /// Results come back in the order of `user_ids`. Each load succeeds or
    /// fails on its own.
    pub async fn load_posts_for(
        &self,
        user_ids: &[u64],
        force_refresh: bool,
    ) -> Vec<(u64, Result<Arc<Vec<EnrichedPost>>, FetchError>)> {
        let loads = user_ids
            .iter()
            .map(|&user_id| async move { (user_id, self.user_posts(user_id, force_refresh).await) });
        join_all(loads).await
    }

    /// Whether a fresh entry exists for `resource`
    pub fn is_cached(&self, resource: Resource) -> bool {
        self.lock_cache().is_valid(&resource.cache_key())
    }

    /// Drops every cached collection
    pub fn clear_cache(&self) {
        self.lock_cache().clear();
        tracing::info!("cache cleared");
    }

    /// Summarises the cache contents
    pub fn cache_stats(&self) -> CacheStats {
        self.lock_cache().stats()
    }

    /// Replaces the cache contents with a previously written snapshot
    ///
    /// Returns the number of restored entries; a missing or unreadable
    /// snapshot restores nothing.
    pub fn restore_from(&self, manager: &CacheManager) -> usize {
        match manager.read_snapshot::<Collection>(SNAPSHOT_NAME) {
            Some(entries) => {
                let count = entries.len();
                self.lock_cache().restore(entries);
                tracing::debug!(entries = count, dir = %manager.dir().display(), "restored cache snapshot");
                count
            }
            None => 0,
        }
    }

    /// Writes the cache contents to a snapshot
    pub fn persist_to(&self, manager: &CacheManager) -> std::io::Result<()> {
        let cache = self.lock_cache();
        manager.write_snapshot(SNAPSHOT_NAME, &cache)
    }
}

impl std::fmt::Debug for FetchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOrchestrator")
            .field("cache", &*self.lock_cache())
            .finish_non_exhaustive()
    }
}
