//! Cache manager for persisting cache snapshots to disk
//!
//! Each CLI invocation is its own process, so the in-memory `TimedCache` is
//! written to a JSON file after a command and read back on the next start.
//! Entries keep their original write timestamps, so freshness carries over.

use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::timed::{CacheEntry, TimedCache};

/// Snapshot format version, bumped when the on-disk layout changes
const SNAPSHOT_VERSION: u32 = 1;

/// On-disk layout of a cache snapshot
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot<V> {
    version: u32,
    entries: HashMap<String, CacheEntry<V>>,
}

/// Borrowed form of `Snapshot` used when writing
#[derive(Serialize)]
struct SnapshotRef<'a, V> {
    version: u32,
    entries: &'a HashMap<String, CacheEntry<V>>,
}

/// Manages reading and writing cache snapshots
///
/// Snapshots are stored as JSON files in an XDG-compliant cache directory
/// (`~/.cache/fetchdesk/` on Linux).
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// Directory where snapshot files are stored
    cache_dir: PathBuf,
}

impl CacheManager {
    /// Creates a new CacheManager using the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "fetchdesk")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a new CacheManager with a custom cache directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Directory holding the snapshot files
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path to the snapshot file for the given name
    fn snapshot_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    /// Ensures the cache directory exists
    fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }

    /// Writes every entry of `cache` to the snapshot called `name`
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err` if directory creation, serialization or file writing fails
    pub fn write_snapshot<V: Serialize>(
        &self,
        name: &str,
        cache: &TimedCache<V>,
    ) -> std::io::Result<()> {
        self.ensure_dir()?;

        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            entries: cache.entries(),
        };

        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::write(self.snapshot_path(name), json)
    }

    /// Reads the snapshot called `name`
    ///
    /// Returns `None` if the file doesn't exist, cannot be parsed, or was
    /// written by a different snapshot version. Unreadable snapshots are
    /// logged and otherwise treated as absent.
    pub fn read_snapshot<V: DeserializeOwned>(
        &self,
        name: &str,
    ) -> Option<HashMap<String, CacheEntry<V>>> {
        let path = self.snapshot_path(name);
        let content = fs::read_to_string(&path).ok()?;

        let snapshot: Snapshot<V> = match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable cache snapshot");
                return None;
            }
        };

        if snapshot.version != SNAPSHOT_VERSION {
            tracing::warn!(
                path = %path.display(),
                version = snapshot.version,
                "ignoring cache snapshot with unsupported version"
            );
            return None;
        }

        Some(snapshot.entries)
    }

    /// Deletes the snapshot called `name`, if present
    pub fn remove_snapshot(&self, name: &str) -> std::io::Result<()> {
        match fs::remove_file(self.snapshot_path(name)) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::timed::DEFAULT_TTL;
    use crate::clock::ManualClock;
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        name: String,
        value: i32,
    }

    fn create_test_manager() -> (CacheManager, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let manager = CacheManager::with_dir(temp_dir.path().to_path_buf());
        (manager, temp_dir)
    }

    fn create_cache(clock: Arc<ManualClock>) -> TimedCache<TestData> {
        TimedCache::new(DEFAULT_TTL, clock)
    }

    #[test]
    fn test_write_creates_file_in_cache_directory() {
        let (manager, temp_dir) = create_test_manager();
        let mut cache = create_cache(Arc::new(ManualClock::new(5_000)));
        cache.set(
            "users",
            TestData {
                name: "test".to_string(),
                value: 42,
            },
        );

        manager
            .write_snapshot("records", &cache)
            .expect("Write should succeed");

        let expected_path = temp_dir.path().join("records.json");
        assert!(expected_path.exists(), "Snapshot file should exist");

        let content = fs::read_to_string(&expected_path).expect("Should read file");
        assert!(content.contains("\"users\""));
        assert!(content.contains("\"written_at_millis\": 5000"));
        assert!(content.contains("42"));
    }

    #[test]
    fn test_read_returns_none_for_missing_snapshot() {
        let (manager, _temp_dir) = create_test_manager();

        let result = manager.read_snapshot::<TestData>("nonexistent");

        assert!(result.is_none(), "Should return None for missing snapshot");
    }

    #[test]
    fn test_read_returns_none_for_corrupt_snapshot() {
        let (manager, temp_dir) = create_test_manager();
        fs::write(temp_dir.path().join("records.json"), "{ not json").unwrap();

        assert!(manager.read_snapshot::<TestData>("records").is_none());
    }

    #[test]
    fn test_read_returns_none_for_other_version() {
        let (manager, temp_dir) = create_test_manager();
        fs::write(
            temp_dir.path().join("records.json"),
            r#"{"version": 99, "entries": {}}"#,
        )
        .unwrap();

        assert!(manager.read_snapshot::<TestData>("records").is_none());
    }

    #[test]
    fn test_snapshot_restores_entries_with_timestamps() {
        let (manager, _temp_dir) = create_test_manager();
        let clock = Arc::new(ManualClock::new(10_000));
        let mut cache = create_cache(clock.clone());
        let data = TestData {
            name: "roundtrip".to_string(),
            value: 12345,
        };
        cache.set("users", data.clone());
        manager.write_snapshot("records", &cache).unwrap();

        let entries = manager
            .read_snapshot::<TestData>("records")
            .expect("Should read snapshot");
        let mut restored = create_cache(clock.clone());
        restored.restore(entries);

        assert_eq!(restored.get("users"), Some(&data));
        assert_eq!(restored.entries()["users"].written_at_millis, 10_000);
        assert!(restored.is_valid("users"));

        clock.advance(300_000);
        assert!(!restored.is_valid("users"), "restored entry keeps its age");
    }

    #[test]
    fn test_write_creates_directory_if_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let nested_path = temp_dir.path().join("nested").join("cache").join("dir");
        let manager = CacheManager::with_dir(nested_path.clone());
        let cache = create_cache(Arc::new(ManualClock::new(0)));

        manager.write_snapshot("records", &cache).expect("Write should succeed");

        assert!(nested_path.exists(), "Nested directory should be created");
        assert!(nested_path.join("records.json").exists(), "Snapshot file should exist");
    }

    #[test]
    fn test_remove_snapshot_is_idempotent() {
        let (manager, temp_dir) = create_test_manager();
        let cache = create_cache(Arc::new(ManualClock::new(0)));
        manager.write_snapshot("records", &cache).unwrap();

        manager.remove_snapshot("records").expect("first remove");
        manager.remove_snapshot("records").expect("second remove");

        assert!(!temp_dir.path().join("records.json").exists());
    }

    #[test]
    fn test_new_creates_xdg_compliant_path() {
        if let Some(manager) = CacheManager::new() {
            let path_str = manager.cache_dir.to_string_lossy();
            assert!(
                path_str.contains("fetchdesk"),
                "Cache path should contain project name"
            );
        }
        // Test passes if new() returns None (e.g., no home directory in CI)
    }
}
