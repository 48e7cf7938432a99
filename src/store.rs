//! Record of listing ids already reported to the user.
//!
//! The whole map is read when the scanner starts and written back once at
//! the end of a run. Nothing is ever evicted.

use crate::error::{Result, ScanError};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct SeenStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl SeenStore {
    /// Empty store that will be saved to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the store from `path`. A missing file is an empty store; so is
    /// one that can't be read, after logging why.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::new(path);
        if !store.path.exists() {
            return store;
        }

        match std::fs::read_to_string(&store.path)
            .map_err(|e| e.to_string())
            .and_then(|contents| serde_json::from_str(&contents).map_err(|e| e.to_string()))
        {
            Ok(entries) => {
                store.entries = entries;
                info!("Loaded {} seen listings from {}", store.entries.len(), store.path.display());
            }
            Err(e) => error!("Failed to load seen listings from {}: {e}", store.path.display()),
        }
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Remember `id` as first seen at `at`. An id already present keeps its
    /// original timestamp.
    pub fn record(&mut self, id: &str, at: DateTime<Utc>) {
        self.entries
            .entry(id.to_string())
            .or_insert_with(|| at.to_rfc3339());
    }

    /// When `id` was first seen
    pub fn first_seen(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the whole store to disk
    pub fn save(&self) -> Result<()> {
        let persistence = |source: std::io::Error| ScanError::Persistence {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| persistence(std::io::Error::other(e)))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(persistence)?;
        }
        std::fs::write(&self.path, json).map_err(persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeenStore::load(dir.path().join("seen.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = SeenStore::load(&path);
        assert!(store.is_empty());
    }

    #[test]
    fn saved_entries_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("seen.json");
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let mut store = SeenStore::load(&path);
        store.record("zoopla-1", at);
        store.save().unwrap();

        let reloaded = SeenStore::load(&path);
        assert!(reloaded.contains("zoopla-1"));
        assert_eq!(reloaded.first_seen("zoopla-1"), Some("2024-03-01T12:00:00+00:00"));
    }

    #[test]
    fn save_under_a_file_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let path = blocker.join("seen.json");
        let store = SeenStore::load(&path);
        assert_eq!(store.path(), path.as_path());

        match store.save().unwrap_err() {
            ScanError::Persistence { path: failed, .. } => assert_eq!(failed, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn record_keeps_first_timestamp() {
        let mut store = SeenStore::new("unused.json");
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        store.record("rightmove-9", first);
        store.record("rightmove-9", later);
        assert_eq!(store.len(), 1);
        assert_eq!(store.first_seen("rightmove-9"), Some(first.to_rfc3339().as_str()));
    }
}
