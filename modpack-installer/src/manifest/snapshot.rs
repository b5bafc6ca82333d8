//! Server-side freshness snapshot.
//!
//! The snapshot lists the last-modified time of every file the server
//! publishes, keyed by canonical forward-slash path. A missing entry means
//! "freshness unknown", never an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One file as reported by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    #[serde(rename = "path")]
    pub canonical_path: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub size: u64,
    /// Seconds since the Unix epoch; zero or negative means unknown.
    #[serde(rename = "modified", default)]
    pub modified_epoch_seconds: i64,
    #[serde(rename = "modified_iso", default)]
    pub modified_iso_display: String,
}

impl SnapshotEntry {
    /// Server timestamp when it is usable for a staleness comparison.
    pub fn usable_modified(&self) -> Option<u64> {
        u64::try_from(self.modified_epoch_seconds)
            .ok()
            .filter(|secs| *secs > 0)
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.modified_epoch_seconds, 0)
    }
}

/// Wire shape of the snapshot document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub files: Vec<SnapshotEntry>,
}

/// Immutable snapshot indexed by normalized path.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "SnapshotDocument")]
pub struct ServerSnapshot {
    timestamp: i64,
    files: Vec<SnapshotEntry>,
    index: HashMap<String, usize>,
}

impl From<SnapshotDocument> for ServerSnapshot {
    fn from(doc: SnapshotDocument) -> Self {
        let mut index = HashMap::with_capacity(doc.files.len());
        for (position, entry) in doc.files.iter().enumerate() {
            // First occurrence wins on duplicate paths
            index
                .entry(normalize_key(&entry.canonical_path))
                .or_insert(position);
        }

        Self {
            timestamp: doc.timestamp,
            files: doc.files,
            index,
        }
    }
}

impl ServerSnapshot {
    pub fn lookup(&self, key: &str) -> Option<&SnapshotEntry> {
        self.index
            .get(&normalize_key(key))
            .and_then(|position| self.files.get(*position))
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Forward slashes, no leading `./` or `/`.
pub fn normalize_key(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut trimmed = unified.as_str();
    loop {
        if let Some(rest) = trimmed.strip_prefix("./") {
            trimmed = rest;
        } else if let Some(rest) = trimmed.strip_prefix('/') {
            trimmed = rest;
        } else {
            break;
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(json: &str) -> ServerSnapshot {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_lookup_normalizes_separators() {
        let snap = snapshot(
            r#"{"timestamp": 5, "files": [
                {"path": "config\\ui\\opts.json", "url": "u", "size": 3,
                 "modified": 1000, "modified_iso": "1970-01-01T00:16:40Z"}
            ]}"#,
        );

        let entry = snap.lookup("config/ui/opts.json").unwrap();
        assert_eq!(entry.modified_epoch_seconds, 1000);
        assert_eq!(entry.usable_modified(), Some(1000));
        assert!(snap.lookup("/config/ui/opts.json").is_some());
        assert!(snap.lookup("config/opts.json").is_none());
        assert_eq!(snap.timestamp(), 5);
    }

    #[test]
    fn test_duplicate_paths_first_wins() {
        let snap = snapshot(
            r#"{"timestamp": 0, "files": [
                {"path": "mods/a.jar", "url": "", "size": 1, "modified": 10, "modified_iso": ""},
                {"path": "mods/a.jar", "url": "", "size": 1, "modified": 20, "modified_iso": ""}
            ]}"#,
        );
        assert_eq!(snap.lookup("mods/a.jar").unwrap().modified_epoch_seconds, 10);
        assert_eq!(snap.len(), 2);
    }

    #[test]
    fn test_non_positive_timestamp_is_unusable() {
        let snap = snapshot(
            r#"{"timestamp": 0, "files": [
                {"path": "data/x.dat", "url": "", "size": 1, "modified": 0, "modified_iso": ""}
            ]}"#,
        );
        assert_eq!(snap.lookup("data/x.dat").unwrap().usable_modified(), None);
    }
}
