//! Staleness predicate deciding whether a manifest entry must be fetched.

use std::path::Path;
use tracing::debug;

use crate::fs::metadata::LocalFileState;
use crate::manifest::snapshot::SnapshotEntry;
use crate::manifest::FreshnessRule;

/// Why an entry ended up in the transfer plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReason {
    /// Nothing on disk.
    Missing,
    /// Server copy is newer than the local one.
    Stale { server_modified: u64, local_modified: u64 },
    /// Local file exists but its state could not be read.
    Unreadable,
}

/// Pure decision over already-probed state.
///
/// `None` means the present file is kept. A present file with no usable
/// server timestamp is assumed fresh.
pub fn evaluate(
    local: Option<&LocalFileState>,
    rule: FreshnessRule,
    server_modified: Option<u64>,
) -> Option<FetchReason> {
    let local = match local {
        None => return Some(FetchReason::Missing),
        Some(state) => state,
    };

    if rule == FreshnessRule::ExistenceOnly {
        return None;
    }

    match server_modified {
        Some(server) if server > local.modified => Some(FetchReason::Stale {
            server_modified: server,
            local_modified: local.modified,
        }),
        _ => None,
    }
}

/// Probe `local_path` and decide whether it needs fetching.
pub fn needs_fetch(
    local_path: &Path,
    rule: FreshnessRule,
    snapshot_entry: Option<&SnapshotEntry>,
) -> Option<FetchReason> {
    let server_modified = snapshot_entry.and_then(SnapshotEntry::usable_modified);

    let local = match LocalFileState::probe(local_path) {
        Ok(state) => state,
        Err(e) => {
            debug!("Cannot read {}: {}, will download", local_path.display(), e);
            return Some(FetchReason::Unreadable);
        }
    };

    let decision = evaluate(local.as_ref(), rule, server_modified);
    match (&decision, server_modified) {
        (Some(FetchReason::Stale { .. }), _) => debug!(
            "{} is older than the server copy from {}",
            local_path.display(),
            snapshot_entry
                .and_then(SnapshotEntry::modified_at)
                .map(|at| at.to_rfc3339())
                .unwrap_or_default()
        ),
        (Some(reason), _) => debug!("{}: {:?}", local_path.display(), reason),
        (None, None) if rule == FreshnessRule::Timestamp => {
            debug!("No server timestamp for {}, keeping local copy", local_path.display())
        }
        (None, _) => debug!("{} is up to date", local_path.display()),
    }
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn state(modified: u64) -> LocalFileState {
        LocalFileState { modified }
    }

    #[test]
    fn test_missing_always_fetched() {
        assert_eq!(
            evaluate(None, FreshnessRule::Timestamp, None),
            Some(FetchReason::Missing)
        );
        assert_eq!(
            evaluate(None, FreshnessRule::ExistenceOnly, Some(10)),
            Some(FetchReason::Missing)
        );
    }

    #[test]
    fn test_older_local_is_stale() {
        assert_eq!(
            evaluate(Some(&state(999)), FreshnessRule::Timestamp, Some(1000)),
            Some(FetchReason::Stale {
                server_modified: 1000,
                local_modified: 999
            })
        );
    }

    #[test]
    fn test_equal_or_newer_local_is_fresh() {
        assert_eq!(evaluate(Some(&state(1000)), FreshnessRule::Timestamp, Some(1000)), None);
        assert_eq!(evaluate(Some(&state(2000)), FreshnessRule::Timestamp, Some(1000)), None);
    }

    #[test]
    fn test_unknown_timestamp_keeps_present_file() {
        assert_eq!(evaluate(Some(&state(1)), FreshnessRule::Timestamp, None), None);
    }

    #[test]
    fn test_existence_only_ignores_timestamps() {
        assert_eq!(
            evaluate(Some(&state(1)), FreshnessRule::ExistenceOnly, Some(u64::MAX)),
            None
        );
    }

    #[test]
    fn test_needs_fetch_against_disk() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("opts.json");
        assert_eq!(
            needs_fetch(&path, FreshnessRule::Timestamp, None),
            Some(FetchReason::Missing)
        );

        std::fs::write(&path, b"{}")?;
        let file = std::fs::File::options().write(true).open(&path)?;
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(500))?;

        let entry = SnapshotEntry {
            canonical_path: "config/opts.json".to_string(),
            url: String::new(),
            size: 2,
            modified_epoch_seconds: 1000,
            modified_iso_display: String::new(),
        };
        assert!(matches!(
            needs_fetch(&path, FreshnessRule::Timestamp, Some(&entry)),
            Some(FetchReason::Stale { .. })
        ));
        Ok(())
    }
}
