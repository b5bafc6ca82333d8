//! Installer lifecycle states and run outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::transfer::progress::{format_bytes, format_duration, format_speed};

/// What the idle screen says about the installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLabel {
    Unknown,
    NotInstalled,
    UpToDate,
    UpdatesAvailable,
}

impl StatusLabel {
    pub fn message(&self) -> &'static str {
        match self {
            StatusLabel::Unknown => "Status unknown",
            StatusLabel::NotInstalled => "Not installed",
            StatusLabel::UpToDate => "Modpack up to date",
            StatusLabel::UpdatesAvailable => "Updates available",
        }
    }
}

/// Lifecycle: `Idle -> CheckingUpdates -> Idle` and
/// `Idle -> Installing -> Completed | Failed -> Idle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InstallState {
    Idle { label: StatusLabel },
    CheckingUpdates,
    Installing { update: bool },
    Completed { update: bool },
    Failed { reason: String },
}

impl Default for InstallState {
    fn default() -> Self {
        InstallState::Idle {
            label: StatusLabel::Unknown,
        }
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallState::Idle { label } => write!(f, "idle ({})", label.message()),
            InstallState::CheckingUpdates => write!(f, "checking for updates"),
            InstallState::Installing { update: true } => write!(f, "updating"),
            InstallState::Installing { update: false } => write!(f, "installing"),
            InstallState::Completed { .. } => write!(f, "completed"),
            InstallState::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// Result of an update check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub label: StatusLabel,
    /// Files that would be fetched by an install
    pub pending_files: usize,
    pub pending_bytes: u64,
}

impl CheckOutcome {
    pub fn not_installed() -> Self {
        Self {
            label: StatusLabel::NotInstalled,
            pending_files: 0,
            pending_bytes: 0,
        }
    }
}

/// Summary of a finished install or update run
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub run_id: Uuid,
    pub update: bool,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub downloaded_files: usize,
    pub downloaded_bytes: u64,
    pub removed_files: usize,
    /// Stale files left in place (read-only or failed to delete)
    pub cleanup_skipped: usize,
    /// The snapshot was unavailable and present files were assumed fresh
    pub snapshot_degraded: bool,
}

impl fmt::Display for InstallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.duration.as_secs();
        let speed = if secs > 0 {
            self.downloaded_bytes / secs
        } else {
            self.downloaded_bytes
        };
        write!(
            f,
            "{} {} files ({}) in {} at {}, removed {} old file(s)",
            if self.update { "Updated" } else { "Installed" },
            self.downloaded_files,
            format_bytes(self.downloaded_bytes),
            format_duration(secs),
            format_speed(speed),
            self.removed_files
        )?;
        if self.cleanup_skipped > 0 {
            write!(f, ", {} left in place", self.cleanup_skipped)?;
        }
        if self.snapshot_degraded {
            write!(f, " (server timestamps unavailable)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    Removed { path: PathBuf },
    NothingToRemove { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&InstallState::Installing { update: true }).unwrap();
        assert_eq!(json, r#"{"state":"installing","update":true}"#);

        let idle: InstallState =
            serde_json::from_str(r#"{"state":"idle","label":"updates_available"}"#).unwrap();
        assert_eq!(
            idle,
            InstallState::Idle {
                label: StatusLabel::UpdatesAvailable
            }
        );
    }

    #[test]
    fn test_report_display() {
        let report = InstallReport {
            run_id: Uuid::new_v4(),
            update: true,
            started_at: Utc::now(),
            duration: Duration::from_secs(90),
            downloaded_files: 3,
            downloaded_bytes: 2048,
            removed_files: 1,
            cleanup_skipped: 1,
            snapshot_degraded: true,
        };
        let text = report.to_string();
        assert!(text.starts_with("Updated 3 files (2.00 KB) in 1m 30s"));
        assert!(text.contains("1 left in place"));
        assert!(text.contains("server timestamps unavailable"));
    }
}
