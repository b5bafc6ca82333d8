//! Progress and status events emitted by the installer.
//!
//! The core reports through the [`ProgressObserver`] trait and never touches
//! presentation types. [`EventBus`] is the stock observer: it fans events out
//! over a broadcast channel so any number of front-ends can subscribe.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::installer::state::InstallState;

/// Maximum number of queued events per subscriber
const BROADCAST_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum InstallEvent {
    /// Short human-readable status line
    #[serde(rename = "install:status")]
    Status { message: String },

    /// Run-level progress: files completed out of files planned
    #[serde(rename = "install:progress")]
    Progress(ProgressPayload),

    /// Byte progress of the file currently downloading
    #[serde(rename = "install:file_bytes")]
    FileBytes {
        file: String,
        transferred: u64,
        total: Option<u64>,
    },

    #[serde(rename = "install:state")]
    StateChanged(InstallState),

    /// Snapshot could not be fetched; present files are assumed fresh
    #[serde(rename = "snapshot:degraded")]
    SnapshotDegraded { reason: String },

    /// A stale file was left in place
    #[serde(rename = "cleanup:skipped")]
    CleanupSkipped { path: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressPayload {
    pub completed: usize,
    pub total: usize,
    pub label: String,
    pub percent: f64,
}

impl ProgressPayload {
    pub fn new(completed: usize, total: usize, label: impl Into<String>) -> Self {
        let percent = if total > 0 {
            (completed as f64 / total as f64 * 100.0).min(100.0)
        } else {
            100.0
        };
        Self {
            completed,
            total,
            label: label.into(),
            percent,
        }
    }
}

/// Narrow interface between the installer and whatever presents it.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, completed: usize, total: usize, label: &str);

    fn on_status(&self, text: &str);

    /// Byte progress of the file in flight; `total` is the declared size when known
    fn on_file_bytes(&self, file: &str, transferred: u64, total: Option<u64>) {
        self.on_event(InstallEvent::FileBytes {
            file: file.to_string(),
            transferred,
            total,
        });
    }

    /// Everything else (state changes, degraded snapshot, cleanup skips).
    fn on_event(&self, _event: InstallEvent) {}
}

/// Broadcast fan-out of installer events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<InstallEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn broadcast(&self, event: InstallEvent) {
        match self.tx.send(event) {
            Ok(count) => debug!("Delivered event to {} subscriber(s)", count),
            Err(broadcast::error::SendError(event)) => {
                debug!("No subscribers for event: {:?}", event)
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InstallEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for EventBus {
    fn on_progress(&self, completed: usize, total: usize, label: &str) {
        self.broadcast(InstallEvent::Progress(ProgressPayload::new(
            completed, total, label,
        )));
    }

    fn on_status(&self, text: &str) {
        self.broadcast(InstallEvent::Status {
            message: text.to_string(),
        });
    }

    fn on_event(&self, event: InstallEvent) {
        self.broadcast(event);
    }
}
