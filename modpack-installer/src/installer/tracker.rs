//! Single-flight guard for installer operations.
//!
//! At most one operation (check, install, remove, self-update) runs at a
//! time. [`OperationTracker::try_begin`] hands out a ticket that releases the
//! slot when dropped, so an early return or panic never wedges the installer.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Check,
    Install,
    Remove,
    SelfUpdate,
}

struct ActiveOperation {
    kind: OperationKind,
    cancel: CancellationToken,
}

#[derive(Clone, Default)]
pub struct OperationTracker {
    active: Arc<Mutex<Option<ActiveOperation>>>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock only ever leaves a stale slot, which the
    // ticket's Drop clears anyway.
    fn slot(&self) -> MutexGuard<'_, Option<ActiveOperation>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim the slot, or `None` if another operation is running
    pub fn try_begin(&self, kind: OperationKind) -> Option<OperationTicket> {
        let mut slot = self.slot();
        if let Some(current) = slot.as_ref() {
            debug!("Ignoring {:?} request: {:?} already running", kind, current.kind);
            return None;
        }

        let cancel = CancellationToken::new();
        *slot = Some(ActiveOperation {
            kind,
            cancel: cancel.clone(),
        });
        Some(OperationTicket {
            tracker: self.clone(),
            kind,
            cancel,
        })
    }

    /// Request cancellation of the running operation
    pub fn cancel(&self) -> bool {
        match self.slot().as_ref() {
            Some(current) => {
                info!("Cancelling {:?}", current.kind);
                current.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.slot().is_some()
    }
}

/// Proof of owning the operation slot
pub struct OperationTicket {
    tracker: OperationTracker,
    kind: OperationKind,
    cancel: CancellationToken,
}

impl OperationTicket {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for OperationTicket {
    fn drop(&mut self) {
        *self.tracker.slot() = None;
    }
}
