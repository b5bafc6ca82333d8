//! Planning: decide what to download and what to remove.
//!
//! Everything here is a function of the manifest, the snapshot and the
//! current disk state. Only [`cleanup::execute_cleanup`] mutates the tree.

pub mod cleanup;
pub mod freshness;
pub mod plan;

pub use cleanup::{execute_cleanup, plan_cleanup, CleanupPlan, CleanupReport};
pub use freshness::{needs_fetch, FetchReason};
pub use plan::{plan_transfers, PlannedTransfer, TransferPlan};
