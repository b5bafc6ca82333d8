//! Modpack installer library.
//!
//! Keeps a local game directory in sync with a remote modpack manifest:
//! plans which files are missing or stale, prunes orphaned mods and configs,
//! downloads with retry and reports progress to an observer.

pub mod config;
pub mod events;
pub mod fs;
pub mod installer;
pub mod manifest;
pub mod remote;
pub mod shutdown;
pub mod sync;
pub mod transfer;
pub mod update;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use events::{EventBus, InstallEvent, ProgressObserver};
pub use installer::{InstallSettings, InstallState, Installer, StatusLabel};
pub use manifest::ModpackManifest;
pub use remote::{HttpSource, RemoteSource};
pub use utils::errors::InstallerError;
pub type Result<T> = std::result::Result<T, InstallerError>;
