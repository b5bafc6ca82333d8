//! Utility modules for the modpack installer.

pub mod errors;
pub mod logger;

pub use errors::{InstallerError, Result};
