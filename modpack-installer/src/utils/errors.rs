//! Error types for the modpack installer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstallerError {
    /// The manifest or snapshot document could not be retrieved or parsed.
    #[error("Failed to fetch {document}: {reason}")]
    Fetch { document: String, reason: String },

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// A single file exhausted its download attempts.
    #[error("Failed to download {url} after {attempts} attempt(s): {reason}")]
    Transfer {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("Could not remove {path}: {reason}")]
    Cleanup { path: String, reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Self-update error: {0}")]
    Update(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl InstallerError {
    pub fn fetch(document: impl Into<String>, reason: impl ToString) -> Self {
        InstallerError::Fetch {
            document: document.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, InstallerError>;
