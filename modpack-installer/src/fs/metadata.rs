//! Local file state used by the staleness check and cleanup.

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// What the planner needs to know about a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileState {
    /// Last modified time in whole seconds since the Unix epoch
    pub modified: u64,
}

impl LocalFileState {
    /// Read the state of `path`. `Ok(None)` when nothing exists there.
    pub fn probe(path: &Path) -> io::Result<Option<Self>> {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(Some(Self {
            modified: epoch_seconds(metadata.modified()?),
        }))
    }
}

/// Whole seconds since the Unix epoch; times before the epoch clamp to zero.
pub fn epoch_seconds(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub fn is_writable(path: &Path) -> io::Result<bool> {
    Ok(!fs::metadata(path)?.permissions().readonly())
}
