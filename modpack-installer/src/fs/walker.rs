//! Directory traversal over managed subtrees.
//!
//! Lists the regular files under a subtree together with their
//! subtree-relative path, which is what cleanup compares against the manifest.

use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// A regular file discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the file
    pub path: PathBuf,

    /// Path relative to the walked root, always with `/` separators
    pub relative_path: String,

    /// Final path component
    pub file_name: String,
}

impl FileInfo {
    fn from_entry(entry: &DirEntry, root: &Path) -> Self {
        let path = entry.path().to_path_buf();
        let relative_path = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        Self {
            file_name: entry.file_name().to_string_lossy().into_owned(),
            path,
            relative_path,
        }
    }
}

/// Walk `root` recursively and collect every regular file.
///
/// Symlinks are not followed and are not reported, so cleanup never deletes
/// through a link. A missing root yields an empty list. Entries that cannot
/// be read are logged and skipped, so one bad directory never hides the rest
/// of the subtree.
///
/// # Example
/// ```no_run
/// use modpack_installer::fs::walker::list_files;
/// use std::path::Path;
///
/// let files = list_files(Path::new("/games/pack/mods"));
/// println!("Found {} files", files.len());
/// ```
pub fn list_files(root: &Path) -> Vec<FileInfo> {
    if !root.is_dir() {
        return Vec::new();
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                warn!("Skipping unreadable entry {}: {}", path, e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        files.push(FileInfo::from_entry(&entry, root));
    }

    // Stable order for reporting
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    files
}
