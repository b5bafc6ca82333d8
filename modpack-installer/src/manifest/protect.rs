//! User-maintained list of paths that cleanup must never delete.
//!
//! One relative path per line. Blank lines and lines starting with `#` are
//! ignored; everything else is trimmed and kept verbatim.

use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Default name of the protect-list file at the installation root.
pub const DEFAULT_PROTECT_FILE: &str = "dontdelete.txt";

const MODS_SUBTREE: &str = "mods";

#[derive(Debug, Clone, Default)]
pub struct ProtectList {
    entries: HashSet<String>,
}

impl ProtectList {
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| line.replace('\\', "/"))
            .collect();
        Self { entries }
    }

    /// Load from `root/file_name`. A missing or unreadable file yields an empty list.
    pub fn load(root: &Path, file_name: &str) -> Self {
        let path = root.join(file_name);
        if !path.exists() {
            debug!("No protect list at {}", path.display());
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let list = Self::parse(&content);
                debug!("Loaded {} protected path(s) from {}", list.len(), path.display());
                list
            }
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn contains(&self, relative_path: &str) -> bool {
        self.entries.contains(&relative_path.replace('\\', "/"))
    }

    /// Whether a file under `subtree` is protected, given its subtree-relative path.
    /// Both `ui/opts.json` and `config/ui/opts.json` forms match. Mods are
    /// identified by filename, so under `mods` the bare filename matches too.
    pub fn protects(&self, subtree: &str, relative_path: &str) -> bool {
        let relative_path = relative_path.replace('\\', "/");
        if self.contains(&relative_path) || self.contains(&format!("{}/{}", subtree, relative_path)) {
            return true;
        }
        subtree == MODS_SUBTREE
            && relative_path
                .rsplit('/')
                .next()
                .is_some_and(|file_name| self.contains(file_name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let list = ProtectList::parse("# keep these\n\n  foo-1.0.jar  \nui\\opts.json\n#bar.jar\n");
        assert_eq!(list.len(), 2);
        assert!(list.contains("foo-1.0.jar"));
        assert!(list.contains("ui/opts.json"));
        assert!(!list.contains("bar.jar"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let list = ProtectList::load(temp_dir.path(), DEFAULT_PROTECT_FILE);
        assert!(list.is_empty());
    }

    #[test]
    fn test_load_from_root() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        std::fs::write(temp_dir.path().join(DEFAULT_PROTECT_FILE), "mine.jar\n")?;

        let list = ProtectList::load(temp_dir.path(), DEFAULT_PROTECT_FILE);
        assert!(list.protects("mods", "mine.jar"));
        Ok(())
    }

    #[test]
    fn test_protects_accepts_root_relative_form() {
        let list = ProtectList::parse("config/ui/keep.json\n");
        assert!(list.protects("config", "ui/keep.json"));
        assert!(!list.protects("mods", "ui/keep.json"));
    }

    #[test]
    fn test_bare_filename_matches_only_under_mods() {
        let list = ProtectList::parse("keep.jar\n");
        assert!(list.protects("mods", "addons/keep.jar"));
        assert!(!list.protects("config", "addons/keep.jar"));
    }

    #[test]
    fn test_entries_are_exact_not_globs() {
        let list = ProtectList::parse("*.jar\n");
        assert!(!list.contains("foo.jar"));
        assert!(list.contains("*.jar"));
    }
}
