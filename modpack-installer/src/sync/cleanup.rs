//! Cleanup planning and execution for the `mods` and `config` subtrees.
//!
//! Only these two subtrees are ever pruned. Resource packs, shader packs,
//! data and natives directories may hold user content and are left alone.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::fs::metadata::is_writable;
use crate::fs::walker::{list_files, FileInfo};
use crate::manifest::protect::ProtectList;
use crate::manifest::{Category, ModpackManifest};
use crate::utils::errors::InstallerError;

/// A file marked for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRemoval {
    pub subtree: Category,
    pub path: PathBuf,
    /// Path relative to the subtree, with `/` separators
    pub relative_path: String,
}

#[derive(Debug, Clone, Default)]
pub struct CleanupPlan {
    pub removals: Vec<PlannedRemoval>,
}

impl CleanupPlan {
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.removals.len()
    }
}

/// Outcome of executing a cleanup plan. Failures never abort the run.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed: Vec<String>,
    pub skipped_read_only: Vec<String>,
    pub failures: Vec<InstallerError>,
}

/// Find orphaned files under `mods/` and `config/`.
///
/// Under `mods/` a file is kept when its filename is listed by any registry or
/// custom mod. Under `config/` it is kept when its config-relative path matches
/// a config entry. Protected paths are always kept.
pub fn plan_cleanup(manifest: &ModpackManifest, root: &Path, protect: &ProtectList) -> CleanupPlan {
    let mut plan = CleanupPlan::default();

    let expected_mods = manifest.expected_mod_filenames();
    collect_orphans(root, Category::Mods, protect, &mut plan, |file| {
        expected_mods.contains(&file.file_name)
    });

    let expected_configs: HashSet<String> = manifest.expected_config_paths();
    collect_orphans(root, Category::Config, protect, &mut plan, |file| {
        expected_configs.contains(&file.relative_path)
    });

    plan
}

fn collect_orphans<F>(
    root: &Path,
    subtree: Category,
    protect: &ProtectList,
    plan: &mut CleanupPlan,
    keep: F,
) where
    F: Fn(&FileInfo) -> bool,
{
    let dir_name = subtree.dir_name();
    for file in list_files(&root.join(dir_name)) {
        if keep(&file) || protect.protects(dir_name, &file.relative_path) {
            continue;
        }
        plan.removals.push(PlannedRemoval {
            subtree,
            path: file.path,
            relative_path: file.relative_path,
        });
    }
}

/// Remove every planned file, skipping read-only ones and logging failures.
pub fn execute_cleanup(plan: &CleanupPlan) -> CleanupReport {
    let mut report = CleanupReport::default();

    for removal in &plan.removals {
        let label = format!("{}/{}", removal.subtree.dir_name(), removal.relative_path);

        match is_writable(&removal.path) {
            Ok(false) => {
                warn!("Skipping read-only file: {}", label);
                report.skipped_read_only.push(label);
                continue;
            }
            Ok(true) => {}
            Err(e) => {
                warn!("Cannot inspect {}: {}", label, e);
                report.failures.push(InstallerError::Cleanup {
                    path: label,
                    reason: e.to_string(),
                });
                continue;
            }
        }

        match std::fs::remove_file(&removal.path) {
            Ok(()) => {
                info!("Deleted old file: {}", label);
                report.removed.push(label);
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", label, e);
                report.failures.push(InstallerError::Cleanup {
                    path: label,
                    reason: e.to_string(),
                });
            }
        }
    }

    report
}
