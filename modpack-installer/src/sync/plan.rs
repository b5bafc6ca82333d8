//! Transfer planning: which manifest entries must be downloaded.

use std::path::Path;

use crate::manifest::snapshot::ServerSnapshot;
use crate::manifest::{ModpackManifest, ResolvedEntry};
use crate::sync::freshness::{needs_fetch, FetchReason};

/// One entry scheduled for download.
#[derive(Debug, Clone)]
pub struct PlannedTransfer {
    pub entry: ResolvedEntry,
    pub reason: FetchReason,
}

/// Ordered set of entries to fetch in this run.
#[derive(Debug, Clone, Default)]
pub struct TransferPlan {
    pub items: Vec<PlannedTransfer>,
    /// Entries inspected while planning
    pub considered: usize,
}

impl TransferPlan {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Sum of manifest-declared sizes.
    pub fn total_bytes(&self) -> u64 {
        self.items.iter().map(|item| item.entry.size).sum()
    }
}

/// Compare every applicable manifest entry against disk and the snapshot.
///
/// Without a snapshot every present timestamp-checked file is assumed fresh.
/// Reads file metadata only; never mutates anything.
pub fn plan_transfers(
    manifest: &ModpackManifest,
    snapshot: Option<&ServerSnapshot>,
    root: &Path,
    profile: &str,
) -> TransferPlan {
    let mut plan = TransferPlan::default();

    for entry in manifest.entries(root, profile) {
        plan.considered += 1;
        let snapshot_entry = snapshot.and_then(|s| s.lookup(&entry.snapshot_key));
        if let Some(reason) = needs_fetch(&entry.local_path, entry.freshness_rule(), snapshot_entry) {
            plan.items.push(PlannedTransfer { entry, reason });
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::tests::sample_manifest;
    use crate::manifest::Category;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn touch(path: &Path, modified: u64) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, b"x")?;
        let file = fs::File::options().write(true).open(path)?;
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(modified))
    }

    fn snapshot_with(entries: &[(&str, i64)]) -> ServerSnapshot {
        let files: Vec<_> = entries
            .iter()
            .map(|(path, modified)| {
                serde_json::json!({"path": path, "url": "", "size": 1,
                                   "modified": modified, "modified_iso": ""})
            })
            .collect();
        serde_json::from_value(serde_json::json!({"timestamp": 1, "files": files})).unwrap()
    }

    #[test]
    fn test_empty_root_plans_everything_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = sample_manifest();

        let plan = plan_transfers(&manifest, None, temp_dir.path(), "tlauncher");

        let categories: Vec<_> = plan.items.iter().map(|i| i.entry.category).collect();
        assert_eq!(
            categories,
            vec![
                Category::Mods,
                Category::Mods,
                Category::Config,
                Category::ShaderPacks,
                Category::Core,
                Category::Core,
            ]
        );
        assert!(plan.items.iter().all(|i| i.reason == FetchReason::Missing));
        assert_eq!(plan.total_bytes(), 10 + 5 + 3 + 7 + 2 + 2);
        assert_eq!(plan.considered, 6);
    }

    #[test]
    fn test_config_scenario_stale_then_fresh() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        let manifest = sample_manifest();
        let snapshot = snapshot_with(&[("config/ui/opts.json", 1000)]);
        let opts = root.join("config").join("ui").join("opts.json");

        let plan = plan_transfers(&manifest, Some(&snapshot), root, "tlauncher");
        assert!(plan.items.iter().any(|i| i.entry.local_path == opts));

        touch(&opts, 999)?;
        let plan = plan_transfers(&manifest, Some(&snapshot), root, "tlauncher");
        assert!(plan.items.iter().any(|i| i.entry.local_path == opts));

        touch(&opts, 1000)?;
        let plan = plan_transfers(&manifest, Some(&snapshot), root, "tlauncher");
        assert!(!plan.items.iter().any(|i| i.entry.local_path == opts));
        Ok(())
    }

    #[test]
    fn test_present_without_snapshot_entry_not_refetched() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        let manifest = sample_manifest();
        touch(&root.join("shaderpacks").join("shade.zip"), 1)?;

        let snapshot = snapshot_with(&[]);
        let plan = plan_transfers(&manifest, Some(&snapshot), root, "tlauncher");
        assert!(!plan
            .items
            .iter()
            .any(|i| i.entry.category == Category::ShaderPacks));

        let plan = plan_transfers(&manifest, None, root, "tlauncher");
        assert!(!plan
            .items
            .iter()
            .any(|i| i.entry.category == Category::ShaderPacks));
        Ok(())
    }

    #[test]
    fn test_registry_mod_present_never_refetched() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        let manifest = sample_manifest();
        touch(&root.join("mods").join("foo-1.0.jar"), 1)?;
        touch(&root.join("mods").join("custom.jar"), 1)?;

        let snapshot = snapshot_with(&[("mods/foo-1.0.jar", 5000), ("mods/custom.jar", 5000)]);
        let plan = plan_transfers(&manifest, Some(&snapshot), root, "tlauncher");

        let mods: Vec<_> = plan
            .items
            .iter()
            .filter(|i| i.entry.category == Category::Mods)
            .map(|i| i.entry.filename.as_str())
            .collect();
        assert_eq!(mods, vec!["custom.jar"]);
        Ok(())
    }

    #[test]
    fn test_profile_gating_in_plan() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = sample_manifest();

        let plan = plan_transfers(&manifest, None, temp_dir.path(), "other");
        let core: Vec<_> = plan
            .items
            .iter()
            .filter(|i| i.entry.category == Category::Core)
            .map(|i| i.entry.filename.as_str())
            .collect();
        assert_eq!(core, vec!["shared.json"]);
    }
}
