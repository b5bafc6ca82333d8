//! Manifest types describing the desired state of an installation.
//!
//! The manifest enumerates every file the installation should contain, grouped
//! by category. [`ModpackManifest::entries`] resolves each of them against a
//! target root into a [`ResolvedEntry`] carrying both the native on-disk path
//! and the forward-slash key used to look it up in the server snapshot.

pub mod protect;
pub mod snapshot;

pub use protect::ProtectList;
pub use snapshot::{ServerSnapshot, SnapshotEntry};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::utils::errors::{InstallerError, Result};

/// Profile tag that makes a core file apply to every profile.
pub const PROFILE_ANY: &str = "both";

/// Remote manifest document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModpackManifest {
    pub installer: InstallerInfo,
    #[serde(default)]
    pub base_download: String,
    pub modpack_info: ModpackInfo,
    #[serde(default)]
    pub directories: Vec<String>,
    #[serde(default)]
    pub modrinth_mods: Vec<RegistryMod>,
    #[serde(default)]
    pub custom_mods: Vec<CustomMod>,
    #[serde(default)]
    pub config_files: Vec<CategoryFile>,
    #[serde(default)]
    pub resource_packs: Vec<CategoryFile>,
    #[serde(default)]
    pub shader_packs: Vec<CategoryFile>,
    #[serde(default)]
    pub fabric_files: Vec<CategoryFile>,
    #[serde(default)]
    pub data_files: Vec<CategoryFile>,
    #[serde(default)]
    pub native_files: Vec<CategoryFile>,
    #[serde(default)]
    pub core_files: Vec<CoreFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerInfo {
    pub version: String,
    pub download_url: String,
    #[serde(default)]
    pub force_update: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModpackInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub minecraft_version: String,
    #[serde(default)]
    pub loader: String,
    #[serde(default)]
    pub loader_version: String,
}

/// Mod published on the mod registry; its filename is version-qualified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryMod {
    pub project_id: String,
    pub name: String,
    pub version_id: String,
    pub download_url: String,
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub sha1: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomMod {
    pub filename: String,
    pub download_url: String,
    #[serde(default)]
    pub target_path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub sha1: String,
}

/// Entry of one of the generic `*_files` category lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryFile {
    pub filename: String,
    pub download_url: String,
    #[serde(default)]
    pub target_path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub sha1: String,
    #[serde(default)]
    pub category: String,
}

/// File placed directly in the target root, gated by profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreFile {
    pub filename: String,
    pub download_url: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub sha1: String,
    #[serde(default)]
    pub required_for: Vec<String>,
}

impl CoreFile {
    pub fn applies_to(&self, profile: &str) -> bool {
        self.required_for
            .iter()
            .any(|tag| tag == profile || tag == PROFILE_ANY)
    }
}

/// Category an entry belongs to, in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Mods,
    Config,
    ResourcePacks,
    ShaderPacks,
    LoaderSupport,
    Data,
    Natives,
    Core,
}

impl Category {
    /// Directory under the target root. Core files live in the root itself.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Mods => "mods",
            Category::Config => "config",
            Category::ResourcePacks => "resourcepacks",
            Category::ShaderPacks => "shaderpacks",
            Category::LoaderSupport => ".fabric",
            Category::Data => "data",
            Category::Natives => "natives",
            Category::Core => "",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Core => write!(f, "core"),
            other => write!(f, "{}", other.dir_name().trim_start_matches('.')),
        }
    }
}

/// How freshness of a present file is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessRule {
    /// Download only when missing; the filename encodes the version.
    ExistenceOnly,
    /// Download when missing or older than the server timestamp.
    Timestamp,
}

/// Where an entry came from in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    RegistryMod,
    CustomMod,
    CategoryFile,
    Core,
}

/// A manifest entry resolved against a target root.
#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    pub kind: EntryKind,
    pub category: Category,
    pub filename: String,
    pub download_url: String,
    pub size: u64,
    pub sha1: String,
    /// Native path on disk.
    pub local_path: PathBuf,
    /// Forward-slash key into the server snapshot.
    pub snapshot_key: String,
}

impl ResolvedEntry {
    pub fn freshness_rule(&self) -> FreshnessRule {
        match self.kind {
            EntryKind::RegistryMod => FreshnessRule::ExistenceOnly,
            _ => FreshnessRule::Timestamp,
        }
    }
}

struct EntrySpec<'a> {
    kind: EntryKind,
    category: Category,
    dir: &'a str,
    target_path: &'a str,
    filename: &'a str,
    download_url: &'a str,
    size: u64,
    sha1: &'a str,
}

impl EntrySpec<'_> {
    fn resolve(&self, root: &Path) -> ResolvedEntry {
        let segments = path_segments(self.target_path);

        let mut local_path = root.to_path_buf();
        if !self.dir.is_empty() {
            local_path.push(self.dir);
        }
        for segment in &segments {
            local_path.push(segment);
        }
        local_path.push(self.filename);

        let mut key_parts: Vec<&str> = Vec::with_capacity(segments.len() + 2);
        if !self.dir.is_empty() {
            key_parts.push(self.dir);
        }
        key_parts.extend(segments.iter().copied());
        key_parts.push(self.filename);

        ResolvedEntry {
            kind: self.kind,
            category: self.category,
            filename: self.filename.to_string(),
            download_url: self.download_url.to_string(),
            size: self.size,
            sha1: self.sha1.to_string(),
            local_path,
            snapshot_key: key_parts.join("/"),
        }
    }
}

/// Split a manifest `target_path` into its non-empty components.
/// Both `/` and `\` are accepted as separators.
pub fn path_segments(target_path: &str) -> Vec<&str> {
    target_path
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

/// `target_path` and `filename` joined with forward slashes.
pub fn relative_key(target_path: &str, filename: &str) -> String {
    let mut parts = path_segments(target_path);
    parts.push(filename);
    parts.join("/")
}

impl ModpackManifest {
    /// Directory used for loader-support files (`.fabric` for Fabric packs).
    pub fn loader_dir(&self) -> String {
        let loader = self.modpack_info.loader.trim().to_lowercase();
        if loader.is_empty() {
            Category::LoaderSupport.dir_name().to_string()
        } else {
            format!(".{}", loader)
        }
    }

    /// Directory name for a category, honouring the pack's loader.
    pub fn category_dir(&self, category: Category) -> String {
        match category {
            Category::LoaderSupport => self.loader_dir(),
            other => other.dir_name().to_string(),
        }
    }

    fn category_lists(&self) -> [(Category, &[CategoryFile]); 6] {
        [
            (Category::Config, &self.config_files),
            (Category::ResourcePacks, &self.resource_packs),
            (Category::ShaderPacks, &self.shader_packs),
            (Category::LoaderSupport, &self.fabric_files),
            (Category::Data, &self.data_files),
            (Category::Natives, &self.native_files),
        ]
    }

    /// Every entry that applies to `profile`, resolved against `root`.
    ///
    /// Order: registry mods, custom mods, config, resource packs, shader packs,
    /// loader-support, data, natives, core files.
    pub fn entries<'a>(
        &'a self,
        root: &'a Path,
        profile: &'a str,
    ) -> impl Iterator<Item = ResolvedEntry> + 'a {
        let registry = self.modrinth_mods.iter().map(move |m| {
            EntrySpec {
                kind: EntryKind::RegistryMod,
                category: Category::Mods,
                dir: Category::Mods.dir_name(),
                target_path: "",
                filename: &m.filename,
                download_url: &m.download_url,
                size: m.size,
                sha1: &m.sha1,
            }
            .resolve(root)
        });

        let custom = self.custom_mods.iter().map(move |m| {
            EntrySpec {
                kind: EntryKind::CustomMod,
                category: Category::Mods,
                dir: Category::Mods.dir_name(),
                target_path: &m.target_path,
                filename: &m.filename,
                download_url: &m.download_url,
                size: m.size,
                sha1: &m.sha1,
            }
            .resolve(root)
        });

        let categorized = self
            .category_lists()
            .into_iter()
            .flat_map(move |(category, files)| {
                let dir = self.category_dir(category);
                files
                    .iter()
                    .map(move |f| {
                        EntrySpec {
                            kind: EntryKind::CategoryFile,
                            category,
                            dir: &dir,
                            target_path: &f.target_path,
                            filename: &f.filename,
                            download_url: &f.download_url,
                            size: f.size,
                            sha1: &f.sha1,
                        }
                        .resolve(root)
                    })
                    .collect::<Vec<_>>()
            });

        let core = self
            .core_files
            .iter()
            .filter(move |f| f.applies_to(profile))
            .map(move |f| {
                EntrySpec {
                    kind: EntryKind::Core,
                    category: Category::Core,
                    dir: "",
                    target_path: "",
                    filename: &f.filename,
                    download_url: &f.download_url,
                    size: f.size,
                    sha1: &f.sha1,
                }
                .resolve(root)
            });

        registry.chain(custom).chain(categorized).chain(core)
    }

    /// Filenames cleanup must keep under `mods/`.
    pub fn expected_mod_filenames(&self) -> std::collections::HashSet<String> {
        self.modrinth_mods
            .iter()
            .map(|m| m.filename.clone())
            .chain(self.custom_mods.iter().map(|m| m.filename.clone()))
            .collect()
    }

    /// Config-relative paths cleanup must keep under `config/`.
    pub fn expected_config_paths(&self) -> std::collections::HashSet<String> {
        self.config_files
            .iter()
            .map(|f| relative_key(&f.target_path, &f.filename))
            .collect()
    }

    /// Reject entries that could resolve outside the target root.
    pub fn validate(&self) -> Result<()> {
        for dir in &self.directories {
            check_relative("directory", dir)?;
        }

        let named = self
            .modrinth_mods
            .iter()
            .map(|m| ("", m.filename.as_str()))
            .chain(
                self.custom_mods
                    .iter()
                    .map(|m| (m.target_path.as_str(), m.filename.as_str())),
            )
            .chain(
                self.category_lists()
                    .into_iter()
                    .flat_map(|(_, files)| files.iter())
                    .map(|f| (f.target_path.as_str(), f.filename.as_str())),
            )
            .chain(self.core_files.iter().map(|f| ("", f.filename.as_str())));

        for (target_path, filename) in named {
            if filename.trim().is_empty() || filename.contains(['/', '\\']) || filename == ".." {
                return Err(InstallerError::InvalidManifest(format!(
                    "bad filename {:?}",
                    filename
                )));
            }
            check_relative("target_path", target_path)?;
        }

        Ok(())
    }

    pub fn total_entries(&self) -> usize {
        self.modrinth_mods.len()
            + self.custom_mods.len()
            + self.category_lists().iter().map(|(_, f)| f.len()).sum::<usize>()
            + self.core_files.len()
    }
}

fn check_relative(field: &str, value: &str) -> Result<()> {
    let absolute = value.starts_with(['/', '\\']) || value.chars().nth(1) == Some(':');
    let escapes = value.split(['/', '\\']).any(|s| s == "..");
    if absolute || escapes {
        return Err(InstallerError::InvalidManifest(format!(
            "{} {:?} must stay inside the installation directory",
            field, value
        )));
    }
    Ok(())
}

impl fmt::Display for ModpackManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} v{} (Minecraft {}, {} {})",
            self.modpack_info.name,
            self.modpack_info.version,
            self.modpack_info.minecraft_version,
            self.modpack_info.loader,
            self.modpack_info.loader_version
        )?;
        write!(
            f,
            "  {} registry mods, {} custom mods, {} entries total",
            self.modrinth_mods.len(),
            self.custom_mods.len(),
            self.total_entries()
        )
    }
}
