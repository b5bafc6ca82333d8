//! Configuration management for the installer.
//!
//! Layered as built-in defaults, then an optional TOML file, then
//! `MODPACK_`-prefixed environment variables (`MODPACK_INSTALL__PROFILE`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::manifest::protect::DEFAULT_PROTECT_FILE;
use crate::transfer::RetryPolicy;
use crate::utils::{InstallerError, Result};

/// Profile that installs into its own version directory
pub const DEDICATED_PROFILE: &str = "tlauncher";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub install: InstallConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub updater: UpdaterConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Modpack manifest document
    #[serde(default = "default_manifest_url")]
    pub manifest_url: String,

    /// Server snapshot (file timestamps) document
    #[serde(default = "default_snapshot_url")]
    pub snapshot_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Game data directory
    #[serde(default = "default_minecraft_dir")]
    pub minecraft_dir: PathBuf,

    /// Launcher profile (tlauncher or a shared-directory launcher)
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Version directory name used by the dedicated profile
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// Protect-list file name, looked up in the target root
    #[serde(default = "default_protect_file")]
    pub protect_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Added to the wait before each further attempt
    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Maximum idle time between received chunks
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Helper program that swaps the installer package
    #[serde(default = "default_updater_url")]
    pub updater_url: String,

    #[serde(default = "default_updater_filename")]
    pub updater_filename: String,

    /// File name for the downloaded replacement package
    #[serde(default = "default_new_package_filename")]
    pub new_package_filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_manifest_url() -> String {
    "https://moreno.land/dl/mpack/pokecubedinstaller.json".to_string()
}

fn default_snapshot_url() -> String {
    "https://moreno.land/dl/mpack/file_info.php".to_string()
}

/// Platform default game directory
pub fn default_minecraft_dir() -> PathBuf {
    let dir = if cfg!(target_os = "windows") {
        dirs::config_dir().map(|appdata| appdata.join(".minecraft"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir().map(|support| support.join("minecraft"))
    } else {
        dirs::home_dir().map(|home| home.join(".minecraft"))
    };
    dir.unwrap_or_else(|| PathBuf::from(".minecraft"))
}

fn default_profile() -> String {
    DEDICATED_PROFILE.to_string()
}

fn default_instance_name() -> String {
    "PokeCubed".to_string()
}

fn default_protect_file() -> String {
    DEFAULT_PROTECT_FILE.to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_step_ms() -> u64 {
    2000
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_read_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

fn default_updater_url() -> String {
    "https://moreno.land/dl/mpack/updater/modpack-updater".to_string()
}

fn default_updater_filename() -> String {
    format!("modpack-updater{}", std::env::consts::EXE_SUFFIX)
}

fn default_new_package_filename() -> String {
    format!("modpack-installer-new{}", std::env::consts::EXE_SUFFIX)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            manifest_url: default_manifest_url(),
            snapshot_url: default_snapshot_url(),
        }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            minecraft_dir: default_minecraft_dir(),
            profile: default_profile(),
            instance_name: default_instance_name(),
            protect_file: default_protect_file(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_step_ms: default_backoff_step_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            updater_url: default_updater_url(),
            updater_filename: default_updater_filename(),
            new_package_filename: default_new_package_filename(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl InstallConfig {
    pub fn is_dedicated(&self) -> bool {
        self.profile.eq_ignore_ascii_case(DEDICATED_PROFILE)
    }

    /// Directory the modpack is synced into
    pub fn target_root(&self) -> PathBuf {
        if self.is_dedicated() {
            self.minecraft_dir.join("versions").join(&self.instance_name)
        } else {
            self.minecraft_dir.clone()
        }
    }
}

impl TransferConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.backoff_step_ms),
        )
    }
}

impl Config {
    /// Load configuration: defaults, then `path` if given, then environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = ::config::Config::try_from(&Config::default()).map_err(config_error)?;
        let mut builder = ::config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Toml)
                    .required(true),
            );
        }

        let config = builder
            .add_source(
                ::config::Environment::with_prefix("MODPACK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|layered| layered.try_deserialize())
            .map_err(config_error)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(config_error)
    }
}

fn config_error(e: impl std::fmt::Display) -> InstallerError {
    InstallerError::Config(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.install.profile, "tlauncher");
        assert_eq!(config.install.protect_file, "dontdelete.txt");
        assert_eq!(config.transfer.max_attempts, 3);
        assert_eq!(config.transfer.connect_timeout_secs, 30);
        assert_eq!(config.transfer.read_timeout_secs, 60);
        assert_eq!(
            config.transfer.retry_policy().delay_before(3),
            Duration::from_secs(4)
        );
    }

    #[test]
    fn test_target_root_per_profile() {
        let mut install = InstallConfig {
            minecraft_dir: PathBuf::from("/games/mc"),
            ..InstallConfig::default()
        };
        assert_eq!(
            install.target_root(),
            PathBuf::from("/games/mc/versions/PokeCubed")
        );

        install.profile = "legacy".to_string();
        assert_eq!(install.target_root(), PathBuf::from("/games/mc"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("installer.toml");
        std::fs::write(
            &path,
            "[install]\nprofile = \"legacy\"\n\n[transfer]\nmax_attempts = 5\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.install.profile, "legacy");
        assert_eq!(config.install.instance_name, "PokeCubed");
        assert_eq!(config.transfer.max_attempts, 5);
        assert_eq!(config.transfer.backoff_step_ms, 2000);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        assert!(Config::load(Some(&temp.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("[install]"));

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dump.toml");
        std::fs::write(&path, text).unwrap();
        let reloaded = Config::load(Some(&path)).unwrap();
        assert_eq!(reloaded.install.profile, config.install.profile);
        assert_eq!(reloaded.source.manifest_url, config.source.manifest_url);
    }
}
