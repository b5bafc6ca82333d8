//! Self-update of the installer itself.
//!
//! The running package cannot replace itself, so a small updater program is
//! downloaded next to it together with the new package. The updater is then
//! started with three positional arguments (new package, current package,
//! target version) and this process exits so the swap can happen.

use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::UpdaterConfig;
use crate::manifest::InstallerInfo;
use crate::transfer::Downloader;
use crate::utils::{InstallerError, Result};

/// A newer installer build the manifest asks us to switch to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerRelease {
    pub version: String,
    pub download_url: String,
}

/// Offered only when the manifest forces it and the version differs.
pub fn available_release(info: &InstallerInfo, current_version: &str) -> Option<InstallerRelease> {
    if !info.force_update || info.version.trim() == current_version {
        return None;
    }
    if info.download_url.trim().is_empty() {
        warn!(
            "Installer v{} is advertised without a download URL",
            info.version
        );
        return None;
    }
    Some(InstallerRelease {
        version: info.version.clone(),
        download_url: info.download_url.clone(),
    })
}

/// Files taking part in an update, all in the installer's own directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePaths {
    pub current_package: PathBuf,
    pub new_package: PathBuf,
    pub updater: PathBuf,
}

impl UpdatePaths {
    pub fn beside(current_package: PathBuf, config: &UpdaterConfig) -> Result<Self> {
        let dir = current_package
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                InstallerError::Update(format!(
                    "cannot determine directory of {}",
                    current_package.display()
                ))
            })?;
        Ok(Self {
            new_package: dir.join(&config.new_package_filename),
            updater: dir.join(&config.updater_filename),
            current_package,
        })
    }

    /// Paths next to the running executable
    pub fn for_current_exe(config: &UpdaterConfig) -> Result<Self> {
        let exe = std::env::current_exe().map_err(|e| {
            InstallerError::Update(format!("cannot determine installer location: {}", e))
        })?;
        Self::beside(exe, config)
    }
}

/// Download the updater helper and the new package
pub async fn download_update(
    downloader: &Downloader,
    release: &InstallerRelease,
    config: &UpdaterConfig,
    paths: &UpdatePaths,
    cancel: &CancellationToken,
) -> Result<()> {
    info!("Downloading updater from {}", config.updater_url);
    downloader
        .fetch(&config.updater_url, &paths.updater, cancel, None)
        .await?;
    make_executable(&paths.updater)?;

    info!("Downloading installer v{} from {}", release.version, release.download_url);
    downloader
        .fetch(&release.download_url, &paths.new_package, cancel, None)
        .await?;
    make_executable(&paths.new_package)?;

    Ok(())
}

/// Start the updater detached. The caller is expected to exit right after.
pub fn launch_updater(paths: &UpdatePaths, version: &str) -> Result<Child> {
    info!(
        "Starting updater with args: {} {} {}",
        paths.new_package.display(),
        paths.current_package.display(),
        version
    );
    Command::new(&paths.updater)
        .arg(&paths.new_package)
        .arg(&paths.current_package)
        .arg(version)
        .spawn()
        .map_err(|e| InstallerError::Update(format!("failed to start updater: {}", e)))
}

/// Delete an updater left behind by a previous update. Returns true if one was removed.
pub fn remove_leftover_updater(paths: &UpdatePaths) -> bool {
    match std::fs::remove_file(&paths.updater) {
        Ok(()) => {
            info!("Removed leftover updater {}", paths.updater.display());
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Could not remove leftover updater {}: {}", paths.updater.display(), e);
            false
        }
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::downloader::tests::{fast_downloader, spawn_server};
    use axum::routing::get;
    use axum::Router;
    use tempfile::TempDir;

    fn info(version: &str, force: bool) -> InstallerInfo {
        InstallerInfo {
            version: version.to_string(),
            download_url: "https://host/installer-new".to_string(),
            force_update: force,
        }
    }

    fn test_config(base: &str) -> UpdaterConfig {
        UpdaterConfig {
            updater_url: format!("{}/updater", base),
            updater_filename: "updater.sh".to_string(),
            new_package_filename: "installer-new".to_string(),
        }
    }

    #[test]
    fn test_release_requires_force_and_new_version() {
        assert!(available_release(&info("1.0.31", true), "1.0.31").is_none());
        assert!(available_release(&info("1.0.32", false), "1.0.31").is_none());

        let release = available_release(&info("1.0.32", true), "1.0.31").unwrap();
        assert_eq!(release.version, "1.0.32");
    }

    #[test]
    fn test_paths_beside_package() {
        let paths = UpdatePaths::beside(
            PathBuf::from("/opt/pack/modpack-installer"),
            &test_config("http://unused"),
        )
        .unwrap();
        assert_eq!(paths.updater, PathBuf::from("/opt/pack/updater.sh"));
        assert_eq!(paths.new_package, PathBuf::from("/opt/pack/installer-new"));
    }

    #[tokio::test]
    async fn test_download_update_fetches_both_files() {
        let app = Router::new()
            .route("/updater", get(|| async { "#!/bin/sh\n" }))
            .route("/installer", get(|| async { "new build" }));
        let base = spawn_server(app).await;
        let temp = TempDir::new().unwrap();
        let config = test_config(&base);
        let paths = UpdatePaths::beside(temp.path().join("modpack-installer"), &config).unwrap();
        let release = InstallerRelease {
            version: "1.0.32".to_string(),
            download_url: format!("{}/installer", base),
        };

        download_update(
            &fast_downloader(),
            &release,
            &config,
            &paths,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read_to_string(&paths.new_package).unwrap(), "new build");
        assert!(paths.updater.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_passes_three_arguments() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let paths = UpdatePaths::beside(
            temp.path().join("modpack-installer"),
            &test_config("http://unused"),
        )
        .unwrap();
        let out = temp.path().join("args.txt");
        std::fs::write(
            &paths.updater,
            format!("#!/bin/sh\necho \"$@\" > {}\n", out.display()),
        )
        .unwrap();
        std::fs::set_permissions(&paths.updater, std::fs::Permissions::from_mode(0o755)).unwrap();

        let status = launch_updater(&paths, "1.0.32").unwrap().wait().unwrap();
        assert!(status.success());

        let args = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            args.trim(),
            format!(
                "{} {} 1.0.32",
                paths.new_package.display(),
                paths.current_package.display()
            )
        );
    }

    #[test]
    fn test_remove_leftover_updater() {
        let temp = TempDir::new().unwrap();
        let paths = UpdatePaths::beside(
            temp.path().join("modpack-installer"),
            &test_config("http://unused"),
        )
        .unwrap();

        assert!(!remove_leftover_updater(&paths));
        std::fs::write(&paths.updater, b"old").unwrap();
        assert!(remove_leftover_updater(&paths));
        assert!(!paths.updater.exists());
    }
}
