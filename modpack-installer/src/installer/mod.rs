//! Installer orchestration.
//!
//! [`Installer`] drives the lifecycle: load the manifest, check for updates,
//! install or update, remove. It owns the single-flight guard, reports
//! through a [`ProgressObserver`] and publishes its [`InstallState`] on a
//! watch channel. Filesystem scans run on the blocking pool; downloads run
//! strictly one after another.

pub mod state;
pub mod tracker;

pub use state::{CheckOutcome, InstallReport, InstallState, RemovalOutcome, StatusLabel};
pub use tracker::{OperationKind, OperationTicket, OperationTracker};

use chrono::Utc;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{InstallConfig, UpdaterConfig};
use crate::events::{InstallEvent, ProgressObserver};
use crate::manifest::{ModpackManifest, ProtectList, ResolvedEntry};
use crate::remote::RemoteSource;
use crate::sync::{execute_cleanup, plan_cleanup, plan_transfers, CleanupReport, TransferPlan};
use crate::transfer::{format_bytes, ByteCallback, Downloader, ProgressTracker};
use crate::update::{self, InstallerRelease, UpdatePaths};
use crate::utils::{InstallerError, Result};

/// Where and for which launcher profile the modpack is installed
#[derive(Debug, Clone)]
pub struct InstallSettings {
    pub target_root: PathBuf,
    pub profile: String,
    pub protect_file: String,
    /// The profile owns `target_root` outright (a per-instance version directory)
    pub dedicated: bool,
}

impl InstallSettings {
    pub fn from_config(config: &InstallConfig) -> Self {
        Self {
            target_root: config.target_root(),
            profile: config.profile.to_lowercase(),
            protect_file: config.protect_file.clone(),
            dedicated: config.is_dedicated(),
        }
    }

    /// What a removal deletes. A shared game directory only loses its mods.
    pub fn removal_root(&self) -> PathBuf {
        if self.dedicated {
            self.target_root.clone()
        } else {
            self.target_root.join("mods")
        }
    }

    /// An installation exists when both `mods/` and `config/` are present
    pub fn looks_installed(&self) -> bool {
        self.target_root.join("mods").is_dir() && self.target_root.join("config").is_dir()
    }
}

pub struct Installer<S> {
    source: S,
    downloader: Downloader,
    settings: InstallSettings,
    observer: Arc<dyn ProgressObserver>,
    tracker: OperationTracker,
    state_tx: watch::Sender<InstallState>,
    manifest: RwLock<Option<Arc<ModpackManifest>>>,
}

impl<S: RemoteSource> Installer<S> {
    pub fn new(
        source: S,
        downloader: Downloader,
        settings: InstallSettings,
        observer: Arc<dyn ProgressObserver>,
    ) -> Self {
        let (state_tx, _rx) = watch::channel(InstallState::default());
        Self {
            source,
            downloader,
            settings,
            observer,
            tracker: OperationTracker::new(),
            state_tx,
            manifest: RwLock::new(None),
        }
    }

    pub fn settings(&self) -> &InstallSettings {
        &self.settings
    }

    pub fn state(&self) -> InstallState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<InstallState> {
        self.state_tx.subscribe()
    }

    /// Manifest loaded by the last successful fetch
    pub fn manifest(&self) -> Option<Arc<ModpackManifest>> {
        self.manifest
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Installer build the manifest asks us to move to, if any
    pub fn installer_release(&self, current_version: &str) -> Option<InstallerRelease> {
        self.manifest()
            .and_then(|m| update::available_release(&m.installer, current_version))
    }

    /// Ask the running operation to stop. Returns false when idle.
    pub fn cancel(&self) -> bool {
        self.tracker.cancel()
    }

    pub fn is_busy(&self) -> bool {
        self.tracker.is_busy()
    }

    fn set_state(&self, state: InstallState) {
        debug!("Installer state: {}", state);
        self.state_tx.send_replace(state.clone());
        self.observer.on_event(InstallEvent::StateChanged(state));
    }

    fn settle(&self, label: StatusLabel) {
        self.set_state(InstallState::Idle { label });
    }

    fn status(&self, text: &str) {
        info!("{}", text);
        self.observer.on_status(text);
    }

    /// Fetch and validate the manifest, replacing the cached copy
    pub async fn load_manifest(&self) -> Result<Arc<ModpackManifest>> {
        let manifest = self.source.fetch_manifest().await?;
        manifest.validate()?;

        let manifest = Arc::new(manifest);
        *self
            .manifest
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(manifest.clone());
        Ok(manifest)
    }

    async fn ensure_manifest(&self) -> Result<Arc<ModpackManifest>> {
        match self.manifest() {
            Some(manifest) => Ok(manifest),
            None => self.load_manifest().await,
        }
    }

    /// Load the manifest and report whether the installation needs work.
    ///
    /// Returns `Ok(None)` if another operation is already running.
    pub async fn startup(&self) -> Result<Option<CheckOutcome>> {
        let Some(ticket) = self.tracker.try_begin(OperationKind::Check) else {
            return Ok(None);
        };

        let span = info_span!("startup", run_id = %Uuid::new_v4());
        async {
            let manifest = match self.load_manifest().await {
                Ok(manifest) => manifest,
                Err(e) => {
                    error!("Failed to load config: {}", e);
                    self.status("Failed to load configuration");
                    self.settle(StatusLabel::Unknown);
                    return Err(e);
                }
            };

            info!("Loaded modpack config v{}", manifest.modpack_info.version);
            info!(
                "Installer version: {}, latest: {}",
                env!("CARGO_PKG_VERSION"),
                manifest.installer.version
            );
            self.status(&format!("Ready to install v{}", manifest.modpack_info.version));

            self.run_check(&ticket, manifest).await.map(Some)
        }
        .instrument(span)
        .await
    }

    /// Compare the installation against the manifest and snapshot without
    /// changing anything.
    pub async fn check_updates(&self) -> Result<Option<CheckOutcome>> {
        let Some(ticket) = self.tracker.try_begin(OperationKind::Check) else {
            return Ok(None);
        };

        let span = info_span!("check", run_id = %Uuid::new_v4());
        async {
            let manifest = match self.ensure_manifest().await {
                Ok(manifest) => manifest,
                Err(e) => {
                    self.status("Failed to load configuration");
                    self.settle(StatusLabel::Unknown);
                    return Err(e);
                }
            };
            self.run_check(&ticket, manifest).await.map(Some)
        }
        .instrument(span)
        .await
    }

    async fn run_check(
        &self,
        ticket: &OperationTicket,
        manifest: Arc<ModpackManifest>,
    ) -> Result<CheckOutcome> {
        if !self.settings.looks_installed() {
            self.settle(StatusLabel::NotInstalled);
            return Ok(CheckOutcome::not_installed());
        }

        self.set_state(InstallState::CheckingUpdates);
        self.status("Checking for updates...");

        let snapshot = match self.source.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Update check failed: {}", e);
                self.status("Failed to check for updates");
                self.settle(StatusLabel::Unknown);
                return Err(e);
            }
        };
        if ticket.is_cancelled() {
            self.settle(StatusLabel::Unknown);
            return Err(InstallerError::Cancelled);
        }

        let plan = match self.plan(manifest, Some(snapshot)).await {
            Ok(plan) => plan,
            Err(e) => {
                self.settle(StatusLabel::Unknown);
                return Err(e);
            }
        };

        let label = if plan.is_empty() {
            StatusLabel::UpToDate
        } else {
            info!(
                "Updates found: {} file(s), {}",
                plan.len(),
                format_bytes(plan.total_bytes())
            );
            StatusLabel::UpdatesAvailable
        };
        self.status(label.message());
        self.settle(label);

        Ok(CheckOutcome {
            label,
            pending_files: plan.len(),
            pending_bytes: plan.total_bytes(),
        })
    }

    async fn plan(
        &self,
        manifest: Arc<ModpackManifest>,
        snapshot: Option<crate::manifest::ServerSnapshot>,
    ) -> Result<TransferPlan> {
        let root = self.settings.target_root.clone();
        let profile = self.settings.profile.clone();
        blocking(move || Ok(plan_transfers(&manifest, snapshot.as_ref(), &root, &profile))).await
    }

    /// Install or update the modpack.
    ///
    /// Returns `Ok(None)` if another operation is already running. Any
    /// download that exhausts its attempts ends the run; files fetched
    /// before it stay on disk, later ones are not attempted.
    pub async fn install(&self) -> Result<Option<InstallReport>> {
        let Some(ticket) = self.tracker.try_begin(OperationKind::Install) else {
            return Ok(None);
        };

        let run_id = Uuid::new_v4();
        let update = self.settings.looks_installed();
        let span = info_span!("install", %run_id, update);

        async {
            self.set_state(InstallState::Installing { update });
            self.status(if update {
                "Starting update..."
            } else {
                "Starting installation..."
            });

            match self.run_install(&ticket, run_id, update).await {
                Ok(report) => {
                    self.set_state(InstallState::Completed { update });
                    self.status(if update {
                        "Modpack updated successfully!"
                    } else {
                        "Modpack installed successfully!"
                    });
                    info!("{}", report);
                    self.settle(StatusLabel::UpToDate);
                    Ok(Some(report))
                }
                Err(e) => {
                    error!("Install run failed: {}", e);
                    self.set_state(InstallState::Failed {
                        reason: e.to_string(),
                    });
                    self.status(if update {
                        "Update failed"
                    } else {
                        "Installation failed"
                    });
                    self.settle(if self.settings.looks_installed() {
                        StatusLabel::UpdatesAvailable
                    } else {
                        StatusLabel::NotInstalled
                    });
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_install(
        &self,
        ticket: &OperationTicket,
        run_id: Uuid,
        update: bool,
    ) -> Result<InstallReport> {
        let started_at = Utc::now();
        let cancel = ticket.cancel_token();
        let manifest = self.ensure_manifest().await?;

        self.status("Checking file timestamps...");
        let snapshot = match self.source.fetch_snapshot().await {
            Ok(snapshot) => {
                info!(
                    "Loaded file info for {} server files (generated {})",
                    snapshot.len(),
                    snapshot.timestamp()
                );
                Some(snapshot)
            }
            Err(e) => {
                warn!("Server snapshot unavailable, assuming present files are current: {}", e);
                self.observer.on_event(InstallEvent::SnapshotDegraded {
                    reason: e.to_string(),
                });
                None
            }
        };
        let snapshot_degraded = snapshot.is_none();
        ensure_running(cancel)?;

        self.status("Creating directories...");
        let root = &self.settings.target_root;
        tokio::fs::create_dir_all(root).await?;
        for dir in &manifest.directories {
            tokio::fs::create_dir_all(root.join(dir)).await?;
        }

        self.status("Cleaning up old files...");
        let cleanup = self.run_cleanup(manifest.clone()).await;
        ensure_running(cancel)?;

        let plan = self.plan(manifest, snapshot).await?;
        info!(
            "{} of {} entries need downloading ({})",
            plan.len(),
            plan.considered,
            format_bytes(plan.total_bytes())
        );

        let total = plan.len();
        let mut progress = ProgressTracker::new(total, plan.total_bytes());
        if total > 0 {
            self.status("Downloading files...");
        }

        for item in &plan.items {
            ensure_running(cancel)?;
            let entry = &item.entry;

            let label = progress.begin_file(&entry.filename).label();
            self.observer.on_progress(progress.progress().completed_files, total, &label);
            debug!(
                "Fetching {} ({:?}), sha1 {} not verified",
                entry.snapshot_key, item.reason, entry.sha1
            );

            let fetched = self
                .downloader
                .fetch(
                    &entry.download_url,
                    &entry.local_path,
                    cancel,
                    Some(self.byte_callback(entry)),
                )
                .await?;
            progress.finish_file(fetched.bytes);
        }

        self.observer.on_progress(total, total, "Installation completed!");

        Ok(InstallReport {
            run_id,
            update,
            started_at,
            duration: progress.elapsed(),
            downloaded_files: progress.progress().completed_files,
            downloaded_bytes: progress.progress().transferred_bytes,
            removed_files: cleanup.removed.len(),
            cleanup_skipped: cleanup.skipped_read_only.len() + cleanup.failures.len(),
            snapshot_degraded,
        })
    }

    /// Prune orphans from `mods/` and `config/`. Never fails the run.
    async fn run_cleanup(&self, manifest: Arc<ModpackManifest>) -> CleanupReport {
        let root = self.settings.target_root.clone();
        let protect_file = self.settings.protect_file.clone();

        let result = blocking(move || {
            let protect = ProtectList::load(&root, &protect_file);
            let plan = plan_cleanup(&manifest, &root, &protect);
            Ok(execute_cleanup(&plan))
        })
        .await;

        match result {
            Ok(report) => {
                for path in &report.skipped_read_only {
                    self.observer.on_event(InstallEvent::CleanupSkipped {
                        path: path.clone(),
                        reason: "read-only".to_string(),
                    });
                }
                for failure in &report.failures {
                    if let InstallerError::Cleanup { path, reason } = failure {
                        self.observer.on_event(InstallEvent::CleanupSkipped {
                            path: path.clone(),
                            reason: reason.clone(),
                        });
                    }
                }
                report
            }
            Err(e) => {
                warn!("Cleanup skipped: {}", e);
                CleanupReport::default()
            }
        }
    }

    fn byte_callback(&self, entry: &ResolvedEntry) -> ByteCallback {
        let observer = Arc::clone(&self.observer);
        let file = entry.filename.clone();
        let total = Some(entry.size).filter(|size| *size > 0);
        Arc::new(move |transferred| observer.on_file_bytes(&file, transferred, total))
    }

    /// Delete the installation. The caller is responsible for confirming
    /// with the user first.
    pub async fn remove(&self) -> Result<Option<RemovalOutcome>> {
        let Some(_ticket) = self.tracker.try_begin(OperationKind::Remove) else {
            return Ok(None);
        };

        let span = info_span!("remove", run_id = %Uuid::new_v4());
        async {
            let path = self.settings.removal_root();
            let removed = remove_tree(&path).await;
            let outcome = match removed {
                Ok(true) => {
                    info!("Removed {}", path.display());
                    self.status("Modpack removed successfully");
                    Ok(RemovalOutcome::Removed { path })
                }
                Ok(false) => {
                    self.status("No modpack found to remove");
                    Ok(RemovalOutcome::NothingToRemove { path })
                }
                Err(e) => {
                    error!("Failed to remove modpack: {}", e);
                    self.status("Failed to remove modpack");
                    Err(InstallerError::from(e))
                }
            };

            self.settle(if self.settings.looks_installed() {
                StatusLabel::UpdatesAvailable
            } else {
                StatusLabel::NotInstalled
            });
            outcome.map(Some)
        }
        .instrument(span)
        .await
    }

    /// Download the updater and the new installer package next to the
    /// running one. Launching the updater is left to the caller.
    pub async fn prepare_self_update(
        &self,
        release: &InstallerRelease,
        config: &UpdaterConfig,
        paths: &UpdatePaths,
    ) -> Result<Option<()>> {
        let Some(ticket) = self.tracker.try_begin(OperationKind::SelfUpdate) else {
            return Ok(None);
        };

        let span = info_span!("self_update", version = %release.version);
        async {
            self.status("Preparing update...");
            match update::download_update(
                &self.downloader,
                release,
                config,
                paths,
                ticket.cancel_token(),
            )
            .await
            {
                Ok(()) => {
                    self.status("Update files downloaded");
                    Ok(Some(()))
                }
                Err(e) => {
                    error!("Failed to download update files: {}", e);
                    self.status("Update failed - ready to install");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }
}

impl<S: RemoteSource + 'static> Installer<S> {
    /// Run [`Installer::install`] on the runtime so the caller stays responsive
    pub fn spawn_install(self: &Arc<Self>) -> JoinHandle<Result<Option<InstallReport>>> {
        let installer = Arc::clone(self);
        tokio::spawn(async move { installer.install().await })
    }
}

/// Delete `path` recursively. Returns false when there was nothing there.
async fn remove_tree(path: &std::path::Path) -> std::io::Result<bool> {
    if !tokio::fs::try_exists(path).await? {
        return Ok(false);
    }
    tokio::fs::remove_dir_all(path).await?;
    Ok(true)
}

fn ensure_running(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(InstallerError::Cancelled);
    }
    Ok(())
}

/// Run filesystem work on the blocking pool
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| InstallerError::Io(std::io::Error::other(e)))?
}
