//! Modpack installer
//!
//! Installs, updates and removes a Minecraft modpack described by a remote
//! manifest.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use inquire::Confirm;
use modpack_installer::events::{EventBus, InstallEvent};
use modpack_installer::installer::{InstallSettings, InstallState, Installer, RemovalOutcome};
use modpack_installer::remote::HttpSource;
use modpack_installer::shutdown::ShutdownCoordinator;
use modpack_installer::transfer::{format_bytes, Downloader};
use modpack_installer::update::{self, UpdatePaths};
use modpack_installer::{utils, Config};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Minecraft directory (overrides config)
    #[arg(short, long, value_name = "DIR", global = true)]
    dir: Option<PathBuf>,

    /// Launcher profile, e.g. tlauncher (overrides config)
    #[arg(short, long, global = true)]
    profile: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report whether the installation is missing, current or outdated
    Check,
    /// Install the modpack, or bring an existing installation up to date
    Install,
    /// Delete the installed modpack
    Remove {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Replace this installer with the version the manifest requires
    SelfUpdate {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(dir) = args.dir {
        config.install.minecraft_dir = dir;
    }
    if let Some(profile) = args.profile {
        config.install.profile = profile;
    }

    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    if let Command::Config = args.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    tracing::info!(
        "Starting modpack-installer v{} (profile: {}, target: {})",
        env!("CARGO_PKG_VERSION"),
        config.install.profile,
        config.install.target_root().display()
    );

    let update_paths = UpdatePaths::for_current_exe(&config.updater).ok();
    if let Some(paths) = &update_paths {
        update::remove_leftover_updater(paths);
    }

    let downloader = Downloader::new(&config.transfer)?;
    let source = HttpSource::new(downloader.client().clone(), &config.source);
    let bus = EventBus::new();
    let installer = Arc::new(Installer::new(
        source,
        downloader,
        InstallSettings::from_config(&config.install),
        Arc::new(bus.clone()),
    ));

    let shutdown = ShutdownCoordinator::new();
    let signal_token = shutdown.token();
    {
        let installer = installer.clone();
        tokio::spawn(async move {
            shutdown.wait_for_signal().await;
            installer.cancel();
        });
    }

    let renderer = tokio::spawn(render_events(bus.subscribe()));

    let startup = installer.startup().await;
    let result = match args.command {
        Command::Check => startup.map(|outcome| {
            if let Some(outcome) = outcome {
                println!("{}", outcome.label.message());
                if outcome.pending_files > 0 {
                    println!(
                        "{} file(s) to download ({})",
                        outcome.pending_files,
                        format_bytes(outcome.pending_bytes)
                    );
                }
            }
        }),
        // A failed update check is no reason to skip the install itself
        Command::Install => match startup {
            Err(e) if installer.manifest().is_none() => Err(e),
            _ => run_install(&installer).await,
        },
        Command::Remove { yes } => {
            if let Err(e) = &startup {
                tracing::warn!("Continuing removal without manifest: {}", e);
            }
            run_remove(&installer, yes).await
        }
        Command::SelfUpdate { yes } => match startup {
            Err(e) if installer.manifest().is_none() => Err(e),
            _ => {
                let paths = update_paths.context("Cannot determine installer location")?;
                run_self_update(&installer, &config, &paths, yes).await?;
                Ok(())
            }
        },
        Command::Config => Ok(()),
    };

    if let Some(release) = installer.installer_release(env!("CARGO_PKG_VERSION")) {
        println!(
            "Installer v{} is available; run `modpack-installer self-update`",
            release.version
        );
    }

    signal_token.cancel();
    drop(installer);
    drop(bus);
    let _ = tokio::time::timeout(Duration::from_secs(1), renderer).await;

    result.map_err(anyhow::Error::from)
}

async fn run_install(
    installer: &Arc<Installer<HttpSource>>,
) -> modpack_installer::Result<()> {
    match installer.spawn_install().await {
        Ok(Ok(Some(report))) => {
            println!("{}", report);
            Ok(())
        }
        Ok(Ok(None)) => {
            println!("Another operation is already running");
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(join) => Err(modpack_installer::InstallerError::Io(std::io::Error::other(join))),
    }
}

async fn run_remove(
    installer: &Arc<Installer<HttpSource>>,
    yes: bool,
) -> modpack_installer::Result<()> {
    let target = installer.settings().removal_root();
    if !yes {
        let confirmed = Confirm::new(&format!(
            "Remove the modpack? This deletes everything under {}",
            target.display()
        ))
        .with_default(false)
        .prompt()
        .unwrap_or(false);
        if !confirmed {
            println!("Removal cancelled");
            return Ok(());
        }
    }

    match installer.remove().await? {
        Some(RemovalOutcome::Removed { path }) => println!("Removed {}", path.display()),
        Some(RemovalOutcome::NothingToRemove { .. }) => println!("No modpack found to remove"),
        None => println!("Another operation is already running"),
    }
    Ok(())
}

async fn run_self_update(
    installer: &Arc<Installer<HttpSource>>,
    config: &Config,
    paths: &UpdatePaths,
    yes: bool,
) -> Result<()> {
    let Some(release) = installer.installer_release(env!("CARGO_PKG_VERSION")) else {
        println!("Installer is up to date (v{})", env!("CARGO_PKG_VERSION"));
        return Ok(());
    };

    let ask = |question: String| -> bool {
        yes || Confirm::new(&question)
            .with_default(true)
            .prompt()
            .unwrap_or(false)
    };

    if !ask(format!(
        "Installer v{} is available (current v{}). Download it now?",
        release.version,
        env!("CARGO_PKG_VERSION")
    )) {
        return Ok(());
    }

    if installer
        .prepare_self_update(&release, &config.updater, paths)
        .await?
        .is_none()
    {
        bail!("Another operation is already running");
    }

    if !ask("Update files downloaded. Restart to complete the update?".to_string()) {
        return Ok(());
    }

    update::launch_updater(paths, &release.version)?;
    tracing::info!("Updater started, exiting installer...");
    std::process::exit(0);
}

/// Draw installer events as a spinner that turns into a progress bar
async fn render_events(mut events: broadcast::Receiver<InstallEvent>) {
    let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stdout());
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar.enable_steady_tick(Duration::from_millis(100));

    loop {
        match events.recv().await {
            Ok(InstallEvent::Status { message }) => bar.set_message(message),
            Ok(InstallEvent::Progress(progress)) => {
                bar.set_length(progress.total as u64);
                bar.set_position(progress.completed as u64);
                bar.set_message(progress.label);
            }
            Ok(InstallEvent::FileBytes {
                file,
                transferred,
                total,
            }) => {
                let total = total.map(format_bytes).unwrap_or_else(|| "?".to_string());
                bar.set_message(format!("{} ({} / {})", file, format_bytes(transferred), total));
            }
            Ok(InstallEvent::SnapshotDegraded { reason }) => {
                bar.println(format!("warning: server timestamps unavailable ({})", reason));
            }
            Ok(InstallEvent::CleanupSkipped { path, reason }) => {
                bar.println(format!("warning: left {} in place ({})", path, reason));
            }
            Ok(InstallEvent::StateChanged(state)) => {
                if let InstallState::Failed { reason } = &state {
                    bar.println(format!("error: {}", reason));
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("Progress display skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    bar.finish_and_clear();
}
