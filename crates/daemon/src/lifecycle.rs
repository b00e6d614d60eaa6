// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.
//!
//! Startup order matters: lock first (no second daemon may touch the
//! gadget), then layout and backing mount (fatal on failure), then the
//! reflink probe (fatal: the whole snapshot design rests on CoW copies),
//! then recovery, and the gadget attach last so the vehicle only ever sees a
//! disk the daemon is ready to snapshot.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use camsink_adapters::fs::{Fs, FsError, OsFs};
use camsink_adapters::gadget::UsbGadget;
use camsink_adapters::mount::{MountAdapter, MountError};
use camsink_adapters::subprocess::run_with_timeout;
use camsink_storage::space::SpaceError;
use camsink_storage::{Layout, SnapshotManager};
use fs2::FileExt;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::Config;

/// Timeout for mkfs invocations at first boot.
const FORMAT_TIMEOUT: Duration = Duration::from_secs(300);

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("backing image mount failed: {0}")]
    Mount(#[from] MountError),

    #[error("host filesystem does not support reflink copies")]
    ReflinkUnsupported,

    #[error("layout error: {0}")]
    Space(#[from] SpaceError),

    #[error("format failed: {0}")]
    Format(String),

    #[error("snapshot recovery failed: {0}")]
    Recovery(#[from] camsink_storage::SnapshotError),

    #[error("filesystem error: {0}")]
    Fs(#[from] FsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything startup hands to the run loop.
pub struct StartupResult {
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Derived sizes, reused by the coordinator for the space invariant.
    pub layout: Layout,
    /// Loaded snapshot manager over the real filesystem.
    pub manager: SnapshotManager<OsFs>,
    /// Configured gadget, already attached; `None` on hosts without a UDC.
    pub gadget: Option<UsbGadget>,
}

/// Start the daemon: lock, size, mount, probe, recover, attach.
pub async fn startup<M: MountAdapter>(
    config: &Config,
    mounts: &M,
) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // Acquire lock file FIRST - prevents races
    let lock_file = acquire_lock(&config.lock_path())?;

    let fs = OsFs::new();

    // Size the layout. An existing backing image wins over the knob so a
    // restart never disagrees with the sizes chosen at first boot.
    let layout = if config.backing_image.exists() {
        let len = std::fs::metadata(&config.backing_image)?.len();
        let layout = Layout::from_backing(len)?;
        info!(
            backing = layout.backing_image_bytes,
            cam = layout.cam_bytes,
            "reusing existing backing image"
        );
        layout
    } else {
        let host_volume = config
            .backing_image
            .parent()
            .unwrap_or_else(|| Path::new("/"))
            .to_path_buf();
        let available = fs.free_bytes(&host_volume)?;
        let layout = Layout::compute(available, config.reserve_bytes)?;
        info!(
            available,
            reserve = config.reserve_bytes,
            backing = layout.backing_image_bytes,
            cam = layout.cam_bytes,
            "computed storage layout"
        );
        create_backing_image(&config.backing_image, layout.backing_image_bytes).await?;
        layout
    };

    // Failure to mount the backing image is fatal and aborts startup.
    mounts
        .mount_backing(&config.backing_image, &config.mount_point)
        .await?;

    ensure_reflink_support(&fs, &config.mount_point)?;

    if !config.cam_disk_path().exists() {
        create_cam_disk(&config.cam_disk_path(), layout.cam_bytes).await?;
    }

    let manager = SnapshotManager::new(fs, config.snapshots_dir());
    let recovered = manager.load()?;
    if !recovered.is_empty() {
        info!(
            count = recovered.len(),
            "recovered snapshots from previous run"
        );
    }

    // Attach last: the vehicle sees the disk only once recovery is done.
    let gadget = config
        .gadget
        .udc
        .clone()
        .map(|udc| UsbGadget::new(config.gadget.configfs_dir(), udc));
    match &gadget {
        Some(g) => {
            if let Err(e) = g.attach(&config.cam_disk_path()) {
                warn!(error = %e, "usb gadget attach failed, continuing without gadget");
            }
        }
        None => info!("no UDC configured, usb gadget disabled"),
    }

    info!("daemon started");
    Ok(StartupResult {
        lock_file,
        layout,
        manager,
        gadget,
    })
}

/// Graceful teardown, reverse of startup. Every step is best-effort.
pub async fn teardown<M: MountAdapter>(config: &Config, mounts: &M, gadget: Option<&UsbGadget>) {
    info!("shutting down daemon...");

    if let Some(g) = gadget {
        if let Err(e) = g.detach() {
            warn!(error = %e, "usb gadget detach failed");
        }
    }

    if let Err(e) = mounts.unmount(&config.view_mount()).await {
        warn!(error = %e, "snapshot view unmount failed");
    }
    if let Err(e) = mounts.unmount(&config.mount_point).await {
        warn!(error = %e, "backing image unmount failed");
    }

    if config.lock_path().exists() {
        if let Err(e) = std::fs::remove_file(config.lock_path()) {
            warn!(error = %e, "failed to remove PID file");
        }
    }

    info!("daemon shutdown complete");
}

/// Take the exclusive PID-file lock and record our PID in it.
pub(crate) fn acquire_lock(path: &Path) -> Result<File, LifecycleError> {
    // Use OpenOptions to avoid truncating the file before we hold the lock,
    // which would wipe the running daemon's PID.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    Ok(lock_file)
}

/// Prove the mounted volume supports reflink before anything depends on it.
fn ensure_reflink_support<F: Fs>(fs: &F, dir: &Path) -> Result<(), LifecycleError> {
    let probe = dir.join(".reflink-probe");
    let copy = dir.join(".reflink-probe-copy");

    let _ = fs.unlink_file(&probe);
    let _ = fs.unlink_file(&copy);

    fs.write_file_atomic(&probe, b"probe")?;
    let result = fs.reflink_copy(&probe, &copy);

    let _ = fs.unlink_file(&probe);
    let _ = fs.unlink_file(&copy);

    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            warn!(error = %e, "reflink probe failed");
            Err(LifecycleError::ReflinkUnsupported)
        }
    }
}

/// Allocate a sparse file of the given apparent size.
pub(crate) fn create_sparse_file(path: &Path, len: u64) -> Result<(), LifecycleError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    file.set_len(len)?;
    file.sync_all()?;
    Ok(())
}

/// First-boot creation of the XFS backing image.
async fn create_backing_image(path: &Path, len: u64) -> Result<(), LifecycleError> {
    info!(path = %path.display(), len, "creating backing image");
    create_sparse_file(path, len)?;

    let mut cmd = Command::new("mkfs.xfs");
    cmd.arg("-q").arg("-f").arg(path);
    if let Err(e) = format_with(cmd, path).await {
        let _ = std::fs::remove_file(path);
        return Err(e);
    }
    Ok(())
}

/// First-boot creation of the FAT32 cam disk inside the backing mount.
async fn create_cam_disk(path: &Path, len: u64) -> Result<(), LifecycleError> {
    info!(path = %path.display(), len, "creating cam disk");
    create_sparse_file(path, len)?;

    let mut cmd = Command::new("mkfs.vfat");
    cmd.arg("-F").arg("32").arg("-n").arg("CAM").arg(path);
    if let Err(e) = format_with(cmd, path).await {
        let _ = std::fs::remove_file(path);
        return Err(e);
    }
    Ok(())
}

async fn format_with(cmd: Command, path: &Path) -> Result<(), LifecycleError> {
    let output = run_with_timeout(cmd, FORMAT_TIMEOUT, "mkfs")
        .await
        .map_err(LifecycleError::Format)?;
    if output.status.success() {
        Ok(())
    } else {
        Err(LifecycleError::Format(format!(
            "mkfs on {} exited {:?}: {}",
            path.display(),
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
