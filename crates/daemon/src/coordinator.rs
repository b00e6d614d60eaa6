// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The outer state machine.
//!
//! One loop per archive cycle:
//! IDLE → await reachable → await idle (or settle delay) → sweep →
//! ensure space → snapshot session → mount view → archive → delete.
//!
//! A recoverable archive failure releases the session without deleting; the
//! next cycle's sweep reclaims the snapshot, and the backend's copy-if-newer
//! semantics make the retry cheap. Shutdown is checked at every step
//! boundary and aborts the cycle without deleting anything.

use camsink_adapters::archive::{await_reachable, ArchiveAdapter, ArchiveError};
use camsink_adapters::fs::Fs;
use camsink_adapters::idle::IdleDetector;
use camsink_adapters::led::LedPattern;
use camsink_adapters::mount::MountAdapter;
use camsink_core::Shutdown;
use camsink_storage::space::{ensure_space_for_snapshot, SpaceError};
use camsink_storage::SnapshotManager;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Coordinator errors. Everything transient is handled inside the loop;
/// only archive failures classed as fatal escape it.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("fatal archive failure: {0}")]
    FatalArchive(String),
}

/// Tunables and paths for one coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// The live cam disk inside the backing mount.
    pub cam_disk: PathBuf,
    /// Snapshot budget; space is pre-evicted to this level before a create.
    pub cam_bytes: u64,
    /// Where a snapshot's image is loop-mounted read-only for archiving.
    pub view_mount: PathBuf,
    /// Wait after reachability when no idle detector is configured.
    pub settle_delay: Duration,
    /// Reachability poll interval, also the back-off after a failed cycle.
    pub poll: Duration,
    /// False for `archive.system = "none"`: sweep once, then park.
    pub archiving_enabled: bool,
}

/// The coordinator wires the snapshot manager to the external collaborators
/// and owns the cycle loop.
pub struct Coordinator<F, A, M, I>
where
    F: Fs,
    A: ArchiveAdapter,
    M: MountAdapter,
    I: IdleDetector,
{
    manager: SnapshotManager<F>,
    archiver: A,
    mounts: M,
    idle: Option<I>,
    shutdown: Shutdown,
    opts: CoordinatorOptions,
    led: Option<watch::Sender<LedPattern>>,
}

impl<F, A, M, I> Coordinator<F, A, M, I>
where
    F: Fs,
    A: ArchiveAdapter,
    M: MountAdapter,
    I: IdleDetector,
{
    pub fn new(
        manager: SnapshotManager<F>,
        archiver: A,
        mounts: M,
        idle: Option<I>,
        shutdown: Shutdown,
        opts: CoordinatorOptions,
    ) -> Self {
        Self {
            manager,
            archiver,
            mounts,
            idle,
            shutdown,
            opts,
            led: None,
        }
    }

    /// Attach an LED pattern channel.
    pub fn with_led(mut self, led: watch::Sender<LedPattern>) -> Self {
        self.led = Some(led);
        self
    }

    fn set_led(&self, pattern: LedPattern) {
        if let Some(led) = &self.led {
            let _ = led.send(pattern);
        }
    }

    /// Run until shutdown or a fatal archive failure.
    pub async fn run(&self) -> Result<(), CoordinatorError> {
        info!(
            cam_disk = %self.opts.cam_disk.display(),
            archiving = self.opts.archiving_enabled,
            "coordinator started"
        );

        if !self.opts.archiving_enabled {
            // Still reclaim leftovers from previous runs, then just serve
            // the gadget until told to stop.
            self.sweep().await;
            self.set_led(LedPattern::Idle);
            self.shutdown.wait().await;
            self.set_led(LedPattern::Off);
            info!("coordinator stopped");
            return Ok(());
        }

        let result = self.cycle_loop().await;

        match &result {
            Ok(()) => self.set_led(LedPattern::Off),
            Err(_) => self.set_led(LedPattern::Error),
        }
        info!("coordinator stopped");
        result
    }

    async fn cycle_loop(&self) -> Result<(), CoordinatorError> {
        while !self.shutdown.is_triggered() {
            self.set_led(LedPattern::Idle);

            // IDLE → AWAIT_IDLE
            if !await_reachable(&self.archiver, &self.shutdown, self.opts.poll).await {
                break;
            }
            info!("archive destination reachable");

            // AWAIT_IDLE → SWEEP
            if !self.settle().await {
                break;
            }

            // SWEEP
            self.sweep().await;

            // Space invariant: a whole new snapshot must fit.
            if let Err(e) = self.ensure_space().await {
                match e {
                    SpaceError::NoSpace { free, needed } => {
                        warn!(free, needed, "space invariant unsatisfiable, skipping cycle");
                    }
                    other => warn!(error = %other, "space check failed, skipping cycle"),
                }
                self.pause().await;
                continue;
            }

            // SNAPSHOT
            let session = {
                let manager = self.manager.clone();
                let cam_disk = self.opts.cam_disk.clone();
                let joined =
                    tokio::task::spawn_blocking(move || manager.snapshot_session(&cam_disk)).await;
                match joined {
                    Ok(Ok(session)) => session,
                    Ok(Err(e)) => {
                        warn!(error = %e, "snapshot failed, skipping cycle");
                        self.pause().await;
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "snapshot task died, skipping cycle");
                        self.pause().await;
                        continue;
                    }
                }
            };
            let id = session.id();

            // ARCHIVE, bracketed by the session's scoped acquisition.
            self.set_led(LedPattern::Archiving);
            let outcome = match self
                .mounts
                .mount_view(&session.image_path(), &self.opts.view_mount)
                .await
            {
                Ok(()) => {
                    let result = self
                        .archiver
                        .archive(&self.opts.view_mount, &self.shutdown)
                        .await;
                    if let Err(e) = self.mounts.unmount(&self.opts.view_mount).await {
                        warn!(error = %e, "failed to unmount snapshot view");
                    }
                    result
                }
                Err(e) => Err(ArchiveError::Recoverable(format!(
                    "snapshot view mount failed: {e}"
                ))),
            };
            drop(session);

            // DELETE on success; release-without-delete otherwise.
            match outcome {
                Ok(stats) => {
                    info!(
                        snapshot = %id,
                        roots_archived = stats.roots_archived,
                        "archive cycle complete"
                    );
                    let manager = self.manager.clone();
                    match tokio::task::spawn_blocking(move || manager.delete(id)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            warn!(snapshot = %id, error = %e, "post-archive delete failed")
                        }
                        Err(e) => warn!(snapshot = %id, error = %e, "delete task died"),
                    }
                }
                Err(ArchiveError::Recoverable(msg)) => {
                    warn!(snapshot = %id, error = %msg, "archive failed, snapshot left for sweep");
                    if self.shutdown.is_triggered() {
                        break;
                    }
                    self.pause().await;
                }
                Err(ArchiveError::Fatal(msg)) => {
                    error!(snapshot = %id, error = %msg, "fatal archive failure");
                    return Err(CoordinatorError::FatalArchive(msg));
                }
            }
        }
        Ok(())
    }

    /// Wait for the vehicle to go quiet, or for the settle delay when no
    /// idle detector is configured. Returns false on shutdown.
    async fn settle(&self) -> bool {
        match &self.idle {
            Some(idle) => idle.await_idle(&self.shutdown).await,
            None => {
                tokio::select! {
                    _ = tokio::time::sleep(self.opts.settle_delay) => true,
                    _ = self.shutdown.wait() => false,
                }
            }
        }
    }

    /// Delete every unreferenced snapshot, oldest first.
    async fn sweep(&self) {
        let manager = self.manager.clone();
        let swept = tokio::task::spawn_blocking(move || {
            let mut swept = 0u32;
            loop {
                match manager.delete_oldest_if_deletable() {
                    Ok(true) => swept += 1,
                    Ok(false) => break,
                    Err(e) => {
                        warn!(error = %e, "sweep aborted");
                        break;
                    }
                }
            }
            swept
        })
        .await
        .unwrap_or(0);

        if swept > 0 {
            info!(swept, "reclaimed leftover snapshots");
        }
    }

    async fn ensure_space(&self) -> Result<(), SpaceError> {
        let manager = self.manager.clone();
        let cam_bytes = self.opts.cam_bytes;
        match tokio::task::spawn_blocking(move || ensure_space_for_snapshot(&manager, cam_bytes))
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "space check task died");
                Ok(())
            }
        }
    }

    /// Cancellable back-off before re-entering IDLE after a failed cycle.
    async fn pause(&self) {
        tokio::select! {
            _ = tokio::time::sleep(self.opts.poll) => {}
            _ = self.shutdown.wait() => {}
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
