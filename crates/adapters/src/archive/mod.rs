// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archive backend port.
//!
//! The coordinator hands an adapter the read-only mounted view of a snapshot
//! and the adapter pushes new clips to the configured destination with
//! copy-if-newer semantics. Interrupted uploads are fine: the next cycle's
//! copy skips everything already present.

mod noop;
mod rclone;

pub use noop::NoopArchiver;
pub use rclone::RcloneArchiver;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{ArchiveCall, FakeArchiver};

use async_trait::async_trait;
use camsink_core::Shutdown;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Top-level directory the vehicle writes clips under.
pub const TESLACAM_DIR: &str = "TeslaCam";

/// Errors from the archive backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArchiveError {
    /// Transient (network, timeout, interrupted). The coordinator releases
    /// the snapshot and retries with a fresh one next cycle.
    #[error("recoverable archive failure: {0}")]
    Recoverable(String),
    /// Permanent (auth, configuration). Terminates the daemon.
    #[error("fatal archive failure: {0}")]
    Fatal(String),
}

/// Counters from one archive invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    /// Clip roots that were present in the snapshot and copied.
    pub roots_archived: usize,
    /// Enabled roots missing from the snapshot (vehicle never wrote them).
    pub roots_skipped: usize,
}

/// Which clip roots under `TeslaCam/` are archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRoots {
    pub saved: bool,
    pub sentry: bool,
    pub recent: bool,
    pub track_mode: bool,
}

impl Default for ClipRoots {
    fn default() -> Self {
        // Mirrors the factory configuration: event footage on, the rolling
        // hour of RecentClips off.
        Self {
            saved: true,
            sentry: true,
            recent: false,
            track_mode: false,
        }
    }
}

impl ClipRoots {
    /// Directory names of the enabled roots, in archive order.
    pub fn dirs(&self) -> Vec<&'static str> {
        let flags = [
            (self.saved, "SavedClips"),
            (self.sentry, "SentryClips"),
            (self.recent, "RecentClips"),
            (self.track_mode, "TrackModeClips"),
        ];
        flags
            .into_iter()
            .filter_map(|(on, name)| on.then_some(name))
            .collect()
    }

    pub fn none(&self) -> bool {
        self.dirs().is_empty()
    }
}

/// Port for pushing a snapshot's clips to the archive destination.
#[async_trait]
pub trait ArchiveAdapter: Clone + Send + Sync + 'static {
    /// Probe the destination root. Cheap; called in a polling loop.
    async fn is_reachable(&self) -> bool;

    /// Copy new clips from `source` (the mounted snapshot view) to the
    /// destination. Checks `cancel` between clip roots; a cancelled upload
    /// returns `Recoverable`.
    async fn archive(&self, source: &Path, cancel: &Shutdown)
        -> Result<ArchiveStats, ArchiveError>;
}

/// Poll `is_reachable` until it holds or shutdown fires.
///
/// Returns `true` when reachable, `false` when cancelled first.
pub async fn await_reachable<A: ArchiveAdapter>(
    adapter: &A,
    cancel: &Shutdown,
    poll: Duration,
) -> bool {
    loop {
        if cancel.is_triggered() {
            return false;
        }
        if adapter.is_reachable().await {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = cancel.wait() => return false,
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
