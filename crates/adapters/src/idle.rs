// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Vehicle idleness detection.
//!
//! The cam disk is snapshotted while the vehicle may still be writing, which
//! is safe, but waiting for a quiet window keeps the snapshot's RecentClips
//! boundary clean and avoids archiving a clip mid-write. Idleness is
//! observed as the newest modification time under the mount staying put.

use async_trait::async_trait;
use camsink_core::Shutdown;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::debug;

/// Port for awaiting vehicle quiescence.
#[async_trait]
pub trait IdleDetector: Send + Sync + 'static {
    /// Resolve `true` once the source has been quiet for the configured
    /// window, `false` if the shutdown signal fires first.
    async fn await_idle(&self, cancel: &Shutdown) -> bool;
}

/// Idle detector polling the newest mtime under a directory tree.
#[derive(Debug, Clone)]
pub struct MtimeIdleDetector {
    root: PathBuf,
    window: Duration,
    poll: Duration,
}

impl MtimeIdleDetector {
    pub fn new(root: PathBuf, window: Duration, poll: Duration) -> Self {
        Self { root, window, poll }
    }
}

/// Newest mtime in the tree, or `None` when the tree is empty or unreadable.
/// Read errors are skipped: the vehicle renames files while we scan.
fn newest_mtime(root: &Path) -> Option<SystemTime> {
    let mut newest: Option<SystemTime> = None;
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if meta.is_dir() {
                stack.push(path);
            } else if let Ok(mtime) = meta.modified() {
                newest = Some(newest.map_or(mtime, |n| n.max(mtime)));
            }
        }
    }
    newest
}

#[async_trait]
impl IdleDetector for MtimeIdleDetector {
    async fn await_idle(&self, cancel: &Shutdown) -> bool {
        let mut last: Option<SystemTime> = None;
        let mut stable_since = Instant::now();
        let mut first = true;

        loop {
            if cancel.is_triggered() {
                return false;
            }

            let root = self.root.clone();
            let newest = tokio::task::spawn_blocking(move || newest_mtime(&root))
                .await
                .unwrap_or(None);

            if first || newest != last {
                debug!(root = %self.root.display(), "activity observed, restarting idle window");
                last = newest;
                stable_since = Instant::now();
                first = false;
            } else if stable_since.elapsed() >= self.window {
                return true;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll) => {}
                _ = cancel.wait() => return false,
            }
        }
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeIdleDetector;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    #![cfg_attr(coverage_nightly, coverage(off))]

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Fake idle detector: resolves immediately, or blocks until cancelled.
    #[derive(Clone, Default)]
    pub struct FakeIdleDetector {
        block: bool,
        calls: Arc<AtomicUsize>,
    }

    impl FakeIdleDetector {
        /// Immediately idle.
        pub fn new() -> Self {
            Self::default()
        }

        /// Never idle; `await_idle` parks until the shutdown signal.
        pub fn blocking() -> Self {
            Self {
                block: true,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Number of `await_idle` invocations.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdleDetector for FakeIdleDetector {
        async fn await_idle(&self, cancel: &Shutdown) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.block {
                cancel.wait().await;
                return false;
            }
            !cancel.is_triggered()
        }
    }
}

#[cfg(test)]
#[path = "idle_tests.rs"]
mod tests;
