// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rclone-backed archive adapter.
//!
//! Each enabled clip root is pushed with `rclone copy --update`, which skips
//! files already present and newer at the destination. That idempotence is
//! what makes release-without-delete after a failed cycle cheap: the next
//! cycle re-copies only what is missing.

use super::{ArchiveAdapter, ArchiveError, ArchiveStats, ClipRoots, TESLACAM_DIR};
use crate::subprocess::{run_cancellable, run_with_timeout, CommandOutcome, REACHABILITY_TIMEOUT};
use async_trait::async_trait;
use camsink_core::Shutdown;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// rclone's "fatal error - retries will not help" exit code.
const RCLONE_EXIT_FATAL: i32 = 7;

/// Archive adapter invoking the `rclone` binary.
#[derive(Debug, Clone)]
pub struct RcloneArchiver {
    /// rclone remote name (the part before the colon).
    remote: String,
    /// Path under the remote that receives the clip roots.
    dest_path: String,
    roots: ClipRoots,
}

impl RcloneArchiver {
    pub fn new(remote: impl Into<String>, dest_path: impl Into<String>, roots: ClipRoots) -> Self {
        Self {
            remote: remote.into(),
            dest_path: dest_path.into(),
            roots,
        }
    }

    fn destination(&self, root: &str) -> String {
        format!("{}:{}/{}", self.remote, self.dest_path, root)
    }

    fn destination_root(&self) -> String {
        format!("{}:{}", self.remote, self.dest_path)
    }
}

/// Map an rclone exit into the recoverable/fatal split.
///
/// Exit code 7 is rclone's own "retries will not help" class; everything
/// else non-zero (network, partial transfer, rate limit) is worth retrying
/// on a later cycle.
fn classify_exit(code: Option<i32>, stderr: &str) -> ArchiveError {
    let detail = stderr_tail(stderr);
    match code {
        Some(RCLONE_EXIT_FATAL) => ArchiveError::Fatal(format!("rclone fatal error: {detail}")),
        Some(code) => ArchiveError::Recoverable(format!("rclone exited {code}: {detail}")),
        None => ArchiveError::Recoverable("rclone killed by signal".to_string()),
    }
}

/// Last non-empty stderr line, bounded, for error messages.
fn stderr_tail(stderr: &str) -> String {
    let line = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("");
    let mut tail: String = line.chars().take(200).collect();
    if tail.is_empty() {
        tail.push_str("(no stderr)");
    }
    tail
}

#[async_trait]
impl ArchiveAdapter for RcloneArchiver {
    async fn is_reachable(&self) -> bool {
        let mut cmd = Command::new("rclone");
        cmd.arg("lsd")
            .arg("--max-depth")
            .arg("1")
            .arg(self.destination_root());

        match run_with_timeout(cmd, REACHABILITY_TIMEOUT, "rclone lsd").await {
            Ok(output) => output.status.success(),
            Err(msg) => {
                debug!(error = %msg, "reachability probe failed");
                false
            }
        }
    }

    async fn archive(
        &self,
        source: &Path,
        cancel: &Shutdown,
    ) -> Result<ArchiveStats, ArchiveError> {
        let mut stats = ArchiveStats::default();

        for root in self.roots.dirs() {
            if cancel.is_triggered() {
                return Err(ArchiveError::Recoverable("archive cancelled".to_string()));
            }

            let src = source.join(TESLACAM_DIR).join(root);
            if !src.exists() {
                debug!(root, "clip root absent in snapshot, skipping");
                stats.roots_skipped += 1;
                continue;
            }

            let dest = self.destination(root);
            info!(root, dest = %dest, "archiving clip root");

            let mut cmd = Command::new("rclone");
            cmd.arg("copy").arg("--update").arg(&src).arg(&dest);

            match run_cancellable(cmd, cancel, "rclone copy").await {
                // Spawn failure: rclone missing or unusable. No later cycle
                // will fare better.
                Err(msg) => return Err(ArchiveError::Fatal(msg)),
                Ok(CommandOutcome::Cancelled) => {
                    warn!(root, "archive cancelled mid-upload");
                    return Err(ArchiveError::Recoverable("archive cancelled".to_string()));
                }
                Ok(CommandOutcome::Completed { status, stderr }) => {
                    if status.success() {
                        stats.roots_archived += 1;
                    } else {
                        return Err(classify_exit(status.code(), &stderr));
                    }
                }
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
#[path = "rclone_tests.rs"]
mod tests;
