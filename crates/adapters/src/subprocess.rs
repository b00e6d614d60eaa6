// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use camsink_core::Shutdown;
use std::process::Output;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Default timeout for mount/umount commands.
pub const MOUNT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for the archive reachability probe.
pub const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(15);

/// How long a cancelled child gets to die after SIGKILL before we stop
/// waiting for it.
pub const KILL_GRACE: Duration = Duration::from_secs(5);

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting timeout
/// expiration into a descriptive error message. The child process is killed
/// automatically if the timeout elapses (via the tokio `Child` drop
/// implementation).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

/// Outcome of a cancellable subprocess run.
#[derive(Debug)]
pub enum CommandOutcome {
    /// The child ran to completion.
    Completed {
        status: std::process::ExitStatus,
        stderr: String,
    },
    /// The shutdown signal fired; the child was killed and reaped (bounded
    /// by [`KILL_GRACE`]).
    Cancelled,
}

/// Run a subprocess that honours the shared shutdown signal.
///
/// Used for archive uploads, which can run for minutes: an orphaned child
/// past daemon exit could keep writing partial uploads. Stderr is drained
/// concurrently so a chatty child cannot block on a full pipe.
pub async fn run_cancellable(
    mut cmd: Command,
    cancel: &Shutdown,
    description: &str,
) -> Result<CommandOutcome, String> {
    cmd.stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| format!("{} failed to spawn: {}", description, e))?;

    let stderr_task = child.stderr.take().map(|mut pipe| {
        tokio::spawn(async move {
            let mut buf = String::new();
            let _ = pipe.read_to_string(&mut buf).await;
            buf
        })
    });

    // Resolve the race first so the wait future's borrow of the child ends
    // before the cancel path needs it.
    let waited = tokio::select! {
        status = child.wait() => Some(status),
        _ = cancel.wait() => None,
    };

    match waited {
        Some(status) => {
            let status = status.map_err(|e| format!("{} failed: {}", description, e))?;
            let stderr = match stderr_task {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };
            Ok(CommandOutcome::Completed { status, stderr })
        }
        None => {
            let _ = child.start_kill();
            let _ = tokio::time::timeout(KILL_GRACE, child.wait()).await;
            Ok(CommandOutcome::Cancelled)
        }
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
