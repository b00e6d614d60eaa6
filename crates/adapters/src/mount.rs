// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loop-mount collaborator.
//!
//! Two uses: the XFS backing image mounted read-write at startup (fatal if it
//! fails), and a snapshot's `image.bin` mounted read-only as the archive
//! view for the duration of one upload.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

use crate::subprocess::{run_with_timeout, MOUNT_TIMEOUT};

/// Errors from mount operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MountError {
    #[error("mount failed: {0}")]
    Mount(String),
    #[error("unmount failed: {0}")]
    Unmount(String),
}

/// Port for mounting images.
#[async_trait]
pub trait MountAdapter: Clone + Send + Sync + 'static {
    /// Loop-mount the backing image read-write.
    async fn mount_backing(&self, image: &Path, mountpoint: &Path) -> Result<(), MountError>;

    /// Loop-mount a snapshot image read-only.
    async fn mount_view(&self, image: &Path, mountpoint: &Path) -> Result<(), MountError>;

    /// Unmount. Succeeds if the target is not mounted.
    async fn unmount(&self, mountpoint: &Path) -> Result<(), MountError>;
}

/// Mount adapter shelling out to mount(8)/umount(8).
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopMount;

impl LoopMount {
    pub fn new() -> Self {
        Self
    }

    async fn mount(image: &Path, mountpoint: &Path, options: &str) -> Result<(), MountError> {
        std::fs::create_dir_all(mountpoint)
            .map_err(|e| MountError::Mount(format!("{}: {}", mountpoint.display(), e)))?;

        let mut cmd = Command::new("mount");
        cmd.arg("-o").arg(options).arg(image).arg(mountpoint);

        let output = run_with_timeout(cmd, MOUNT_TIMEOUT, "mount")
            .await
            .map_err(MountError::Mount)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(MountError::Mount(String::from_utf8_lossy(&output.stderr).trim().to_string()))
        }
    }
}

#[async_trait]
impl MountAdapter for LoopMount {
    async fn mount_backing(&self, image: &Path, mountpoint: &Path) -> Result<(), MountError> {
        Self::mount(image, mountpoint, "loop").await
    }

    async fn mount_view(&self, image: &Path, mountpoint: &Path) -> Result<(), MountError> {
        Self::mount(image, mountpoint, "loop,ro").await
    }

    async fn unmount(&self, mountpoint: &Path) -> Result<(), MountError> {
        let mut cmd = Command::new("umount");
        cmd.arg(mountpoint);

        let output = run_with_timeout(cmd, MOUNT_TIMEOUT, "umount")
            .await
            .map_err(MountError::Unmount)?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Idempotent contract: unmounting an unmounted target is fine.
        if stderr.contains("not mounted") {
            return Ok(());
        }
        Err(MountError::Unmount(stderr.trim().to_string()))
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeMount, MountCall};

#[cfg(any(test, feature = "test-support"))]
mod fake {
    #![cfg_attr(coverage_nightly, coverage(off))]

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Arc;

    /// Recorded mount call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum MountCall {
        Backing { image: PathBuf, mountpoint: PathBuf },
        View { image: PathBuf, mountpoint: PathBuf },
        Unmount { mountpoint: PathBuf },
    }

    struct State {
        calls: Vec<MountCall>,
        fail_next: HashMap<&'static str, String>,
    }

    /// Fake mount adapter recording calls, with per-operation fault hooks.
    #[derive(Clone)]
    pub struct FakeMount {
        inner: Arc<Mutex<State>>,
    }

    impl Default for FakeMount {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(State {
                    calls: Vec::new(),
                    fail_next: HashMap::new(),
                })),
            }
        }
    }

    impl FakeMount {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the next invocation of `op` (`"mount_backing"`, `"mount_view"`,
        /// `"unmount"`).
        pub fn fail_next(&self, op: &'static str, message: impl Into<String>) {
            self.inner.lock().fail_next.insert(op, message.into());
        }

        pub fn calls(&self) -> Vec<MountCall> {
            self.inner.lock().calls.clone()
        }
    }

    #[async_trait]
    impl MountAdapter for FakeMount {
        async fn mount_backing(&self, image: &Path, mountpoint: &Path) -> Result<(), MountError> {
            let mut inner = self.inner.lock();
            inner.calls.push(MountCall::Backing {
                image: image.to_path_buf(),
                mountpoint: mountpoint.to_path_buf(),
            });
            if let Some(msg) = inner.fail_next.remove("mount_backing") {
                return Err(MountError::Mount(msg));
            }
            Ok(())
        }

        async fn mount_view(&self, image: &Path, mountpoint: &Path) -> Result<(), MountError> {
            let mut inner = self.inner.lock();
            inner.calls.push(MountCall::View {
                image: image.to_path_buf(),
                mountpoint: mountpoint.to_path_buf(),
            });
            if let Some(msg) = inner.fail_next.remove("mount_view") {
                return Err(MountError::Mount(msg));
            }
            Ok(())
        }

        async fn unmount(&self, mountpoint: &Path) -> Result<(), MountError> {
            let mut inner = self.inner.lock();
            inner.calls.push(MountCall::Unmount {
                mountpoint: mountpoint.to_path_buf(),
            });
            if let Some(msg) = inner.fail_next.remove("unmount") {
                return Err(MountError::Unmount(msg));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "mount_tests.rs"]
mod tests;
