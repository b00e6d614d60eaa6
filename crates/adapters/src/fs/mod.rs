// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem port.
//!
//! The snapshot manager and space manager talk to disk exclusively through
//! this trait, so crash ordering (data before marker, marker-unlink before
//! bulk removal) can be exercised deterministically against [`FakeFs`].
//! [`OsFs`] is the production backend.

mod os;

pub use os::OsFs;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeFs, FaultKind, FsCall};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Closed failure kinds for filesystem operations.
///
/// The snapshot manager propagates these untouched; the coordinator is the
/// one place that maps them onto loop-control decisions.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(PathBuf),
    #[error("already exists: {0}")]
    Exists(PathBuf),
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("no space left on device: {0}")]
    NoSpace(PathBuf),
    #[error("unsupported operation on {0}")]
    Unsupported(PathBuf),
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FsError {
    /// Map an `std::io::Error` into the closed kind.
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            // A non-directory where a directory is expected is NotFound for
            // the port's purposes (list_dir contract).
            ErrorKind::NotFound | ErrorKind::NotADirectory => Self::NotFound(path.to_path_buf()),
            ErrorKind::AlreadyExists => Self::Exists(path.to_path_buf()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            ErrorKind::StorageFull => Self::NoSpace(path.to_path_buf()),
            ErrorKind::Unsupported => Self::Unsupported(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Lazy, finite, non-restartable listing of a directory's children.
pub type DirIter = Box<dyn Iterator<Item = Result<PathBuf, FsError>> + Send>;

/// Narrow filesystem port. All paths are absolute.
pub trait Fs: Send + Sync + 'static {
    /// True iff a directory entry exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Immediate children of `path`. Fails with `NotFound` if `path` is not
    /// a directory.
    fn list_dir(&self, path: &Path) -> Result<DirIter, FsError>;

    /// Create a directory. `Exists` if present, `NotFound` if the parent is
    /// missing.
    fn mkdir(&self, path: &Path) -> Result<(), FsError>;

    /// Atomic rename within one filesystem.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError>;

    /// Remove a regular file. `NotFound` if absent; callers on recovery
    /// paths tolerate that.
    fn unlink_file(&self, path: &Path) -> Result<(), FsError>;

    /// Full contents of a regular file.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, FsError>;

    /// Remove a directory tree. Succeeds silently if `path` is already gone
    /// and tolerates partial prior removals.
    fn rmdir_recursive(&self, path: &Path) -> Result<(), FsError>;

    /// Copy-on-write copy of `src` at `dst`. Returns the copied byte count.
    /// Fails with `Unsupported` rather than degrading to a byte copy.
    fn reflink_copy(&self, src: &Path, dst: &Path) -> Result<u64, FsError>;

    /// Write `bytes` to `<path>.tmp`, fsync the file, rename over `path`,
    /// fsync the parent directory. The rename is the durability point.
    fn write_file_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), FsError>;

    /// Durably persist directory entries.
    fn fsync_dir(&self, path: &Path) -> Result<(), FsError>;

    /// Free bytes on the filesystem containing `path`.
    fn free_bytes(&self, path: &Path) -> Result<u64, FsError>;
}
