// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot identity and entity types.
//!
//! A snapshot is a point-in-time reflink copy of the cam disk, living in its
//! own directory under `snapshots/`. Directory names are the ID zero-padded
//! to [`SnapshotId::WIDTH`] digits so that lexicographic order equals
//! creation order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Monotonic snapshot identifier, unique across restarts of one storage
/// directory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SnapshotId(pub u64);

impl SnapshotId {
    /// Zero-pad width of the on-disk directory name.
    pub const WIDTH: usize = 10;

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The directory name for this snapshot (`0000000042`).
    pub fn dir_name(&self) -> String {
        format!("{:0width$}", self.0, width = Self::WIDTH)
    }

    /// Parse an ID back out of a snapshot directory path.
    ///
    /// Returns `None` for names that are not all-decimal, so foreign
    /// directories under `snapshots/` are never mistaken for snapshots.
    pub fn try_from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        name.parse::<u64>().ok().map(Self)
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derived lifecycle state.
///
/// State is computed from the refcount rather than stored, so the two can
/// never diverge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    /// No outstanding acquisitions; eligible for deletion.
    Ready,
    /// Held by at least one archive session.
    Archiving,
}

/// An observation of one registered snapshot.
///
/// `refcount` is a copy taken under the manager lock, not a live reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: SnapshotId,
    /// Absolute path of the snapshot directory.
    pub dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub refcount: u32,
}

impl Snapshot {
    pub fn state(&self) -> SnapshotState {
        if self.refcount > 0 {
            SnapshotState::Archiving
        } else {
            SnapshotState::Ready
        }
    }

    /// Path of the reflink image inside the snapshot directory.
    pub fn image_path(&self) -> PathBuf {
        self.dir.join(IMAGE_FILE)
    }
}

/// File name of the reflink copy inside each snapshot directory.
pub const IMAGE_FILE: &str = "image.bin";

/// File name of the completion marker. Its presence witnesses a complete
/// snapshot; its contents are informational.
pub const TOC_FILE: &str = ".toc";

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
