// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Layout sizing and the "next snapshot fits" invariant.
//!
//! One knob (`reserve`) sizes everything: the backing image takes whatever
//! the host volume has left, and the cam disk gets half of the usable space
//! inside it. The other half is the snapshot budget, which bounds the
//! worst case of a fully-diverged reflink copy, so one live snapshot always
//! coexists with the live cam disk.

use camsink_adapters::fs::Fs;
use thiserror::Error;
use tracing::debug;

use crate::manager::{SnapshotError, SnapshotManager};

/// Fraction of the backing image lost to XFS metadata, in percent.
const XFS_OVERHEAD_PCT: u64 = 3;

const MIB: u64 = 1024 * 1024;

/// Errors from space management
#[derive(Debug, Error)]
pub enum SpaceError {
    #[error("reserve of {reserve} bytes leaves no usable space out of {available} available")]
    ReserveTooLarge { available: u64, reserve: u64 },
    #[error("backing image of {backing} bytes is too small for any cam disk")]
    BackingTooSmall { backing: u64 },
    #[error("cannot satisfy space invariant: {free} bytes free, {needed} needed")]
    NoSpace { free: u64, needed: u64 },
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Derived sizes for the storage layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Size of the sparse XFS backing image.
    pub backing_image_bytes: u64,
    /// Size of `cam_disk.bin`; also the snapshot budget.
    pub cam_bytes: u64,
}

impl Layout {
    /// Derive the layout from the host's available bytes and the reserve
    /// knob. The cam size is halved usable space, aligned down to a MiB.
    pub fn compute(available_bytes: u64, reserve: u64) -> Result<Self, SpaceError> {
        let backing_image_bytes =
            available_bytes
                .checked_sub(reserve)
                .ok_or(SpaceError::ReserveTooLarge {
                    available: available_bytes,
                    reserve,
                })?;

        Self::from_backing(backing_image_bytes)
    }

    /// Re-derive the cam size from an existing backing image, so a restart
    /// agrees with the layout chosen at first boot.
    pub fn from_backing(backing_image_bytes: u64) -> Result<Self, SpaceError> {
        let usable = backing_image_bytes - backing_image_bytes * XFS_OVERHEAD_PCT / 100;
        let cam_bytes = usable / 2 / MIB * MIB;

        if cam_bytes == 0 {
            return Err(SpaceError::BackingTooSmall {
                backing: backing_image_bytes,
            });
        }

        Ok(Self {
            backing_image_bytes,
            cam_bytes,
        })
    }
}

/// Evict unreferenced snapshots, oldest first, until a whole new snapshot
/// fits. Fails with `NoSpace` when everything left is held and free space is
/// still short. In the normal flow the coordinator has already deleted each
/// archived snapshot and the first free-space check passes immediately.
pub fn ensure_space_for_snapshot<F: Fs>(
    manager: &SnapshotManager<F>,
    cam_bytes: u64,
) -> Result<(), SpaceError> {
    loop {
        let free = manager
            .fs()
            .free_bytes(manager.snapshots_dir())
            .map_err(SnapshotError::from)?;
        if free >= cam_bytes {
            return Ok(());
        }

        debug!(free, needed = cam_bytes, "below snapshot budget, evicting");
        if !manager.delete_oldest_if_deletable()? {
            return Err(SpaceError::NoSpace {
                free,
                needed: cam_bytes,
            });
        }
    }
}

#[cfg(test)]
#[path = "space_tests.rs"]
mod tests;
