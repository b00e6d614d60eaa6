// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot registry with refcounted acquisition and crash recovery.
//!
//! On-disk model: `snapshots/<id>/` holds `image.bin` (a reflink copy of the
//! cam disk) and `.toc` (the completion marker). The marker rename is the
//! linearization point of create; the marker unlink is the linearization
//! point of delete. A directory without a marker is a failed create or an
//! interrupted delete and is reaped unconditionally at the next `load`.
//!
//! Concurrency: one mutex guards the registry and the ID counter. Long I/O
//! (reflink, recursive removal) always happens outside it; the lock is held
//! only for bookkeeping transitions.

use camsink_adapters::fs::{Fs, FsError};
use camsink_core::snapshot::{IMAGE_FILE, TOC_FILE};
use camsink_core::{Snapshot, SnapshotId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::toc::{Toc, TocError};

/// Errors from snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot {0} not found")]
    NotFound(SnapshotId),
    #[error("snapshot {id} is in use (refcount {refcount})")]
    InUse { id: SnapshotId, refcount: u32 },
    #[error("TOC error: {0}")]
    Toc(#[from] TocError),
    #[error(transparent)]
    Fs(#[from] FsError),
}

struct Record {
    dir: PathBuf,
    created_at: DateTime<Utc>,
    refcount: u32,
    /// Set between the InUse check and the registry removal so a concurrent
    /// `acquire` cannot resurrect a snapshot whose marker is being unlinked.
    deleting: bool,
}

impl Record {
    fn observe(&self, id: u64) -> Snapshot {
        Snapshot {
            id: SnapshotId(id),
            dir: self.dir.clone(),
            created_at: self.created_at,
            refcount: self.refcount,
        }
    }
}

struct Registry {
    records: BTreeMap<u64, Record>,
    /// Next ID to hand out; seeded to max-on-disk + 1 by `load`.
    next_id: u64,
    /// The one permitted in-flight (markerless) directory, owned by a
    /// `create` in progress on this process.
    in_flight: Option<u64>,
}

/// Authoritative registry of on-disk snapshots.
pub struct SnapshotManager<F: Fs> {
    fs: Arc<F>,
    snapshots_dir: PathBuf,
    registry: Arc<Mutex<Registry>>,
}

impl<F: Fs> Clone for SnapshotManager<F> {
    fn clone(&self) -> Self {
        Self {
            fs: Arc::clone(&self.fs),
            snapshots_dir: self.snapshots_dir.clone(),
            registry: Arc::clone(&self.registry),
        }
    }
}

/// Scoped acquisition of one snapshot.
///
/// Holding a handle pins the snapshot: `delete` fails with `InUse` until
/// every handle is dropped. The refcount decrement runs on every exit path,
/// including panics unwinding through the holder.
pub struct SnapshotHandle {
    registry: Arc<Mutex<Registry>>,
    snapshot: Snapshot,
}

impl SnapshotHandle {
    pub fn id(&self) -> SnapshotId {
        self.snapshot.id
    }

    /// The snapshot as observed at acquisition time.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn image_path(&self) -> PathBuf {
        self.snapshot.image_path()
    }
}

impl Drop for SnapshotHandle {
    fn drop(&mut self) {
        let mut registry = self.registry.lock();
        if let Some(record) = registry.records.get_mut(&self.snapshot.id.0) {
            record.refcount = record.refcount.saturating_sub(1);
        }
    }
}

impl<F: Fs> SnapshotManager<F> {
    pub fn new(fs: F, snapshots_dir: PathBuf) -> Self {
        Self {
            fs: Arc::new(fs),
            snapshots_dir,
            registry: Arc::new(Mutex::new(Registry {
                records: BTreeMap::new(),
                next_id: 1,
                in_flight: None,
            })),
        }
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn snapshots_dir(&self) -> &Path {
        &self.snapshots_dir
    }

    /// Scan `snapshots/`, register every marker-complete directory with
    /// refcount 0, reap everything else, and seed the ID counter past the
    /// highest ID seen. Idempotent. Returns the snapshots oldest-first.
    pub fn load(&self) -> Result<Vec<Snapshot>, SnapshotError> {
        if !self.fs.exists(&self.snapshots_dir) {
            self.fs.mkdir(&self.snapshots_dir)?;
        }

        let children: Vec<PathBuf> = self
            .fs
            .list_dir(&self.snapshots_dir)?
            .collect::<Result<_, _>>()?;

        let mut records = BTreeMap::new();
        let mut max_id = 0u64;

        for child in children {
            let Some(id) = SnapshotId::try_from_path(&child) else {
                warn!(path = %child.display(), "foreign entry in snapshots dir, removing");
                self.reap(&child);
                continue;
            };

            // IDs are monotonic even across reaped partials.
            max_id = max_id.max(id.0);

            let toc_path = child.join(TOC_FILE);
            if !self.fs.exists(&toc_path) {
                info!(snapshot = %id, "reaping incomplete snapshot");
                self.fs.rmdir_recursive(&child)?;
                continue;
            }

            let parsed = self
                .fs
                .read_file(&toc_path)
                .map_err(SnapshotError::from)
                .and_then(|bytes| Toc::from_bytes(&bytes).map_err(SnapshotError::from));
            let created_at = match parsed {
                Ok(toc) => toc.created_at,
                // Presence, not content, decides validity.
                Err(e) => {
                    warn!(snapshot = %id, error = %e, "unreadable TOC, keeping snapshot");
                    Utc::now()
                }
            };

            records.insert(
                id.0,
                Record {
                    dir: child,
                    created_at,
                    refcount: 0,
                    deleting: false,
                },
            );
        }

        let loaded: Vec<Snapshot> = records.iter().map(|(id, r)| r.observe(*id)).collect();

        let mut registry = self.registry.lock();
        registry.records = records;
        registry.next_id = max_id + 1;
        registry.in_flight = None;

        info!(
            count = loaded.len(),
            next_id = registry.next_id,
            "snapshot registry loaded"
        );
        Ok(loaded)
    }

    /// Produce a new complete snapshot of `source`.
    ///
    /// Ordering: directory, image, marker (atomic), snapshot-dir fsync,
    /// parent fsync, then registration. A failure before the marker rename
    /// leaves nothing registered; the partial directory is removed
    /// best-effort here and reaped by the next `load` otherwise.
    pub fn create(&self, source: &Path) -> Result<Snapshot, SnapshotError> {
        let id = {
            let mut registry = self.registry.lock();
            if let Some(pending) = registry.in_flight {
                // At most one markerless directory may exist at a time.
                warn!(pending, "create while another create is in flight");
            }
            let id = registry.next_id;
            registry.next_id += 1;
            registry.in_flight = Some(id);
            id
        };
        let sid = SnapshotId(id);
        let dir = self.snapshots_dir.join(sid.dir_name());

        match self.create_on_disk(source, sid, &dir) {
            Ok(snapshot) => {
                let mut registry = self.registry.lock();
                registry.in_flight = None;
                registry.records.insert(
                    id,
                    Record {
                        dir: snapshot.dir.clone(),
                        created_at: snapshot.created_at,
                        refcount: 0,
                        deleting: false,
                    },
                );
                info!(snapshot = %sid, dir = %snapshot.dir.display(), "snapshot created");
                Ok(snapshot)
            }
            Err(e) => {
                if let Err(cleanup) = self.fs.rmdir_recursive(&dir) {
                    warn!(
                        snapshot = %sid,
                        error = %cleanup,
                        "failed to remove partial snapshot, next load will reap it"
                    );
                }
                self.registry.lock().in_flight = None;
                Err(e)
            }
        }
    }

    fn create_on_disk(
        &self,
        source: &Path,
        id: SnapshotId,
        dir: &Path,
    ) -> Result<Snapshot, SnapshotError> {
        self.fs.mkdir(dir)?;

        let source_size = self.fs.reflink_copy(source, &dir.join(IMAGE_FILE))?;

        let created_at = Utc::now();
        let toc = Toc::new(id, created_at, source_size);
        self.fs.write_file_atomic(&dir.join(TOC_FILE), &toc.to_bytes()?)?;

        self.fs.fsync_dir(dir)?;
        self.fs.fsync_dir(&self.snapshots_dir)?;

        Ok(Snapshot {
            id,
            dir: dir.to_path_buf(),
            created_at,
            refcount: 0,
        })
    }

    /// Increment the refcount and return a scoped handle.
    pub fn acquire(&self, id: SnapshotId) -> Result<SnapshotHandle, SnapshotError> {
        let mut registry = self.registry.lock();
        let record = registry
            .records
            .get_mut(&id.0)
            .filter(|r| !r.deleting)
            .ok_or(SnapshotError::NotFound(id))?;

        record.refcount += 1;
        let snapshot = record.observe(id.0);
        Ok(SnapshotHandle {
            registry: Arc::clone(&self.registry),
            snapshot,
        })
    }

    /// Create a snapshot of `source` and immediately acquire it.
    ///
    /// Dropping the handle releases the refcount only; deleting the snapshot
    /// after a successful archive is the coordinator's explicit move.
    pub fn snapshot_session(&self, source: &Path) -> Result<SnapshotHandle, SnapshotError> {
        let snapshot = self.create(source)?;
        self.acquire(snapshot.id)
    }

    /// Delete a snapshot. Fails with `InUse` while any handle is held.
    ///
    /// The marker unlink (made durable by the directory fsync) is the commit
    /// point: the registry entry is removed right after it, and a failure of
    /// the bulk removal only leaves an orphan for the next `load` to reap.
    pub fn delete(&self, id: SnapshotId) -> Result<(), SnapshotError> {
        let dir = {
            let mut registry = self.registry.lock();
            let record = registry
                .records
                .get_mut(&id.0)
                .filter(|r| !r.deleting)
                .ok_or(SnapshotError::NotFound(id))?;
            if record.refcount > 0 {
                return Err(SnapshotError::InUse {
                    id,
                    refcount: record.refcount,
                });
            }
            record.deleting = true;
            record.dir.clone()
        };

        let unlinked = match self.fs.unlink_file(&dir.join(TOC_FILE)) {
            Ok(()) => Ok(()),
            // Tolerated: a previous delete of this directory got as far as
            // the marker.
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        };
        let durable = unlinked.and_then(|()| self.fs.fsync_dir(&dir));

        if let Err(e) = durable {
            if let Some(record) = self.registry.lock().records.get_mut(&id.0) {
                record.deleting = false;
            }
            return Err(e.into());
        }

        self.registry.lock().records.remove(&id.0);

        if let Err(e) = self.fs.rmdir_recursive(&dir) {
            warn!(
                snapshot = %id,
                error = %e,
                "bulk removal failed after commit, next load will reap the orphan"
            );
        }

        info!(snapshot = %id, "snapshot deleted");
        Ok(())
    }

    /// Delete the oldest snapshot with refcount 0, if any.
    ///
    /// Returns `false` when every registered snapshot is held (or none
    /// exist). Used by the space manager and the coordinator's sweep.
    pub fn delete_oldest_if_deletable(&self) -> Result<bool, SnapshotError> {
        let candidate = {
            let registry = self.registry.lock();
            registry
                .records
                .iter()
                .find(|(_, r)| r.refcount == 0 && !r.deleting)
                .map(|(id, _)| SnapshotId(*id))
        };

        let Some(id) = candidate else {
            return Ok(false);
        };

        debug!(snapshot = %id, "evicting oldest deletable snapshot");
        match self.delete(id) {
            Ok(()) => Ok(true),
            // Raced with a concurrent acquire; nothing deletable after all.
            Err(SnapshotError::InUse { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Snapshots by ascending ID. Refcounts are observations taken under the
    /// registry lock, not live references.
    pub fn list(&self) -> Vec<Snapshot> {
        let registry = self.registry.lock();
        registry
            .records
            .iter()
            .map(|(id, r)| r.observe(*id))
            .collect()
    }

    /// Best-effort removal of a non-snapshot entry found during `load`.
    fn reap(&self, path: &Path) {
        if self.fs.rmdir_recursive(path).is_ok() {
            return;
        }
        if let Err(e) = self.fs.unlink_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove foreign entry");
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
