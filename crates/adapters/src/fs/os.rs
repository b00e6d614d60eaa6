// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Production filesystem backend.

use super::{DirIter, Fs, FsError};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Real filesystem backend. Stateless; clone freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl OsFs {
    pub fn new() -> Self {
        Self
    }

    /// Sibling temp path with `.tmp` appended to the full file name, so the
    /// marker file `.toc` maps to `.toc.tmp` rather than losing its name to
    /// an extension swap.
    fn tmp_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        path.with_file_name(name)
    }
}

impl Fs for OsFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list_dir(&self, path: &Path) -> Result<DirIter, FsError> {
        let owned = path.to_path_buf();
        let entries = std::fs::read_dir(path).map_err(|e| FsError::from_io(path, e))?;
        Ok(Box::new(entries.map(move |entry| {
            entry
                .map(|e| e.path())
                .map_err(|e| FsError::from_io(&owned, e))
        })))
    }

    fn mkdir(&self, path: &Path) -> Result<(), FsError> {
        std::fs::create_dir(path).map_err(|e| FsError::from_io(path, e))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        std::fs::rename(from, to).map_err(|e| FsError::from_io(from, e))
    }

    fn unlink_file(&self, path: &Path) -> Result<(), FsError> {
        std::fs::remove_file(path).map_err(|e| FsError::from_io(path, e))
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        std::fs::read(path).map_err(|e| FsError::from_io(path, e))
    }

    fn rmdir_recursive(&self, path: &Path) -> Result<(), FsError> {
        match std::fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            // Already gone, including a racing removal of the last entry.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FsError::from_io(path, e)),
        }
    }

    fn reflink_copy(&self, src: &Path, dst: &Path) -> Result<u64, FsError> {
        if !src.exists() {
            return Err(FsError::NotFound(src.to_path_buf()));
        }
        reflink::reflink(src, dst).map_err(|e| FsError::from_io(dst, e))?;
        let meta = std::fs::metadata(dst).map_err(|e| FsError::from_io(dst, e))?;
        Ok(meta.len())
    }

    fn write_file_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), FsError> {
        let tmp = Self::tmp_path(path);

        {
            let mut file = File::create(&tmp).map_err(|e| FsError::from_io(&tmp, e))?;
            file.write_all(bytes).map_err(|e| FsError::from_io(&tmp, e))?;
            file.sync_all().map_err(|e| FsError::from_io(&tmp, e))?;
        }

        std::fs::rename(&tmp, path).map_err(|e| FsError::from_io(path, e))?;

        if let Some(parent) = path.parent() {
            self.fsync_dir(parent)?;
        }
        Ok(())
    }

    fn fsync_dir(&self, path: &Path) -> Result<(), FsError> {
        let dir = File::open(path).map_err(|e| FsError::from_io(path, e))?;
        dir.sync_all().map_err(|e| FsError::from_io(path, e))
    }

    fn free_bytes(&self, path: &Path) -> Result<u64, FsError> {
        fs2::available_space(path).map_err(|e| FsError::from_io(path, e))
    }
}

#[cfg(test)]
#[path = "os_tests.rs"]
mod tests;
