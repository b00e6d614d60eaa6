// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory filesystem for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{DirIter, Fs, FsError};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Recorded filesystem call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsCall {
    Exists(PathBuf),
    ListDir(PathBuf),
    Mkdir(PathBuf),
    Rename(PathBuf, PathBuf),
    ReadFile(PathBuf),
    UnlinkFile(PathBuf),
    RmdirRecursive(PathBuf),
    ReflinkCopy(PathBuf, PathBuf),
    WriteFileAtomic(PathBuf),
    FsyncDir(PathBuf),
    FreeBytes(PathBuf),
}

/// Which closed error kind an injected fault produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    NotFound,
    Exists,
    PermissionDenied,
    NoSpace,
    Unsupported,
    Io,
}

impl FaultKind {
    fn to_error(self, path: &Path) -> FsError {
        let p = path.to_path_buf();
        match self {
            Self::NotFound => FsError::NotFound(p),
            Self::Exists => FsError::Exists(p),
            Self::PermissionDenied => FsError::PermissionDenied(p),
            Self::NoSpace => FsError::NoSpace(p),
            Self::Unsupported => FsError::Unsupported(p),
            Self::Io => FsError::Io {
                path: p,
                source: std::io::Error::other("injected fault"),
            },
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

struct State {
    nodes: BTreeMap<PathBuf, Node>,
    calls: Vec<FsCall>,
    /// One-shot fault per operation name, consumed on the next call.
    fail_next: HashMap<&'static str, FaultKind>,
    /// When set, the next `write_file_atomic` leaves a `.tmp` behind and
    /// fails, simulating power loss between write and rename.
    torn_write: bool,
    /// Scripted `free_bytes` responses; the last value repeats.
    free_bytes: VecDeque<u64>,
}

/// In-memory filesystem with the same atomicity semantics as [`super::OsFs`]
/// plus fault-injection hooks.
#[derive(Clone)]
pub struct FakeFs {
    inner: Arc<Mutex<State>>,
}

impl Default for FakeFs {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::from("/"), Node::Dir);
        Self {
            inner: Arc::new(Mutex::new(State {
                nodes,
                calls: Vec::new(),
                fail_next: HashMap::new(),
                torn_write: false,
                free_bytes: VecDeque::from([u64::MAX]),
            })),
        }
    }
}

impl FakeFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory and any missing ancestors.
    pub fn add_dir(&self, path: &Path) {
        let mut inner = self.inner.lock();
        for ancestor in ancestors_inclusive(path) {
            inner.nodes.entry(ancestor).or_insert(Node::Dir);
        }
    }

    /// Create a file (and any missing ancestor directories).
    pub fn add_file(&self, path: &Path, bytes: &[u8]) {
        let mut inner = self.inner.lock();
        if let Some(parent) = path.parent() {
            for ancestor in ancestors_inclusive(parent) {
                inner.nodes.entry(ancestor).or_insert(Node::Dir);
            }
        }
        inner
            .nodes
            .insert(path.to_path_buf(), Node::File(bytes.to_vec()));
    }

    /// Direct peek at a file's contents, bypassing the `Fs` port.
    pub fn file_contents(&self, path: &Path) -> Option<Vec<u8>> {
        match self.inner.lock().nodes.get(path) {
            Some(Node::File(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<FsCall> {
        self.inner.lock().calls.clone()
    }

    /// Fail the next invocation of `op` (e.g. `"write_file_atomic"`) with the
    /// given kind.
    pub fn fail_next(&self, op: &'static str, kind: FaultKind) {
        self.inner.lock().fail_next.insert(op, kind);
    }

    /// Make the next `write_file_atomic` tear: the temp file is created, the
    /// rename never happens, and the call fails with `Io`.
    pub fn set_torn_write(&self) {
        self.inner.lock().torn_write = true;
    }

    /// Script successive `free_bytes` responses; the last one repeats.
    pub fn set_free_bytes(&self, values: Vec<u64>) {
        let mut inner = self.inner.lock();
        inner.free_bytes = values.into();
        if inner.free_bytes.is_empty() {
            inner.free_bytes.push_back(u64::MAX);
        }
    }
}

fn ancestors_inclusive(path: &Path) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = path.ancestors().map(Path::to_path_buf).collect();
    out.reverse();
    out
}

fn take_fault(state: &mut State, op: &'static str, path: &Path) -> Result<(), FsError> {
    if let Some(kind) = state.fail_next.remove(op) {
        return Err(kind.to_error(path));
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

impl Fs for FakeFs {
    fn exists(&self, path: &Path) -> bool {
        let mut inner = self.inner.lock();
        inner.calls.push(FsCall::Exists(path.to_path_buf()));
        inner.nodes.contains_key(path)
    }

    fn list_dir(&self, path: &Path) -> Result<DirIter, FsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(FsCall::ListDir(path.to_path_buf()));
        take_fault(&mut inner, "list_dir", path)?;

        match inner.nodes.get(path) {
            Some(Node::Dir) => {}
            _ => return Err(FsError::NotFound(path.to_path_buf())),
        }

        let children: Vec<Result<PathBuf, FsError>> = inner
            .nodes
            .keys()
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .map(Ok)
            .collect();
        Ok(Box::new(children.into_iter()))
    }

    fn mkdir(&self, path: &Path) -> Result<(), FsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(FsCall::Mkdir(path.to_path_buf()));
        take_fault(&mut inner, "mkdir", path)?;

        if inner.nodes.contains_key(path) {
            return Err(FsError::Exists(path.to_path_buf()));
        }
        match path.parent() {
            Some(parent) if matches!(inner.nodes.get(parent), Some(Node::Dir)) => {}
            _ => return Err(FsError::NotFound(path.to_path_buf())),
        }
        inner.nodes.insert(path.to_path_buf(), Node::Dir);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        let mut inner = self.inner.lock();
        inner
            .calls
            .push(FsCall::Rename(from.to_path_buf(), to.to_path_buf()));
        take_fault(&mut inner, "rename", from)?;

        if !inner.nodes.contains_key(from) {
            return Err(FsError::NotFound(from.to_path_buf()));
        }

        // Collect the subtree, drop any existing target subtree, reinsert
        // with the prefix rewritten.
        let moved: Vec<(PathBuf, Node)> = inner
            .nodes
            .iter()
            .filter(|(p, _)| p.starts_with(from))
            .map(|(p, n)| (p.clone(), n.clone()))
            .collect();
        inner.nodes.retain(|p, _| !p.starts_with(from) && !p.starts_with(to));
        for (p, node) in moved {
            let suffix = p.strip_prefix(from).unwrap_or(&p);
            inner.nodes.insert(to.join(suffix), node);
        }
        Ok(())
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(FsCall::ReadFile(path.to_path_buf()));
        take_fault(&mut inner, "read_file", path)?;

        match inner.nodes.get(path) {
            Some(Node::File(bytes)) => Ok(bytes.clone()),
            _ => Err(FsError::NotFound(path.to_path_buf())),
        }
    }

    fn unlink_file(&self, path: &Path) -> Result<(), FsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(FsCall::UnlinkFile(path.to_path_buf()));
        take_fault(&mut inner, "unlink_file", path)?;

        match inner.nodes.get(path) {
            Some(Node::File(_)) => {
                inner.nodes.remove(path);
                Ok(())
            }
            Some(Node::Dir) => Err(FsError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other("is a directory"),
            }),
            None => Err(FsError::NotFound(path.to_path_buf())),
        }
    }

    fn rmdir_recursive(&self, path: &Path) -> Result<(), FsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(FsCall::RmdirRecursive(path.to_path_buf()));
        take_fault(&mut inner, "rmdir_recursive", path)?;

        inner.nodes.retain(|p, _| !p.starts_with(path));
        Ok(())
    }

    fn reflink_copy(&self, src: &Path, dst: &Path) -> Result<u64, FsError> {
        let mut inner = self.inner.lock();
        inner
            .calls
            .push(FsCall::ReflinkCopy(src.to_path_buf(), dst.to_path_buf()));
        take_fault(&mut inner, "reflink_copy", src)?;

        let bytes = match inner.nodes.get(src) {
            Some(Node::File(bytes)) => bytes.clone(),
            _ => return Err(FsError::NotFound(src.to_path_buf())),
        };
        if inner.nodes.contains_key(dst) {
            return Err(FsError::Exists(dst.to_path_buf()));
        }
        match dst.parent() {
            Some(parent) if matches!(inner.nodes.get(parent), Some(Node::Dir)) => {}
            _ => return Err(FsError::NotFound(dst.to_path_buf())),
        }
        let len = bytes.len() as u64;
        inner.nodes.insert(dst.to_path_buf(), Node::File(bytes));
        Ok(len)
    }

    fn write_file_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), FsError> {
        let mut inner = self.inner.lock();
        inner
            .calls
            .push(FsCall::WriteFileAtomic(path.to_path_buf()));
        take_fault(&mut inner, "write_file_atomic", path)?;

        match path.parent() {
            Some(parent) if matches!(inner.nodes.get(parent), Some(Node::Dir)) => {}
            _ => return Err(FsError::NotFound(path.to_path_buf())),
        }

        if inner.torn_write {
            inner.torn_write = false;
            inner
                .nodes
                .insert(tmp_path(path), Node::File(bytes.to_vec()));
            return Err(FsError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other("torn write"),
            });
        }

        inner
            .nodes
            .insert(path.to_path_buf(), Node::File(bytes.to_vec()));
        Ok(())
    }

    fn fsync_dir(&self, path: &Path) -> Result<(), FsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(FsCall::FsyncDir(path.to_path_buf()));
        take_fault(&mut inner, "fsync_dir", path)?;

        match inner.nodes.get(path) {
            Some(Node::Dir) => Ok(()),
            _ => Err(FsError::NotFound(path.to_path_buf())),
        }
    }

    fn free_bytes(&self, path: &Path) -> Result<u64, FsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(FsCall::FreeBytes(path.to_path_buf()));
        take_fault(&mut inner, "free_bytes", path)?;

        let value = if inner.free_bytes.len() > 1 {
            inner.free_bytes.pop_front().unwrap_or(u64::MAX)
        } else {
            inner.free_bytes.front().copied().unwrap_or(u64::MAX)
        };
        Ok(value)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
