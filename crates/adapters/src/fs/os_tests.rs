// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::super::{Fs, FsError};
use super::OsFs;
use tempfile::tempdir;

#[test]
fn test_exists_and_mkdir() {
    let dir = tempdir().unwrap();
    let fs = OsFs::new();
    let sub = dir.path().join("sub");

    assert!(!fs.exists(&sub));
    fs.mkdir(&sub).unwrap();
    assert!(fs.exists(&sub));

    // Second creation fails with the closed Exists kind.
    assert!(matches!(fs.mkdir(&sub), Err(FsError::Exists(_))));
}

#[test]
fn test_mkdir_missing_parent() {
    let dir = tempdir().unwrap();
    let fs = OsFs::new();
    let nested = dir.path().join("missing").join("sub");

    assert!(matches!(fs.mkdir(&nested), Err(FsError::NotFound(_))));
}

#[test]
fn test_list_dir() {
    let dir = tempdir().unwrap();
    let fs = OsFs::new();
    fs.mkdir(&dir.path().join("a")).unwrap();
    fs.mkdir(&dir.path().join("b")).unwrap();

    let mut children: Vec<_> = fs
        .list_dir(dir.path())
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    children.sort();
    assert_eq!(children, vec![dir.path().join("a"), dir.path().join("b")]);
}

#[test]
fn test_list_dir_not_found() {
    let dir = tempdir().unwrap();
    let fs = OsFs::new();
    let missing = dir.path().join("missing");

    assert!(matches!(fs.list_dir(&missing), Err(FsError::NotFound(_))));
}

#[test]
fn test_write_file_atomic_leaves_no_tmp() {
    let dir = tempdir().unwrap();
    let fs = OsFs::new();
    let path = dir.path().join(".toc");

    fs.write_file_atomic(&path, b"{\"id\":1}").unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"{\"id\":1}");
    assert!(!dir.path().join(".toc.tmp").exists());
}

#[test]
fn test_write_file_atomic_overwrites() {
    let dir = tempdir().unwrap();
    let fs = OsFs::new();
    let path = dir.path().join("file");

    fs.write_file_atomic(&path, b"one").unwrap();
    fs.write_file_atomic(&path, b"two").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"two");
}

#[test]
fn test_read_file() {
    let dir = tempdir().unwrap();
    let fs = OsFs::new();
    let path = dir.path().join("file");
    std::fs::write(&path, b"contents").unwrap();

    assert_eq!(fs.read_file(&path).unwrap(), b"contents");
    assert!(matches!(
        fs.read_file(&dir.path().join("missing")),
        Err(FsError::NotFound(_))
    ));
}

#[test]
fn test_unlink_file() {
    let dir = tempdir().unwrap();
    let fs = OsFs::new();
    let path = dir.path().join("file");
    std::fs::write(&path, b"x").unwrap();

    fs.unlink_file(&path).unwrap();
    assert!(!path.exists());
    assert!(matches!(fs.unlink_file(&path), Err(FsError::NotFound(_))));
}

#[test]
fn test_rmdir_recursive_is_idempotent() {
    let dir = tempdir().unwrap();
    let fs = OsFs::new();
    let sub = dir.path().join("sub");
    fs.mkdir(&sub).unwrap();
    std::fs::write(sub.join("file"), b"x").unwrap();

    fs.rmdir_recursive(&sub).unwrap();
    assert!(!sub.exists());

    // Already gone: succeeds silently.
    fs.rmdir_recursive(&sub).unwrap();
}

#[test]
fn test_rename() {
    let dir = tempdir().unwrap();
    let fs = OsFs::new();
    let from = dir.path().join("from");
    let to = dir.path().join("to");
    std::fs::write(&from, b"x").unwrap();

    fs.rename(&from, &to).unwrap();
    assert!(!from.exists());
    assert_eq!(std::fs::read(&to).unwrap(), b"x");
}

#[test]
fn test_reflink_copy_missing_source() {
    let dir = tempdir().unwrap();
    let fs = OsFs::new();

    let result = fs.reflink_copy(&dir.path().join("missing"), &dir.path().join("copy"));
    assert!(matches!(result, Err(FsError::NotFound(_))));
    assert!(!dir.path().join("copy").exists());
}

#[test]
fn test_free_bytes_is_nonzero_on_tempdir() {
    let dir = tempdir().unwrap();
    let fs = OsFs::new();
    assert!(fs.free_bytes(dir.path()).unwrap() > 0);
}

#[test]
fn test_fsync_dir_missing() {
    let dir = tempdir().unwrap();
    let fs = OsFs::new();
    assert!(matches!(
        fs.fsync_dir(&dir.path().join("missing")),
        Err(FsError::NotFound(_))
    ));
}
