// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;
use std::path::PathBuf;

#[test]
fn test_dir_name_is_zero_padded() {
    assert_eq!(SnapshotId(42).dir_name(), "0000000042");
    assert_eq!(SnapshotId(0).dir_name(), "0000000000");
    assert_eq!(SnapshotId(9_999_999_999).dir_name(), "9999999999");
}

#[test]
fn test_dir_name_order_matches_id_order() {
    let ids = [1u64, 2, 9, 10, 11, 99, 100, 1_000_000];
    let mut names: Vec<String> = ids.iter().map(|i| SnapshotId(*i).dir_name()).collect();
    let sorted = names.clone();
    names.sort();
    assert_eq!(names, sorted);
}

#[yare::parameterized(
    plain = { "0000000042", Some(42) },
    unpadded = { "7", Some(7) },
    empty = { "", None },
    alpha = { "snapshot-1", None },
    mixed = { "00000a0042", None },
)]
fn test_try_from_path(name: &str, expected: Option<u64>) {
    let path = PathBuf::from("/mnt/camsink/snapshots").join(name);
    assert_eq!(
        SnapshotId::try_from_path(&path),
        expected.map(SnapshotId)
    );
}

#[test]
fn test_state_is_derived_from_refcount() {
    let mut snap = Snapshot {
        id: SnapshotId(1),
        dir: PathBuf::from("/mnt/camsink/snapshots/0000000001"),
        created_at: Utc::now(),
        refcount: 0,
    };
    assert_eq!(snap.state(), SnapshotState::Ready);

    snap.refcount = 2;
    assert_eq!(snap.state(), SnapshotState::Archiving);
}

#[test]
fn test_image_path() {
    let snap = Snapshot {
        id: SnapshotId(3),
        dir: PathBuf::from("/mnt/camsink/snapshots/0000000003"),
        created_at: Utc::now(),
        refcount: 0,
    };
    assert_eq!(
        snap.image_path(),
        PathBuf::from("/mnt/camsink/snapshots/0000000003/image.bin")
    );
}
