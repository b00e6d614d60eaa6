// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use camsink_adapters::fs::FakeFs;
use std::path::PathBuf;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

#[yare::parameterized(
    no_reserve_100mib = { 100 * MIB, 0, 100 * MIB, 48 * MIB },
    reserve_half = { 100 * MIB, 50 * MIB, 50 * MIB, 24 * MIB },
    sd_card_128g = { 120 * GIB, 8 * GIB, 112 * GIB, 55_623 * MIB },
)]
fn test_compute_layout(available: u64, reserve: u64, backing: u64, cam: u64) {
    let layout = Layout::compute(available, reserve).unwrap();
    assert_eq!(layout.backing_image_bytes, backing);
    assert_eq!(layout.cam_bytes, cam);
}

#[test]
fn test_from_backing_agrees_with_compute() {
    let computed = Layout::compute(100 * GIB, 10 * GIB).unwrap();
    let rederived = Layout::from_backing(computed.backing_image_bytes).unwrap();
    assert_eq!(computed, rederived);
}

#[test]
fn test_from_backing_rejects_degenerate_image() {
    assert!(matches!(
        Layout::from_backing(MIB),
        Err(SpaceError::BackingTooSmall { .. })
    ));
}

#[test]
fn test_cam_size_is_mib_aligned_and_at_most_half() {
    let layout = Layout::compute(10 * GIB + 123_457, 0).unwrap();
    assert_eq!(layout.cam_bytes % MIB, 0);
    assert!(layout.cam_bytes <= layout.backing_image_bytes / 2);
}

#[test]
fn test_reserve_larger_than_available() {
    assert!(matches!(
        Layout::compute(GIB, 2 * GIB),
        Err(SpaceError::ReserveTooLarge { .. })
    ));
}

#[test]
fn test_reserve_leaving_no_usable_space() {
    // Reserve fits, but what is left is below one MiB of cam disk.
    assert!(matches!(
        Layout::compute(GIB, GIB - MIB),
        Err(SpaceError::BackingTooSmall { .. })
    ));
}

// --- ensure_space_for_snapshot --------------------------------------------

fn mount_root() -> PathBuf {
    PathBuf::from("/mnt/camsink")
}

fn cam_disk() -> PathBuf {
    mount_root().join("cam_disk.bin")
}

fn setup() -> (FakeFs, SnapshotManager<FakeFs>) {
    let fs = FakeFs::new();
    fs.add_dir(&mount_root());
    fs.add_file(&cam_disk(), b"cam-disk-image");
    let manager = SnapshotManager::new(fs.clone(), mount_root().join("snapshots"));
    manager.load().unwrap();
    (fs, manager)
}

#[test]
fn test_returns_immediately_when_space_suffices() {
    let (fs, manager) = setup();
    manager.create(&cam_disk()).unwrap();
    fs.set_free_bytes(vec![5000]);

    ensure_space_for_snapshot(&manager, 1000).unwrap();

    // Nothing was evicted.
    assert_eq!(manager.list().len(), 1);
}

#[test]
fn test_evicts_exactly_until_space_recovers() {
    let (fs, manager) = setup();
    manager.create(&cam_disk()).unwrap();
    manager.create(&cam_disk()).unwrap();
    manager.create(&cam_disk()).unwrap();

    // One byte short, then comfortably above after the first eviction.
    fs.set_free_bytes(vec![999, 2000]);

    ensure_space_for_snapshot(&manager, 1000).unwrap();

    assert_eq!(manager.list().len(), 2);
}

#[test]
fn test_evicts_oldest_first() {
    let (fs, manager) = setup();
    let first = manager.create(&cam_disk()).unwrap();
    let second = manager.create(&cam_disk()).unwrap();
    fs.set_free_bytes(vec![0, 2000]);

    ensure_space_for_snapshot(&manager, 1000).unwrap();

    let remaining: Vec<_> = manager.list().iter().map(|s| s.id).collect();
    assert_eq!(remaining, vec![second.id]);
    assert_ne!(remaining[0], first.id);
}

#[test]
fn test_no_space_when_registry_is_empty() {
    let (fs, manager) = setup();
    fs.set_free_bytes(vec![10]);

    assert!(matches!(
        ensure_space_for_snapshot(&manager, 1000),
        Err(SpaceError::NoSpace {
            free: 10,
            needed: 1000
        })
    ));
}

#[test]
fn test_no_space_when_all_snapshots_are_held() {
    let (fs, manager) = setup();
    let snapshot = manager.create(&cam_disk()).unwrap();
    let _handle = manager.acquire(snapshot.id).unwrap();
    fs.set_free_bytes(vec![10]);

    assert!(matches!(
        ensure_space_for_snapshot(&manager, 1000),
        Err(SpaceError::NoSpace { .. })
    ));
    // The held snapshot survived.
    assert_eq!(manager.list().len(), 1);
}
