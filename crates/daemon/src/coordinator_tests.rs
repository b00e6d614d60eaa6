// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use camsink_adapters::archive::{ArchiveStats, FakeArchiver};
use camsink_adapters::fs::{FakeFs, FsCall};
use camsink_adapters::idle::FakeIdleDetector;
use camsink_adapters::mount::{FakeMount, MountCall};
use camsink_core::snapshot::IMAGE_FILE;

fn mount_root() -> PathBuf {
    PathBuf::from("/mnt/camsink")
}

fn cam_disk() -> PathBuf {
    mount_root().join("cam_disk.bin")
}

fn snapshot_dir(id: u64) -> PathBuf {
    mount_root().join("snapshots").join(format!("{id:010}"))
}

fn view() -> PathBuf {
    PathBuf::from("/var/lib/camsink/snapshot-view")
}

struct Harness {
    fs: FakeFs,
    manager: SnapshotManager<FakeFs>,
    archiver: FakeArchiver,
    mounts: FakeMount,
    shutdown: Shutdown,
}

fn harness() -> Harness {
    let fs = FakeFs::new();
    fs.add_dir(&mount_root());
    fs.add_file(&cam_disk(), b"cam-disk-image");
    let manager = SnapshotManager::new(fs.clone(), mount_root().join("snapshots"));
    manager.load().unwrap();
    Harness {
        fs,
        manager,
        archiver: FakeArchiver::new(),
        mounts: FakeMount::new(),
        shutdown: Shutdown::new(),
    }
}

fn coordinator(
    h: &Harness,
    archiving_enabled: bool,
) -> Coordinator<FakeFs, FakeArchiver, FakeMount, FakeIdleDetector> {
    Coordinator::new(
        h.manager.clone(),
        h.archiver.clone(),
        h.mounts.clone(),
        Some(FakeIdleDetector::new()),
        h.shutdown.clone(),
        CoordinatorOptions {
            cam_disk: cam_disk(),
            cam_bytes: 1000,
            view_mount: view(),
            settle_delay: Duration::ZERO,
            poll: Duration::from_millis(5),
            archiving_enabled,
        },
    )
}

/// Poll until `cond` holds; panics after five seconds.
async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_happy_path_archives_then_deletes() {
    let h = harness();
    // One cycle, then the destination goes dark.
    h.archiver.set_reachable_sequence(vec![true, false]);
    h.archiver.push_outcome(Ok(ArchiveStats {
        roots_archived: 2,
        roots_skipped: 0,
    }));

    let coord = coordinator(&h, true);
    let task = tokio::spawn(async move { coord.run().await });

    wait_until(|| h.archiver.archived_sources().len() == 1 && h.manager.list().is_empty()).await;
    h.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // Archive read the mounted view, never the live disk.
    assert_eq!(h.archiver.archived_sources(), vec![view()]);
    let mounts = h.mounts.calls();
    assert_eq!(
        mounts[0],
        MountCall::View {
            image: snapshot_dir(1).join(IMAGE_FILE),
            mountpoint: view(),
        }
    );
    assert_eq!(
        mounts[1],
        MountCall::Unmount {
            mountpoint: view()
        }
    );

    // Nothing left on disk or in the registry.
    assert!(!h.fs.exists(&snapshot_dir(1)));
    assert!(h.manager.list().is_empty());
}

#[tokio::test]
async fn test_recoverable_failure_is_swept_next_cycle() {
    let h = harness();
    h.archiver.set_reachable_sequence(vec![true, true, false]);
    h.archiver
        .push_outcome(Err(ArchiveError::Recoverable("network blip".to_string())));
    h.archiver.push_outcome(Ok(ArchiveStats::default()));

    let coord = coordinator(&h, true);
    let task = tokio::spawn(async move { coord.run().await });

    wait_until(|| h.archiver.archived_sources().len() == 2 && h.manager.list().is_empty()).await;
    h.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // The failed snapshot was not retried: cycle two took a fresh one.
    let views: Vec<_> = h
        .mounts
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            MountCall::View { image, .. } => Some(image),
            _ => None,
        })
        .collect();
    assert_eq!(
        views,
        vec![
            snapshot_dir(1).join(IMAGE_FILE),
            snapshot_dir(2).join(IMAGE_FILE),
        ]
    );

    // The sweep deleted snapshot 1 before snapshot 2 was created.
    let calls = h.fs.calls();
    let swept = calls
        .iter()
        .position(|c| matches!(c, FsCall::RmdirRecursive(p) if p == &snapshot_dir(1)))
        .unwrap();
    let recreated = calls
        .iter()
        .position(|c| matches!(c, FsCall::Mkdir(p) if p == &snapshot_dir(2)))
        .unwrap();
    assert!(swept < recreated);
}

#[tokio::test]
async fn test_fatal_failure_terminates_run() {
    let h = harness();
    h.archiver
        .push_outcome(Err(ArchiveError::Fatal("bad credentials".to_string())));

    let coord = coordinator(&h, true);
    let result = tokio::time::timeout(Duration::from_secs(5), coord.run())
        .await
        .unwrap();

    assert!(matches!(result, Err(CoordinatorError::FatalArchive(_))));

    // The snapshot is released but intentionally not deleted.
    let listed = h.manager.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].refcount, 0);
}

#[tokio::test]
async fn test_shutdown_while_unreachable() {
    let h = harness();
    h.archiver.set_reachable_sequence(vec![false]);

    let coord = coordinator(&h, true);
    let task = tokio::spawn(async move { coord.run().await });

    tokio::time::sleep(Duration::from_millis(30)).await;
    h.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(h.archiver.archived_sources().is_empty());
    assert!(h.manager.list().is_empty());
}

#[tokio::test]
async fn test_shutdown_during_idle_wait_takes_no_snapshot() {
    let h = harness();
    let idle = FakeIdleDetector::blocking();
    let coord = Coordinator::new(
        h.manager.clone(),
        h.archiver.clone(),
        h.mounts.clone(),
        Some(idle.clone()),
        h.shutdown.clone(),
        CoordinatorOptions {
            cam_disk: cam_disk(),
            cam_bytes: 1000,
            view_mount: view(),
            settle_delay: Duration::ZERO,
            poll: Duration::from_millis(5),
            archiving_enabled: true,
        },
    );
    let task = tokio::spawn(async move { coord.run().await });

    wait_until(|| idle.calls() == 1).await;
    h.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(h.manager.list().is_empty());
    assert!(h.archiver.archived_sources().is_empty());
}

#[tokio::test]
async fn test_cancelled_archive_keeps_snapshot_and_exits() {
    let h = harness();
    h.archiver.set_block_until_cancel();

    let coord = coordinator(&h, true);
    let task = tokio::spawn(async move { coord.run().await });

    // Upload in flight.
    wait_until(|| h.archiver.archived_sources().len() == 1).await;
    h.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // Released, not deleted: the next run's sweep reclaims it, and the
    // backend's copy-if-newer semantics resume the upload cheaply.
    let listed = h.manager.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].refcount, 0);
    assert!(h.fs.exists(&snapshot_dir(1)));

    // The view was unmounted on the way out.
    assert!(h
        .mounts
        .calls()
        .iter()
        .any(|c| matches!(c, MountCall::Unmount { .. })));
}

#[tokio::test]
async fn test_view_mount_failure_skips_archive() {
    let h = harness();
    h.archiver.set_reachable_sequence(vec![true, false]);
    h.mounts.fail_next("mount_view", "loop device exhausted");

    let coord = coordinator(&h, true);
    let task = tokio::spawn(async move { coord.run().await });

    wait_until(|| {
        let listed = h.manager.list();
        listed.len() == 1 && listed[0].refcount == 0
    })
    .await;
    h.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(h.archiver.archived_sources().is_empty());
}

#[tokio::test]
async fn test_no_space_skips_cycle_without_snapshot() {
    let h = harness();
    // Permanently short of the budget with nothing to evict.
    h.fs.set_free_bytes(vec![10]);

    let coord = coordinator(&h, true);
    let task = tokio::spawn(async move { coord.run().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    h.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(h.manager.list().is_empty());
    assert!(h.archiver.archived_sources().is_empty());
}

#[tokio::test]
async fn test_archiving_disabled_sweeps_then_parks() {
    let h = harness();
    // Leftover from a previous run.
    h.manager.create(&cam_disk()).unwrap();

    let coord = coordinator(&h, false);
    let task = tokio::spawn(async move { coord.run().await });

    wait_until(|| h.manager.list().is_empty()).await;
    assert!(h.archiver.calls().is_empty());

    h.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_consecutive_cycles_use_increasing_ids() {
    let h = harness();
    h.archiver.set_reachable_sequence(vec![true, true, true, false]);

    let coord = coordinator(&h, true);
    let task = tokio::spawn(async move { coord.run().await });

    wait_until(|| h.archiver.archived_sources().len() >= 3).await;
    h.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let views: Vec<_> = h
        .mounts
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            MountCall::View { image, .. } => Some(image),
            _ => None,
        })
        .collect();
    let mut sorted = views.clone();
    sorted.sort();
    sorted.dedup();
    // Every cycle used a fresh snapshot, in strictly increasing order.
    assert_eq!(views, sorted);
}
