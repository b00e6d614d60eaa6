// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::super::{ArchiveAdapter, ArchiveError, ArchiveStats};
use super::{ArchiveCall, FakeArchiver};
use camsink_core::Shutdown;
use std::path::{Path, PathBuf};

#[tokio::test]
async fn test_default_is_reachable_and_succeeds() {
    let archiver = FakeArchiver::new();
    assert!(archiver.is_reachable().await);

    let stats = archiver
        .archive(Path::new("/view"), &Shutdown::new())
        .await
        .unwrap();
    assert_eq!(stats, ArchiveStats::default());
}

#[tokio::test]
async fn test_scripted_reachability_last_value_repeats() {
    let archiver = FakeArchiver::new();
    archiver.set_reachable_sequence(vec![false, true]);

    assert!(!archiver.is_reachable().await);
    assert!(archiver.is_reachable().await);
    assert!(archiver.is_reachable().await);
}

#[tokio::test]
async fn test_scripted_outcomes_are_consumed_in_order() {
    let archiver = FakeArchiver::new();
    archiver.push_outcome(Err(ArchiveError::Recoverable("net down".to_string())));
    archiver.push_outcome(Ok(ArchiveStats {
        roots_archived: 2,
        roots_skipped: 0,
    }));

    let cancel = Shutdown::new();
    assert!(matches!(
        archiver.archive(Path::new("/view"), &cancel).await,
        Err(ArchiveError::Recoverable(_))
    ));
    let stats = archiver.archive(Path::new("/view"), &cancel).await.unwrap();
    assert_eq!(stats.roots_archived, 2);
}

#[tokio::test]
async fn test_records_calls() {
    let archiver = FakeArchiver::new();
    let cancel = Shutdown::new();

    archiver.is_reachable().await;
    archiver.archive(Path::new("/view/a"), &cancel).await.unwrap();
    archiver.archive(Path::new("/view/b"), &cancel).await.unwrap();

    assert_eq!(
        archiver.calls(),
        vec![
            ArchiveCall::IsReachable,
            ArchiveCall::Archive {
                source: PathBuf::from("/view/a")
            },
            ArchiveCall::Archive {
                source: PathBuf::from("/view/b")
            },
        ]
    );
    assert_eq!(
        archiver.archived_sources(),
        vec![PathBuf::from("/view/a"), PathBuf::from("/view/b")]
    );
}

#[tokio::test]
async fn test_cancelled_archive_is_recoverable() {
    let archiver = FakeArchiver::new();
    let cancel = Shutdown::new();
    cancel.trigger();

    let result = archiver.archive(Path::new("/view"), &cancel).await;
    assert!(matches!(result, Err(ArchiveError::Recoverable(_))));
    // Cancelled call is not recorded as an archive attempt.
    assert!(archiver.archived_sources().is_empty());
}
