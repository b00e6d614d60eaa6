// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::archive::{ArchiveStats, FakeArchiver};
use std::path::Path;

#[tokio::test]
async fn test_traced_archive_passes_through_success() {
    let inner = FakeArchiver::new();
    inner.push_outcome(Ok(ArchiveStats {
        roots_archived: 1,
        roots_skipped: 1,
    }));
    let traced = TracedArchive::new(inner.clone());

    let stats = traced
        .archive(Path::new("/view"), &Shutdown::new())
        .await
        .unwrap();
    assert_eq!(stats.roots_archived, 1);
    assert_eq!(inner.archived_sources().len(), 1);
}

#[tokio::test]
async fn test_traced_archive_passes_through_errors() {
    let inner = FakeArchiver::new();
    inner.push_outcome(Err(ArchiveError::Fatal("bad auth".to_string())));
    let traced = TracedArchive::new(inner);

    let result = traced.archive(Path::new("/view"), &Shutdown::new()).await;
    assert_eq!(result, Err(ArchiveError::Fatal("bad auth".to_string())));
}

#[tokio::test]
async fn test_traced_reachability_passes_through() {
    let inner = FakeArchiver::new();
    inner.set_reachable_sequence(vec![false]);
    let traced = TracedArchive::new(inner);
    assert!(!traced.is_reachable().await);
}
