// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::super::{ArchiveAdapter, ArchiveStats};
use super::NoopArchiver;
use camsink_core::Shutdown;
use std::path::Path;

#[tokio::test]
async fn test_never_reachable() {
    let archiver = NoopArchiver::new();
    assert!(!archiver.is_reachable().await);
}

#[tokio::test]
async fn test_archive_is_a_noop() {
    let archiver = NoopArchiver::new();
    let stats = archiver
        .archive(Path::new("/view"), &Shutdown::new())
        .await
        .unwrap();
    assert_eq!(stats, ArchiveStats::default());
}
