// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op archive adapter for `archive.system = "none"`.

use super::{ArchiveAdapter, ArchiveError, ArchiveStats};
use async_trait::async_trait;
use camsink_core::Shutdown;
use std::path::Path;

/// Archiving disabled: never reachable, so the coordinator never opens a
/// snapshot session. Its startup sweep still reclaims leftovers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopArchiver;

impl NoopArchiver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArchiveAdapter for NoopArchiver {
    async fn is_reachable(&self) -> bool {
        false
    }

    async fn archive(
        &self,
        _source: &Path,
        _cancel: &Shutdown,
    ) -> Result<ArchiveStats, ArchiveError> {
        Ok(ArchiveStats::default())
    }
}

#[cfg(test)]
#[path = "noop_tests.rs"]
mod tests;
