// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::archive::{ArchiveAdapter, ArchiveError, ArchiveStats};
use async_trait::async_trait;
use camsink_core::Shutdown;
use std::path::Path;
use tracing::Instrument;

/// Wrapper that adds tracing to any ArchiveAdapter
#[derive(Clone)]
pub struct TracedArchive<A> {
    inner: A,
}

impl<A> TracedArchive<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<A: ArchiveAdapter> ArchiveAdapter for TracedArchive<A> {
    async fn is_reachable(&self) -> bool {
        let reachable = self.inner.is_reachable().await;
        tracing::debug!(reachable, "reachability probe");
        reachable
    }

    async fn archive(
        &self,
        source: &Path,
        cancel: &Shutdown,
    ) -> Result<ArchiveStats, ArchiveError> {
        async {
            tracing::info!("starting");
            let start = std::time::Instant::now();
            let result = self.inner.archive(source, cancel).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(stats) => tracing::info!(
                    roots_archived = stats.roots_archived,
                    roots_skipped = stats.roots_skipped,
                    elapsed_ms,
                    "archive complete"
                ),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "archive failed"),
            }
            result
        }
        .instrument(tracing::info_span!("archive.push", source = %source.display()))
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
