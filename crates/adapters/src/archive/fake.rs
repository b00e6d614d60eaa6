// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake archive adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ArchiveAdapter, ArchiveError, ArchiveStats};
use async_trait::async_trait;
use camsink_core::Shutdown;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Recorded archive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveCall {
    IsReachable,
    Archive { source: PathBuf },
}

struct State {
    /// Scripted reachability responses; the last value repeats.
    reachable: VecDeque<bool>,
    /// Scripted archive outcomes; empty queue yields `Ok(default)`.
    outcomes: VecDeque<Result<ArchiveStats, ArchiveError>>,
    /// When set, `archive` records its call and then parks until the
    /// shutdown signal, mimicking an upload interrupted by cancellation.
    block_until_cancel: bool,
    calls: Vec<ArchiveCall>,
}

/// Fake archive adapter with scripted reachability and outcomes.
#[derive(Clone)]
pub struct FakeArchiver {
    inner: Arc<Mutex<State>>,
}

impl Default for FakeArchiver {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(State {
                reachable: VecDeque::from([true]),
                outcomes: VecDeque::new(),
                block_until_cancel: false,
                calls: Vec::new(),
            })),
        }
    }
}

impl FakeArchiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script successive `is_reachable` responses; the last one repeats.
    pub fn set_reachable_sequence(&self, values: Vec<bool>) {
        let mut inner = self.inner.lock();
        inner.reachable = values.into();
        if inner.reachable.is_empty() {
            inner.reachable.push_back(true);
        }
    }

    /// Queue an outcome for the next `archive` call.
    pub fn push_outcome(&self, outcome: Result<ArchiveStats, ArchiveError>) {
        self.inner.lock().outcomes.push_back(outcome);
    }

    /// Make `archive` park until the shutdown signal fires, then fail
    /// recoverably, as a real upload does when cancelled.
    pub fn set_block_until_cancel(&self) {
        self.inner.lock().block_until_cancel = true;
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ArchiveCall> {
        self.inner.lock().calls.clone()
    }

    /// Source paths of the recorded `archive` calls, in order.
    pub fn archived_sources(&self) -> Vec<PathBuf> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                ArchiveCall::Archive { source } => Some(source.clone()),
                ArchiveCall::IsReachable => None,
            })
            .collect()
    }
}

#[async_trait]
impl ArchiveAdapter for FakeArchiver {
    async fn is_reachable(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.calls.push(ArchiveCall::IsReachable);
        if inner.reachable.len() > 1 {
            inner.reachable.pop_front().unwrap_or(true)
        } else {
            inner.reachable.front().copied().unwrap_or(true)
        }
    }

    async fn archive(
        &self,
        source: &Path,
        cancel: &Shutdown,
    ) -> Result<ArchiveStats, ArchiveError> {
        let block = {
            let mut inner = self.inner.lock();
            if inner.block_until_cancel {
                inner.calls.push(ArchiveCall::Archive {
                    source: source.to_path_buf(),
                });
            }
            inner.block_until_cancel
        };
        if block {
            cancel.wait().await;
            return Err(ArchiveError::Recoverable("archive cancelled".to_string()));
        }

        if cancel.is_triggered() {
            return Err(ArchiveError::Recoverable("archive cancelled".to_string()));
        }
        let mut inner = self.inner.lock();
        inner.calls.push(ArchiveCall::Archive {
            source: source.to_path_buf(),
        });
        inner
            .outcomes
            .pop_front()
            .unwrap_or(Ok(ArchiveStats::default()))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
