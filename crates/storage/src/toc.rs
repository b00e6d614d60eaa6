// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The snapshot completion marker.
//!
//! A snapshot directory is valid iff its `.toc` file exists; the JSON body
//! is an extensible record kept for operators and for the creation timestamp
//! recovered at load. Unparseable contents do not invalidate a snapshot.

use camsink_core::SnapshotId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur encoding or decoding a TOC record
#[derive(Debug, Error)]
pub enum TocError {
    #[error("TOC serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Body of the `.toc` marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toc {
    /// Snapshot ID, matching the directory name.
    pub id: SnapshotId,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
    /// Size of the cam disk image at snapshot time, in bytes.
    pub source_size: u64,
}

impl Toc {
    pub fn new(id: SnapshotId, created_at: DateTime<Utc>, source_size: u64) -> Self {
        Self {
            id,
            created_at,
            source_size,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TocError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TocError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
#[path = "toc_tests.rs"]
mod tests;
