// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! camsink-storage: snapshot registry and space management.
//!
//! The snapshot manager owns the `snapshots/` tree of reflink copies with
//! refcounted acquisition and a durable completion marker; the space manager
//! derives the disk layout from one knob and keeps the "next snapshot fits"
//! invariant by evicting unreferenced snapshots.

pub mod manager;
pub mod space;
pub mod toc;

pub use manager::{SnapshotError, SnapshotHandle, SnapshotManager};
pub use space::{ensure_space_for_snapshot, Layout, SpaceError};
pub use toc::{Toc, TocError};
