// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! camsink-core: shared types for the camsink daemon

pub mod shutdown;
pub mod snapshot;

pub use shutdown::Shutdown;
pub use snapshot::{Snapshot, SnapshotId, SnapshotState};
