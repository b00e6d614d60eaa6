// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: filesystem, archive backend, idle detection,
//! mounts, and the small sysfs collaborators (USB gadget, LED, thermal zone).

pub mod archive;
pub mod fs;
pub mod gadget;
pub mod idle;
pub mod led;
pub mod mount;
pub mod subprocess;
pub mod temperature;
pub mod traced;

pub use archive::{
    await_reachable, ArchiveAdapter, ArchiveError, ArchiveStats, ClipRoots, NoopArchiver,
    RcloneArchiver, TESLACAM_DIR,
};
pub use fs::{Fs, FsError, OsFs};
pub use gadget::{GadgetError, UsbGadget};
pub use idle::{IdleDetector, MtimeIdleDetector};
pub use led::{spawn_blinker, LedPattern, StatusLed};
pub use mount::{LoopMount, MountAdapter, MountError};
pub use temperature::CpuTempSampler;
pub use traced::TracedArchive;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use archive::{ArchiveCall, FakeArchiver};
#[cfg(any(test, feature = "test-support"))]
pub use fs::{FakeFs, FaultKind, FsCall};
#[cfg(any(test, feature = "test-support"))]
pub use idle::FakeIdleDetector;
#[cfg(any(test, feature = "test-support"))]
pub use mount::{FakeMount, MountCall};
