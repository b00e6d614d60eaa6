// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test helpers for behavioral specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use assert_cmd::Command;

/// Exit code the daemon uses for configuration and startup failures.
pub const EXIT_CONFIG: i32 = 2;

/// Command for the daemon binary built by this workspace.
pub fn camsinkd() -> Command {
    Command::cargo_bin("camsinkd").unwrap()
}
