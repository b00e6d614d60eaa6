// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon help and version specs
//!
//! Verify camsinkd --help, --version, and related flags work without
//! touching configuration, the lock file, or the backing image.

use crate::prelude::*;

#[test]
fn version_shows_version() {
    let output = camsinkd().arg("--version").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.starts_with("camsinkd 0.1.0"),
        "expected version line, got: {stdout}"
    );
}

#[test]
fn short_version_flags_work() {
    for flag in ["-v", "-V"] {
        let output = camsinkd().arg(flag).output().unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(
            stdout.starts_with("camsinkd "),
            "expected version line for {flag}, got: {stdout}"
        );
    }
}

#[test]
fn help_shows_usage() {
    let output = camsinkd().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("USAGE:"),
        "expected USAGE section, got: {stdout}"
    );
    assert!(stdout.contains("--help"), "expected --help in output");
    assert!(stdout.contains("--version"), "expected --version in output");
}

#[test]
fn unknown_arg_fails() {
    let output = camsinkd().arg("--bogus").output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("unexpected argument"),
        "expected error message, got: {stderr}"
    );
}
