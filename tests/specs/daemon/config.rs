// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration error specs
//!
//! Misconfiguration must exit with the dedicated code before the daemon
//! acquires its lock or touches the backing image.

use crate::prelude::*;
use tempfile::tempdir;

#[test]
fn unparseable_config_exits_with_config_code() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("camsink.toml");
    std::fs::write(&config, "this is { not toml").unwrap();

    let output = camsinkd()
        .env("CAMSINK_CONFIG", &config)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(EXIT_CONFIG));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("configuration error"),
        "expected configuration error, got: {stderr}"
    );
}

#[test]
fn rclone_without_remote_exits_with_config_code() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("camsink.toml");
    std::fs::write(&config, "[archive]\nsystem = \"rclone\"\n").unwrap();

    let output = camsinkd()
        .env("CAMSINK_CONFIG", &config)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(EXIT_CONFIG));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("archive.remote"),
        "expected missing-remote message, got: {stderr}"
    );
}
