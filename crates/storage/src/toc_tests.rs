// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;

#[test]
fn test_round_trip() {
    let toc = Toc::new(SnapshotId(42), Utc::now(), 53_687_091_200);
    let bytes = toc.to_bytes().unwrap();
    let parsed = Toc::from_bytes(&bytes).unwrap();
    assert_eq!(parsed, toc);
}

#[test]
fn test_garbage_fails_to_parse() {
    assert!(Toc::from_bytes(b"\xe5\x03binary-garbage").is_err());
    assert!(Toc::from_bytes(b"{}").is_err());
}

#[test]
fn test_tolerates_unknown_fields() {
    // The record is extensible: newer writers may add fields.
    let bytes = br#"{"id":7,"created_at":"2026-08-01T10:00:00Z","source_size":1024,"note":"x"}"#;
    let toc = Toc::from_bytes(bytes).unwrap();
    assert_eq!(toc.id, SnapshotId(7));
    assert_eq!(toc.source_size, 1024);
}
