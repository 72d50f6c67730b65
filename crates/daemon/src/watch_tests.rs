// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind};
use std::path::PathBuf;
use std::time::Duration;

fn event(kind: EventKind, path: &str) -> Event {
    Event::new(kind).add_path(PathBuf::from(path))
}

#[yare::parameterized(
    modify_config = { EventKind::Modify(ModifyKind::Data(DataChange::Content)), "/etc/agent/config.yaml", true },
    create_config = { EventKind::Create(CreateKind::File), "/etc/agent/config.yaml", true },
    modify_other  = { EventKind::Modify(ModifyKind::Data(DataChange::Content)), "/etc/agent/.job_item_identity", false },
    access_config = { EventKind::Access(AccessKind::Read), "/etc/agent/config.yaml", false },
)]
fn change_filter(kind: EventKind, path: &str, expected: bool) {
    let name = std::ffi::OsStr::new("config.yaml");
    assert_eq!(is_change(&event(kind, path), Some(name)), expected);
}

#[tokio::test]
async fn edit_is_reported_once_after_rearm() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "a: 1\n").unwrap();
    let mut watch = NotifyWatch::new(&path).unwrap();

    std::fs::write(&path, "a: 2\n").unwrap();
    std::fs::write(&path, "a: 3\n").unwrap();
    tokio::time::timeout(Duration::from_secs(5), watch.changed()).await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    watch.rearm();
    let pending = tokio::time::timeout(Duration::from_millis(200), watch.changed()).await;
    assert!(pending.is_err(), "latched events should be discarded");

    std::fs::write(&path, "a: 4\n").unwrap();
    tokio::time::timeout(Duration::from_secs(5), watch.changed()).await.unwrap().unwrap();
}

#[tokio::test]
async fn other_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "a: 1\n").unwrap();
    let mut watch = NotifyWatch::new(&path).unwrap();

    std::fs::write(dir.path().join("unrelated.txt"), "x").unwrap();

    let seen = tokio::time::timeout(Duration::from_millis(300), watch.changed()).await;
    assert!(seen.is_err());
}
