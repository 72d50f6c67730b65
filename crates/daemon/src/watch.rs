// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config file watch with a one-shot latch.
//!
//! One logical edit can produce several filesystem notifications. The
//! supervisor takes the first one, handles the reload, then calls
//! [`ConfigWatch::rearm`], which discards whatever piled up meanwhile.

use crate::error::AgentError;
use async_trait::async_trait;
use notify::event::EventKind;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::Path;
use tokio::sync::mpsc;

#[async_trait]
pub trait ConfigWatch: Send {
    /// Wait for the next change to the config file.
    async fn changed(&mut self) -> Result<(), AgentError>;

    /// Drop changes seen since the last `changed`.
    fn rearm(&mut self);
}

pub struct NotifyWatch {
    // Dropping the watcher stops the notifications
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<()>,
}

impl NotifyWatch {
    /// Watch the file's directory, so editors that replace the file by
    /// rename are still seen.
    pub fn new(config_path: &Path) -> Result<Self, AgentError> {
        let dir = ji_core::config_dir(config_path);
        let name: Option<OsString> = config_path.file_name().map(OsString::from);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_change(&event, name.as_deref()) => {
                let _ = tx.send(());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(code = "JI-T201", error = %e, "config watch error"),
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %config_path.display(), "watching config");
        Ok(Self { _watcher: watcher, rx })
    }
}

fn is_change(event: &Event, name: Option<&std::ffi::OsStr>) -> bool {
    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
        return false;
    }
    match name {
        Some(name) => event.paths.iter().any(|p| p.file_name() == Some(name)),
        None => true,
    }
}

#[async_trait]
impl ConfigWatch for NotifyWatch {
    async fn changed(&mut self) -> Result<(), AgentError> {
        self.rx.recv().await.ok_or(AgentError::WatchClosed)
    }

    fn rearm(&mut self) {
        let mut dropped = 0usize;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        tracing::debug!(dropped, "config watch re-armed");
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
