// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity: generated once, then persisted next to the config.

use crate::env;
use ji_core::{AgentConfig, IdentityId};
use std::path::{Path, PathBuf};

/// Identity file name, relative to the config directory.
pub const IDENTITY_FILE: &str = ".job_item_identity";

pub fn identity_file(config_dir: &Path) -> PathBuf {
    config_dir.join(IDENTITY_FILE)
}

/// Resolve the identity: config, then environment, then the persisted file.
/// A new id is generated and persisted when none of those has one.
pub fn resolve(config: &AgentConfig, config_dir: &Path) -> IdentityId {
    if let Some(id) = config.identity_id.as_ref().filter(|id| !id.as_str().trim().is_empty()) {
        return id.clone();
    }
    if let Some(id) = env::identity_override() {
        return id;
    }
    let path = identity_file(config_dir);
    if let Some(id) = read(&path) {
        return id;
    }

    let id = IdentityId::generate();
    match std::fs::write(&path, id.as_str()) {
        Ok(()) => tracing::info!(identity = %id, path = %path.display(), "generated agent identity"),
        Err(e) => tracing::warn!(
            code = "JI-C101",
            identity = %id,
            path = %path.display(),
            error = %e,
            "failed to persist agent identity, it will change on restart",
        ),
    }
    id
}

fn read(path: &Path) -> Option<IdentityId> {
    let text = std::fs::read_to_string(path).ok()?;
    let id = text.trim();
    if id.is_empty() {
        None
    } else {
        Some(IdentityId::new(id))
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
