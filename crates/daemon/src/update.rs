// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Self-update with a deferred executable swap.
//!
//! A newer build is downloaded next to the running executable and the
//! children are started from it. The running file is only replaced once
//! the supervisor exits, by a detached shell that outlives it.

use ji_core::AgentConfig;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;

/// Version number of this build, compared with `job_item_version_number`.
pub const VERSION_NUMBER: u32 = 1;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("version {version} is available but no download link is configured")]
    MissingLink { version: u32 },

    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("download returned HTTP {0}")]
    Status(u16),

    #[error("failed to write {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("failed to start executable swap: {0}")]
    Swap(std::io::Error),
}

/// A replacement binary waiting to take the executable's place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSwap {
    pub current: PathBuf,
    pub replacement: PathBuf,
}

impl PendingSwap {
    pub fn script(&self) -> String {
        format!(
            "rm -f {current} && mv {replacement} {current}",
            current = shell_quote(&self.current),
            replacement = shell_quote(&self.replacement),
        )
    }

    /// Start the swap in its own process group and return its pid. The
    /// helper is not waited on; it finishes after this process is gone.
    pub fn schedule(&self) -> Result<u32, UpdateError> {
        let child = std::process::Command::new("sh")
            .arg("-c")
            .arg(self.script())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(UpdateError::Swap)?;
        tracing::info!(
            pid = child.id(),
            replacement = %self.replacement.display(),
            "executable swap scheduled",
        );
        Ok(child.id())
    }
}

/// Path the given version is downloaded to, next to `exe`.
pub fn download_path(exe: &Path, version: u32) -> PathBuf {
    let dir = exe.parent().unwrap_or(Path::new("."));
    dir.join(format!("job_item_{version}"))
}

/// Make sure the configured version is on disk when it is newer than this
/// build. Returns the swap to perform, or `None` when already current.
pub async fn ensure_latest(config: &AgentConfig, exe: &Path) -> Result<Option<PendingSwap>, UpdateError> {
    let version = config.job_item_version_number;
    if version <= VERSION_NUMBER {
        return Ok(None);
    }
    let target = download_path(exe, version);
    if !target.exists() {
        let link = config
            .job_item_link
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .ok_or(UpdateError::MissingLink { version })?;
        tracing::info!(version, %link, target = %target.display(), "downloading new version");
        download(link, &target).await?;
    }
    std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o755))
        .map_err(|source| UpdateError::Io { path: target.clone(), source })?;
    Ok(Some(PendingSwap { current: exe.to_path_buf(), replacement: target }))
}

async fn download(link: &str, target: &Path) -> Result<(), UpdateError> {
    let response = reqwest::get(link).await?;
    if !response.status().is_success() {
        return Err(UpdateError::Status(response.status().as_u16()));
    }
    let bytes = response.bytes().await?;
    // Write beside the target first so a partial download is never picked up
    let partial = target.with_extension("part");
    std::fs::write(&partial, &bytes).map_err(|source| UpdateError::Io { path: partial.clone(), source })?;
    std::fs::rename(&partial, target).map_err(|source| UpdateError::Io { path: target.to_path_buf(), source })
}

/// Single-quote a path for `sh`.
pub fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

#[cfg(test)]
#[path = "update_tests.rs"]
mod tests;
