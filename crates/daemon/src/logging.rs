// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing subscriber setup shared by every role.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Log file prefix inside the log directory; the date is appended daily.
pub const LOG_FILE_PREFIX: &str = "job-item.log";

/// Filter from `RUST_LOG`, `info` when unset or invalid.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber: stdout always, plus a daily rolling file
/// when `log_dir` is given. Keep the guard alive until exit so buffered
/// lines are flushed.
pub fn init(role: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let stdout = fmt::layer().with_target(false).boxed();

    let (file, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(stdout)
        .with(file)
        .try_init();
    if installed.is_ok() {
        tracing::debug!(role, "logging initialized");
    }
    guard
}
