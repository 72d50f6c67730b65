// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::role::Role;
use crate::server::ServerError;
use crate::update::UpdateError;
use ji_broker::BrokerError;
use ji_core::ConfigError;
use ji_engine::JobError;
use thiserror::Error;

/// Errors that end a role's entry point.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("job engine error: {0}")]
    Job(#[from] JobError),

    #[error("config server error: {0}")]
    Server(#[from] ServerError),

    #[error("update error: {0}")]
    Update(#[from] UpdateError),

    #[error("config watch failed: {0}")]
    Watch(#[from] notify::Error),

    #[error("config watch closed")]
    WatchClosed,

    #[error("failed to launch {role}: {source}")]
    Spawn { role: Role, source: std::io::Error },

    #[error("failed to install signal handler: {0}")]
    Signal(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
