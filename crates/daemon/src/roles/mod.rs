// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Role entry points.

mod exec_child;
mod job_child;
mod supervisor;

pub use job_child::interrupt;

use crate::error::AgentError;
use crate::resolve::ResolvedConfig;
use crate::role::Role;
use ji_broker::{build_registry, TlsFetcher};
use ji_core::{ConfigError, EventBus};
use ji_engine::AgentContext;
use std::path::Path;

/// Run `role` to completion.
pub async fn run(role: Role, config_path: &Path) -> Result<(), AgentError> {
    tracing::info!(%role, config = %config_path.display(), pid = std::process::id(), "starting");
    match role {
        Role::Supervisor => supervisor::run(config_path).await,
        Role::JobChild => job_child::run(config_path).await,
        Role::ExecChild => exec_child::run(config_path).await,
    }
}

/// Connect the configured broker and build the process context.
pub async fn agent_context(resolved: ResolvedConfig) -> Result<AgentContext, AgentError> {
    let ResolvedConfig { config, identity, base_dir } = resolved;
    let broker = config.broker_connection.as_ref().ok_or(ConfigError::MissingBroker)?;
    let tls = TlsFetcher::new(
        &base_dir,
        config.end_point().map(str::to_string),
        config.credential.project_id.as_str(),
        config.credential.secret_key.as_str(),
    );
    let bus = EventBus::new();
    let registry = build_registry(broker, &tls, &bus).await?;
    Ok(AgentContext::new(config, identity, registry, bus, base_dir))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
