// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Turn a config path into the fully resolved config a role runs with.

use crate::error::AgentError;
use crate::server::ServerClient;
use crate::{env, identity};
use ji_core::{config_dir, AgentConfig, IdentityId};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: AgentConfig,
    pub identity: IdentityId,
    /// Directory relative paths in the config resolve against.
    pub base_dir: PathBuf,
}

/// Load the file, settle the identity, merge server settings when an
/// end point is configured, then validate.
pub async fn resolve(config_path: &Path) -> Result<ResolvedConfig, AgentError> {
    let mut config = AgentConfig::load(config_path)?;
    let base_dir = config_dir(config_path);
    let identity = identity::resolve(&config, &base_dir);
    config.identity_id = Some(identity.clone());

    if let Some(end_point) = config.end_point().map(str::to_string) {
        tracing::info!(%end_point, "fetching config from server");
        let server = ServerClient::new(&end_point).fetch(&config.credential).await?;
        config.merge_server(server);
    }

    config.validate()?;
    Ok(ResolvedConfig { config, identity, base_dir })
}

/// Children use the config the supervisor handed down, falling back to
/// resolving it themselves when started by hand.
pub async fn inherit_or_resolve(config_path: &Path) -> Result<ResolvedConfig, AgentError> {
    let Some(config) = env::inherited_config()? else {
        return resolve(config_path).await;
    };
    let base_dir = config_dir(config_path);
    let identity = match config.identity_id.clone().filter(|id| !id.is_empty()) {
        Some(id) => id,
        None => identity::resolve(&config, &base_dir),
    };
    config.validate()?;
    Ok(ResolvedConfig { config, identity, base_dir })
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
