// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::agent_context;
use crate::error::AgentError;
use crate::resolve::inherit_or_resolve;
use crate::signals::install_shutdown_handler;
use ji_engine::{ServiceSupervisor, ServiceTimings, ShutdownNotice};
use std::path::Path;

pub(super) async fn run(config_path: &Path) -> Result<(), AgentError> {
    let shutdown = install_shutdown_handler()?;
    let resolved = inherit_or_resolve(config_path).await?;
    let ctx = agent_context(resolved).await?;

    let notice = ShutdownNotice::new(ctx.clone());
    let services = ServiceSupervisor::new(ctx, notice, ServiceTimings::default());
    services.start();

    shutdown.cancelled().await;
    services.stop().await;
    Ok(())
}
