// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::env;
use crate::error::AgentError;
use crate::launcher::ProcessLauncher;
use crate::signals::install_shutdown_handler;
use crate::topology::{Topology, TopologyTimings};
use crate::watch::NotifyWatch;
use std::path::Path;

pub(super) async fn run(config_path: &Path) -> Result<(), AgentError> {
    let shutdown = install_shutdown_handler()?;
    let exe = std::env::current_exe()?;
    let watch = NotifyWatch::new(config_path)?;
    let launcher = ProcessLauncher::new(config_path, exe);
    let timings = TopologyTimings { reload_pause: env::reload_pause(), ..Default::default() };

    let exit = Topology::new(launcher, watch, timings).run(shutdown).await?;

    if let Some(swap) = &exit.swap {
        if let Err(e) = swap.schedule() {
            tracing::error!(code = "JI-U102", error = %e, "failed to schedule executable swap");
        }
    }
    tracing::info!(generations = exit.generations, "supervisor stopped");
    Ok(())
}
