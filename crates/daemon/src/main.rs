// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `job-item`: fleet worker agent.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ji_daemon::{env, logging, Role};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "job-item")]
#[command(version)]
#[command(about = "Fleet worker agent: runs broker-dispatched jobs and supervises services")]
struct Args {
    /// Path to the YAML config file
    #[arg(short, long, global = true, env = "CONFIG_PATH", default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Watch the config and supervise the job and exec children (default)
    Supervisor,

    /// Handle dispatched jobs (started by the supervisor)
    #[command(name = "job-child", hide = true)]
    JobChild,

    /// Run long-lived exec services (started by the supervisor)
    #[command(name = "exec-child", hide = true)]
    ExecChild,
}

impl Command {
    fn role(self) -> Role {
        match self {
            Command::Supervisor => Role::Supervisor,
            Command::JobChild => Role::JobChild,
            Command::ExecChild => Role::ExecChild,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    let _ = dotenv::dotenv();
    let args = Args::parse();
    let role = args.command.map_or(Role::Supervisor, Command::role);
    let _guard = logging::init(role.subcommand(), env::log_dir().as_deref());

    ji_daemon::run(role, &args.config)
        .await
        .with_context(|| format!("{role} failed (config {})", args.config.display()))
}
