// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ji-core: shared vocabulary for the job-item fleet agent

pub mod macros;

pub mod config;
pub mod event_bus;
pub mod id;
pub mod share_data;
pub mod status;
pub mod topic;

pub use config::{
    config_dir, AgentConfig, AuthType, BrokerConnectionConfig, BrokerKind, ConfigError,
    Credential, ExecConfig, JobConfig, JobData, ProjectData, ServerConfig,
};
pub use event_bus::{BusHandler, BusSubscription, EventBus};
pub use id::{short, IdentityId, TaskId};
pub use share_data::ShareDataStore;
pub use status::JobStatus;
