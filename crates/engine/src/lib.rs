// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ji-engine: job dispatch and service supervision
//!
//! [`create_job`] and [`add_notification`] are the publish side of the local
//! control HTTP endpoint. The endpoint itself lives outside this workspace and
//! calls them with a live [`ji_broker::BrokerConnection`].

mod context;
mod control;
mod dispatch;
mod envelope;
mod error;
mod job;
mod process;
mod services;
mod shutdown;
mod template;

pub use context::{AgentContext, DEFAULT_CONNECTION_KEY};
pub use control::{add_notification, create_job, ControlError, NOTIFICATION_LIMIT};
pub use dispatch::JobDispatcher;
pub use envelope::JobMessage;
pub use error::JobError;
pub use job::{task_file, JobRunner, CHUNK_SIZE, DEFAULT_SETTLE_DELAY};
pub use process::{shell_command, signal_group, MonitoredProcess, ProcessError};
pub use services::{ServiceOutcome, ServiceSupervisor, ServiceTimings, APP_ID_ENV, IDENTITY_ENV};
pub use shutdown::{ShutdownListener, ShutdownNotice};
pub use template::{placeholders, render, TemplateError};
