// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ji-daemon: the `job-item` agent process tree
//!
//! One binary, three roles. The supervisor watches the config and keeps a
//! job child and an exec child running; both children are this same
//! executable started with a role subcommand.

pub mod env;
pub mod identity;
pub mod launcher;
pub mod logging;
pub mod resolve;
pub mod role;
pub mod roles;
pub mod server;
pub mod signals;
pub mod telemetry;
pub mod topology;
pub mod update;
pub mod watch;

mod error;

pub use error::AgentError;
pub use launcher::{ChildLauncher, ChildPlan, ManagedChild, ProcessLauncher};
pub use role::Role;
pub use roles::run;
pub use topology::{Topology, TopologyExit, TopologyTimings};
pub use update::{PendingSwap, VERSION_NUMBER};
pub use watch::{ConfigWatch, NotifyWatch};
