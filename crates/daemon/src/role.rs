// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process roles of the agent's own process tree.

/// Which entry point this process runs.
///
/// The supervisor re-executes its own binary with a role subcommand to
/// start the children; the subcommand names are shared by parent and child
/// builds and must not change between versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Supervisor,
    JobChild,
    ExecChild,
}

ji_core::simple_display! {
    Role {
        Supervisor => "supervisor",
        JobChild => "job-child",
        ExecChild => "exec-child",
    }
}

impl Role {
    /// Subcommand the supervisor passes when launching this role.
    pub fn subcommand(self) -> &'static str {
        match self {
            Role::Supervisor => "supervisor",
            Role::JobChild => "job-child",
            Role::ExecChild => "exec-child",
        }
    }

    pub fn is_child(self) -> bool {
        !matches!(self, Role::Supervisor)
    }
}
