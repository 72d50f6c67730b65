// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job status taxonomy shared by dispatch and supervision.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a job invocation.
///
/// The same words appear as `_finish` payloads, as `action` values in
/// cancellation envelopes and as Local Event Bus topic suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Output chunk / running
    Process,
    Finish,
    Error,
    Timeout,
    Terminate,
}

crate::simple_display! {
    JobStatus {
        Process => "process",
        Finish => "finish",
        Error => "error",
        Timeout => "timeout",
        Terminate => "terminate",
    }
}

impl JobStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "process" => Some(Self::Process),
            "finish" => Some(Self::Finish),
            "error" => Some(Self::Error),
            "timeout" => Some(Self::Timeout),
            "terminate" => Some(Self::Terminate),
            _ => None,
        }
    }

    /// Peer-initiated statuses that force-kill a running job.
    pub fn is_cancellation(self) -> bool {
        matches!(self, Self::Timeout | Self::Terminate)
    }

    /// Parse a cancellation action, ignoring anything else.
    pub fn cancellation(action: &str) -> Option<Self> {
        Self::parse(action).filter(|s| s.is_cancellation())
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
