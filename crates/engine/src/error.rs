// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::process::ProcessError;
use crate::template::TemplateError;
use ji_broker::BrokerError;
use thiserror::Error;

/// Failures scoped to job dispatch. None of these escape a single task.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("malformed job message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("command template: {0}")]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("no broker connection registered under {0:?}")]
    NoConnection(String),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}
