// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::tls::TlsError;
use ji_core::BrokerKind;
use thiserror::Error;

/// Errors from broker operations
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("{kind} connect to {target} failed: {message}")]
    Connect { kind: BrokerKind, target: String, message: String },

    #[error("{kind} subscribe to {topic} failed: {message}")]
    Subscribe { kind: BrokerKind, topic: String, message: String },

    #[error("{kind} command failed: {message}")]
    Command { kind: BrokerKind, message: String },

    #[error("{kind} broker does not support {operation}")]
    Unsupported { kind: BrokerKind, operation: &'static str },

    #[error(transparent)]
    Tls(#[from] TlsError),
}

impl BrokerError {
    /// Configuration problems that retrying cannot fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Tls(e) if e.is_fatal())
    }

    pub(crate) fn subscribe(kind: BrokerKind, topic: &str, err: impl std::fmt::Display) -> Self {
        Self::Subscribe { kind, topic: topic.to_string(), message: err.to_string() }
    }

    pub(crate) fn command(kind: BrokerKind, err: impl std::fmt::Display) -> Self {
        Self::Command { kind, message: err.to_string() }
    }
}
