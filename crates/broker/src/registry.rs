// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named broker connections, resolved by logical key.

use crate::connection::BrokerConnection;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Process-wide connection table. Clones share the same table.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<String, Arc<dyn BrokerConnection>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection` under `key`, replacing any previous handle so
    /// exactly one transport is active per key.
    pub fn register(
        &self,
        key: impl Into<String>,
        connection: Arc<dyn BrokerConnection>,
    ) -> Option<Arc<dyn BrokerConnection>> {
        let key = key.into();
        tracing::debug!(%key, kind = %connection.kind(), "registering broker connection");
        self.connections.write().insert(key, connection)
    }

    /// Resolve a connection. `None` means the feature is unavailable.
    pub fn get(&self, key: &str) -> Option<Arc<dyn BrokerConnection>> {
        self.connections.read().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.connections.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
