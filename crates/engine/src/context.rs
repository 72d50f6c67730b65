// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide context threaded through engine components.

use ji_broker::{BrokerConnection, ConnectionRegistry};
use ji_core::{topic, AgentConfig, BusSubscription, EventBus, IdentityId};
use std::path::PathBuf;
use std::sync::Arc;

/// Registry key used when the config names none.
pub const DEFAULT_CONNECTION_KEY: &str = "default";

#[derive(Clone)]
pub struct AgentContext {
    pub config: Arc<AgentConfig>,
    pub identity: IdentityId,
    pub registry: ConnectionRegistry,
    pub bus: EventBus,
    /// Directory relative paths resolve against (the config file's directory).
    pub base_dir: PathBuf,
}

impl AgentContext {
    pub fn new(
        config: AgentConfig,
        identity: IdentityId,
        registry: ConnectionRegistry,
        bus: EventBus,
        base_dir: impl Into<PathBuf>,
    ) -> Self {
        Self { config: Arc::new(config), identity, registry, bus, base_dir: base_dir.into() }
    }

    /// Registry key of the configured broker connection.
    pub fn connection_key(&self) -> &str {
        self.config
            .broker_connection
            .as_ref()
            .map_or(DEFAULT_CONNECTION_KEY, |b| b.key.as_str())
    }

    /// Current connection, re-resolved on every call. `None` means the
    /// feature depending on it is unavailable.
    pub fn connection(&self) -> Option<Arc<dyn BrokerConnection>> {
        self.registry.get(self.connection_key())
    }

    /// Consumer group for job topics.
    pub fn group(&self) -> &str {
        self.config.project_uuid()
    }

    /// Call `f` whenever our connection reports a reconnect. Notices naming
    /// another connection key are ignored.
    pub fn on_refresh(&self, f: impl Fn() + Send + Sync + 'static) -> BusSubscription {
        let key = self.connection_key().to_string();
        self.bus.subscribe(topic::REFRESH_NOTICE, move |payload| {
            if payload.is_empty() || payload == key {
                f();
            }
        })
    }
}
