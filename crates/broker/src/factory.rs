// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build broker connections from configuration.

use crate::amqp::QueueBroker;
use crate::connection::BrokerConnection;
use crate::error::BrokerError;
use crate::nats::TopicBroker;
use crate::reconnect::{retry_forever, RECONNECT_DELAY};
use crate::redis_store::StoreBroker;
use crate::registry::ConnectionRegistry;
use crate::tls::TlsFetcher;
use ji_core::{BrokerConnectionConfig, BrokerKind, EventBus};
use std::sync::Arc;

/// Single connection attempt for the configured transport.
pub async fn connect(
    config: &BrokerConnectionConfig,
    tls: &TlsFetcher,
    bus: &EventBus,
) -> Result<Arc<dyn BrokerConnection>, BrokerError> {
    let material = tls.ensure(config).await?;
    let material = material.as_ref();
    let connection: Arc<dyn BrokerConnection> = match config.kind {
        BrokerKind::Topic => Arc::new(TopicBroker::connect(config, material, bus.clone()).await?),
        BrokerKind::Queue => Arc::new(QueueBroker::connect(config, material, bus.clone()).await?),
        BrokerKind::Store => Arc::new(StoreBroker::connect(config, material, bus.clone()).await?),
    };
    Ok(connection)
}

/// Connect, retrying connectivity failures every [`RECONNECT_DELAY`] for as
/// long as it takes. Configuration errors (missing trust material) return.
pub async fn connect_forever(
    config: &BrokerConnectionConfig,
    tls: &TlsFetcher,
    bus: &EventBus,
) -> Result<Arc<dyn BrokerConnection>, BrokerError> {
    let what = format!("{} broker {}:{}", config.kind, config.host, config.port);
    retry_forever(&what, RECONNECT_DELAY, BrokerError::is_fatal, || connect(config, tls, bus)).await
}

/// Build the process registry holding the agent's broker connection.
pub async fn build_registry(
    config: &BrokerConnectionConfig,
    tls: &TlsFetcher,
    bus: &EventBus,
) -> Result<ConnectionRegistry, BrokerError> {
    let registry = ConnectionRegistry::new();
    let connection = connect_forever(config, tls, bus).await?;
    registry.register(config.key.clone(), connection);
    Ok(registry)
}
