// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ji-broker: broker transports behind one capability contract

mod amqp;
mod connection;
mod error;
mod factory;
mod group_lock;
mod nats;
mod reconnect;
mod redis_store;
mod registry;
mod tls;
mod uri;

#[cfg(any(test, feature = "test-support"))]
mod memory;

pub use amqp::QueueBroker;
pub use connection::{handler, BrokerConnection, MessageHandler, Subscription, SyncReceive};
pub use error::BrokerError;
pub use factory::{build_registry, connect, connect_forever};
pub use group_lock::{lock_key, GroupGate, GroupLock, GROUP_LOCK_TTL};
pub use nats::TopicBroker;
pub use reconnect::{retry_forever, LinkState, RECONNECT_DELAY};
pub use redis_store::{RedisLock, StoreBroker};
pub use registry::ConnectionRegistry;
pub use tls::{install_bundle, TlsError, TlsFetcher, TrustMaterial};

#[cfg(any(test, feature = "test-support"))]
pub use group_lock::MemoryLock;
#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryBroker;
