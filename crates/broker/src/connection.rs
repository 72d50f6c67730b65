// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability contract shared by every broker transport.

use crate::error::BrokerError;
use async_trait::async_trait;
use ji_core::BrokerKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Callback invoked with each message payload.
///
/// Runs on the subscription's pump task; long work must be spawned so the
/// next message is not held up.
pub type MessageHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Wrap a closure as a [`MessageHandler`].
pub fn handler(f: impl Fn(String) + Send + Sync + 'static) -> MessageHandler {
    Arc::new(f)
}

/// Live broker subscription. Cancel to stop delivery; dropping the handle
/// leaves the subscription running.
#[derive(Debug, Clone)]
pub struct Subscription {
    topic: String,
    token: CancellationToken,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, token: CancellationToken) -> Self {
        Self { topic: topic.into(), token }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Stop delivery and release transport resources.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Result of a blocking receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncReceive {
    Message(String),
    TimedOut,
}

impl SyncReceive {
    pub fn timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    pub fn into_message(self) -> Option<String> {
        match self {
            Self::Message(m) => Some(m),
            Self::TimedOut => None,
        }
    }
}

/// One broker transport.
///
/// Delivery guarantees for grouped subscriptions differ per transport:
/// - topic broker: native queue groups, one member receives each message
/// - queue broker: one shared auto-delete queue per topic, one consumer receives each message
/// - store broker: best effort only. Every subscriber sees every message and
///   a short-TTL lock decides who handles it, so a lock store outage or an
///   identical payload republished after the TTL can yield duplicates.
#[async_trait]
pub trait BrokerConnection: Send + Sync + 'static {
    fn kind(&self) -> BrokerKind;

    /// Registry key this connection was built for.
    fn key(&self) -> &str;

    /// Fire-and-forget publish. Failures are logged, never returned.
    async fn publish(&self, topic: &str, payload: &str);

    /// Competing-consumer subscription: at most one member of `group`
    /// handles each message.
    async fn subscribe_grouped(
        &self,
        topic: &str,
        group: &str,
        handler: MessageHandler,
    ) -> Result<Subscription, BrokerError>;

    /// Every subscriber receives every message.
    async fn subscribe(&self, topic: &str, handler: MessageHandler)
        -> Result<Subscription, BrokerError>;

    /// Block until one grouped message arrives or `timeout` elapses.
    async fn subscribe_grouped_sync(
        &self,
        topic: &str,
        group: &str,
        timeout: Duration,
    ) -> Result<SyncReceive, BrokerError> {
        let (handler, rx) = first_message();
        let sub = self.subscribe_grouped(topic, group, handler).await?;
        Ok(await_first(sub, rx, timeout).await)
    }

    /// Block until one message arrives or `timeout` elapses.
    async fn subscribe_sync(&self, topic: &str, timeout: Duration) -> Result<SyncReceive, BrokerError> {
        let (handler, rx) = first_message();
        let sub = self.subscribe(topic, handler).await?;
        Ok(await_first(sub, rx, timeout).await)
    }

    /// Non-blocking liveness probe.
    fn is_connected(&self) -> bool;

    async fn get_key(&self, key: &str) -> Result<Option<String>, BrokerError>;

    async fn set_key(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), BrokerError>;
}

fn first_message() -> (MessageHandler, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (handler(move |payload| drop(tx.send(payload))), rx)
}

/// Wait for the first message, cancelling the subscription on every path.
async fn await_first(
    sub: Subscription,
    mut rx: mpsc::UnboundedReceiver<String>,
    timeout: Duration,
) -> SyncReceive {
    let outcome = tokio::time::timeout(timeout, rx.recv()).await;
    sub.cancel();
    match outcome {
        Ok(Some(payload)) => SyncReceive::Message(payload),
        Ok(None) | Err(_) => SyncReceive::TimedOut,
    }
}
