// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process broker for tests.

use crate::connection::{BrokerConnection, MessageHandler, Subscription};
use crate::error::BrokerError;
use async_trait::async_trait;
use ji_core::BrokerKind;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct MemorySub {
    topic: String,
    group: Option<String>,
    token: CancellationToken,
    handler: MessageHandler,
}

#[derive(Default)]
struct MemoryState {
    subs: Vec<MemorySub>,
    published: Vec<(String, String)>,
    values: HashMap<String, String>,
    disconnected: bool,
}

/// Broker fake that records publishes and delivers them to in-process
/// subscribers. Grouped delivery picks the oldest live member per group.
#[derive(Clone)]
pub struct MemoryBroker {
    key: String,
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryBroker {
    pub fn new(key: &str) -> Self {
        Self { key: key.to_string(), inner: Arc::new(Mutex::new(MemoryState::default())) }
    }

    /// Every recorded publish, in order.
    pub fn published(&self) -> Vec<(String, String)> {
        self.inner.lock().published.clone()
    }

    /// Payloads published to `topic`, in order.
    pub fn published_to(&self, topic: &str) -> Vec<String> {
        self.inner
            .lock()
            .published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Topics in publish order.
    pub fn topics(&self) -> Vec<String> {
        self.inner.lock().published.iter().map(|(t, _)| t.clone()).collect()
    }

    /// Live subscriptions on `topic`.
    pub fn subscription_count(&self, topic: &str) -> usize {
        self.inner.lock().subs.iter().filter(|s| s.topic == topic && !s.token.is_cancelled()).count()
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.lock().disconnected = !connected;
    }

    /// Deliver an inbound message without recording it as a publish.
    pub fn inject(&self, topic: &str, payload: &str) -> usize {
        let handlers: Vec<MessageHandler> = {
            let mut state = self.inner.lock();
            state.subs.retain(|s| !s.token.is_cancelled());
            let mut groups_served = HashSet::new();
            state
                .subs
                .iter()
                .filter(|s| s.topic == topic)
                .filter(|s| match &s.group {
                    Some(group) => groups_served.insert(group.clone()),
                    None => true,
                })
                .map(|s| Arc::clone(&s.handler))
                .collect()
        };
        for handler in &handlers {
            handler(payload.to_string());
        }
        handlers.len()
    }

    fn add(&self, topic: &str, group: Option<&str>, handler: MessageHandler) -> Subscription {
        let token = CancellationToken::new();
        self.inner.lock().subs.push(MemorySub {
            topic: topic.to_string(),
            group: group.map(str::to_string),
            token: token.clone(),
            handler,
        });
        Subscription::new(topic, token)
    }
}

#[async_trait]
impl BrokerConnection for MemoryBroker {
    fn kind(&self) -> BrokerKind {
        BrokerKind::Topic
    }

    fn key(&self) -> &str {
        &self.key
    }

    async fn publish(&self, topic: &str, payload: &str) {
        self.inner.lock().published.push((topic.to_string(), payload.to_string()));
        self.inject(topic, payload);
    }

    async fn subscribe_grouped(
        &self,
        topic: &str,
        group: &str,
        handler: MessageHandler,
    ) -> Result<Subscription, BrokerError> {
        Ok(self.add(topic, Some(group), handler))
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: MessageHandler,
    ) -> Result<Subscription, BrokerError> {
        Ok(self.add(topic, None, handler))
    }

    fn is_connected(&self) -> bool {
        !self.inner.lock().disconnected
    }

    async fn get_key(&self, key: &str) -> Result<Option<String>, BrokerError> {
        Ok(self.inner.lock().values.get(key).cloned())
    }

    async fn set_key(&self, key: &str, value: &str, _ttl: Option<Duration>) -> Result<(), BrokerError> {
        self.inner.lock().values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
