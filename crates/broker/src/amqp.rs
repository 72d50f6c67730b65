// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue broker over AMQP.
//!
//! Grouping uses one shared, non-durable, auto-delete queue per topic:
//! every consumer of that queue competes for messages. Cancelling a
//! subscription deletes the queue. A lost connection is re-dialed every
//! [`RECONNECT_DELAY`] until it comes back, then the refresh notice fires.

use crate::connection::{BrokerConnection, MessageHandler, Subscription};
use crate::error::BrokerError;
use crate::reconnect::{retry_forever, LinkState, RECONNECT_DELAY};
use crate::tls::TrustMaterial;
use crate::uri;
use async_trait::async_trait;
use futures_util::StreamExt;
use ji_core::{BrokerConnectionConfig, BrokerKind, EventBus};
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, QueueBindOptions, QueueDeclareOptions,
    QueueDeleteOptions,
};
use lapin::tcp::OwnedTLSConfig;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct QueueInner {
    key: String,
    uri: String,
    exchange: Option<String>,
    ca_pem: Option<String>,
    link: LinkState,
    runtime: tokio::runtime::Handle,
    channel: RwLock<Option<Channel>>,
    // Held so the connection outlives every channel
    connection: Mutex<Option<Connection>>,
}

impl QueueInner {
    async fn dial(self: &Arc<Self>) -> Result<(), BrokerError> {
        let connect_error = |e: lapin::Error| BrokerError::Connect {
            kind: BrokerKind::Queue,
            target: self.uri_for_logs(),
            message: e.to_string(),
        };
        let connection = match &self.ca_pem {
            Some(pem) => {
                let tls = OwnedTLSConfig { identity: None, cert_chain: Some(pem.clone()) };
                Connection::connect_with_config(&self.uri, ConnectionProperties::default(), tls)
                    .await
            }
            None => Connection::connect(&self.uri, ConnectionProperties::default()).await,
        }
        .map_err(connect_error)?;
        let channel = connection.create_channel().await.map_err(connect_error)?;

        let weak: Weak<Self> = Arc::downgrade(self);
        connection.on_error(move |err| {
            if let Some(inner) = weak.upgrade() {
                inner.connection_lost(err);
            }
        });

        *self.channel.write() = Some(channel);
        *self.connection.lock() = Some(connection);
        tracing::info!(target_uri = %self.uri_for_logs(), key = %self.key, "connected to amqp");
        Ok(())
    }

    /// Called from the client's error callback, which may run off-runtime.
    fn connection_lost(self: &Arc<Self>, err: lapin::Error) {
        tracing::warn!(code = "JI-B111", key = %self.key, error = %err, "amqp connection lost");
        self.channel.write().take();
        if !self.link.lost() {
            return;
        }
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            tokio::time::sleep(RECONNECT_DELAY).await;
            // dial never fails fatally, so this only returns once reconnected
            if retry_forever("amqp", RECONNECT_DELAY, |_| false, || inner.dial()).await.is_ok() {
                inner.link.restored();
            }
        });
    }

    fn channel(&self) -> Result<Channel, BrokerError> {
        self.channel.read().clone().ok_or_else(|| BrokerError::Command {
            kind: BrokerKind::Queue,
            message: "channel unavailable, reconnecting".to_string(),
        })
    }

    fn uri_for_logs(&self) -> String {
        match self.uri.split_once('@') {
            Some((scheme_and_auth, host)) => {
                let scheme = scheme_and_auth.split("://").next().unwrap_or("amqp");
                format!("{scheme}://***@{host}")
            }
            None => self.uri.clone(),
        }
    }
}

pub struct QueueBroker {
    inner: Arc<QueueInner>,
}

impl QueueBroker {
    pub async fn connect(
        config: &BrokerConnectionConfig,
        tls: Option<&TrustMaterial>,
        bus: EventBus,
    ) -> Result<Self, BrokerError> {
        let scheme = if tls.is_some() { "amqps" } else { "amqp" };
        let ca_pem = match tls {
            Some(tls) => {
                if tls.client_identity().is_some() {
                    tracing::warn!(code = "JI-B112", "amqp client certificates are not supported, using CA only");
                }
                Some(String::from_utf8_lossy(&tls.read_ca()?).into_owned())
            }
            None => None,
        };
        let inner = Arc::new(QueueInner {
            key: config.key.clone(),
            uri: uri::build(
                scheme,
                config.user.as_deref(),
                config.password.as_deref(),
                &config.host,
                config.port,
                "/",
            ),
            exchange: config.exchange.clone().filter(|e| !e.is_empty()),
            ca_pem,
            link: LinkState::new(config.key.clone(), bus),
            runtime: tokio::runtime::Handle::current(),
            channel: RwLock::new(None),
            connection: Mutex::new(None),
        });
        inner.dial().await?;
        Ok(Self { inner })
    }

    /// Declare (and bind) the queue that backs a subscription.
    async fn declare(&self, channel: &Channel, topic: &str, shared: bool) -> Result<String, BrokerError> {
        let options = QueueDeclareOptions {
            durable: false,
            auto_delete: true,
            exclusive: !shared,
            ..Default::default()
        };
        let name = if shared { topic } else { "" };
        let queue = channel
            .queue_declare(name, options, FieldTable::default())
            .await
            .map_err(|e| BrokerError::subscribe(BrokerKind::Queue, topic, e))?;
        let queue_name = queue.name().as_str().to_string();
        if let Some(exchange) = &self.inner.exchange {
            channel
                .queue_bind(&queue_name, exchange, topic, QueueBindOptions::default(), FieldTable::default())
                .await
                .map_err(|e| BrokerError::subscribe(BrokerKind::Queue, topic, e))?;
        }
        Ok(queue_name)
    }

    async fn consume(
        &self,
        topic: &str,
        shared: bool,
        handler: MessageHandler,
    ) -> Result<Subscription, BrokerError> {
        let channel = self.inner.channel()?;
        let queue = self.declare(&channel, topic, shared).await?;
        let options = BasicConsumeOptions { no_ack: true, ..Default::default() };
        let mut consumer = channel
            .basic_consume(&queue, "", options, FieldTable::default())
            .await
            .map_err(|e| BrokerError::subscribe(BrokerKind::Queue, topic, e))?;

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let owned_topic = topic.to_string();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => {
                        if let Err(e) = channel.queue_delete(&queue, QueueDeleteOptions::default()).await {
                            tracing::debug!(topic = %owned_topic, error = %e, "amqp queue delete failed");
                        }
                        break;
                    }
                    delivery = consumer.next() => match delivery {
                        Some(Ok(delivery)) => handler(String::from_utf8_lossy(&delivery.data).into_owned()),
                        Some(Err(e)) => {
                            tracing::warn!(code = "JI-B113", topic = %owned_topic, error = %e, "amqp consumer failed");
                            break;
                        }
                        None => break,
                    },
                }
            }
        });
        Ok(Subscription::new(topic, token))
    }
}

#[async_trait]
impl BrokerConnection for QueueBroker {
    fn kind(&self) -> BrokerKind {
        BrokerKind::Queue
    }

    fn key(&self) -> &str {
        &self.inner.key
    }

    async fn publish(&self, topic: &str, payload: &str) {
        let channel = match self.inner.channel() {
            Ok(channel) => channel,
            Err(e) => {
                tracing::error!(code = "JI-B114", topic, error = %e, "amqp publish skipped");
                return;
            }
        };
        let exchange = self.inner.exchange.as_deref().unwrap_or("");
        let result = channel
            .basic_publish(
                exchange,
                topic,
                BasicPublishOptions::default(),
                payload.as_bytes(),
                BasicProperties::default().with_content_type("text/plain".into()),
            )
            .await;
        if let Err(e) = result {
            tracing::error!(code = "JI-B115", topic, error = %e, "amqp publish failed");
        }
    }

    async fn subscribe_grouped(
        &self,
        topic: &str,
        _group: &str,
        handler: MessageHandler,
    ) -> Result<Subscription, BrokerError> {
        self.consume(topic, true, handler).await
    }

    /// With an exchange configured each subscriber gets its own bound queue;
    /// on the default exchange the topic queue is shared.
    async fn subscribe(
        &self,
        topic: &str,
        handler: MessageHandler,
    ) -> Result<Subscription, BrokerError> {
        let shared = self.inner.exchange.is_none();
        self.consume(topic, shared, handler).await
    }

    fn is_connected(&self) -> bool {
        self.inner.link.is_connected() && self.inner.channel.read().is_some()
    }

    async fn get_key(&self, _key: &str) -> Result<Option<String>, BrokerError> {
        Err(BrokerError::Unsupported { kind: BrokerKind::Queue, operation: "get_key" })
    }

    async fn set_key(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), BrokerError> {
        Err(BrokerError::Unsupported { kind: BrokerKind::Queue, operation: "set_key" })
    }
}
