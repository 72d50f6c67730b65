// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topic broker over NATS.
//!
//! The client reconnects on its own (fixed delay, unlimited attempts) and
//! keeps subscriptions alive across reconnects; the refresh notice is still
//! published so long-lived callers re-resolve.

use crate::connection::{BrokerConnection, MessageHandler, Subscription};
use crate::error::BrokerError;
use crate::reconnect::{LinkState, RECONNECT_DELAY};
use crate::tls::TrustMaterial;
use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use futures_util::StreamExt;
use ji_core::{AuthType, BrokerConnectionConfig, BrokerKind, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

/// JetStream bucket backing named-key get/set.
const KV_BUCKET: &str = "job_item";

pub struct TopicBroker {
    key: String,
    client: async_nats::Client,
    link: Arc<LinkState>,
    kv: OnceCell<kv::Store>,
}

impl TopicBroker {
    pub async fn connect(
        config: &BrokerConnectionConfig,
        tls: Option<&TrustMaterial>,
        bus: EventBus,
    ) -> Result<Self, BrokerError> {
        let scheme = if tls.is_some() { "tls" } else { "nats" };
        let url = format!("{scheme}://{}:{}", config.host, config.port);
        let link = Arc::new(LinkState::new(config.key.clone(), bus));

        let events = Arc::clone(&link);
        let mut options = async_nats::ConnectOptions::new()
            .name("job-item")
            .max_reconnects(None::<usize>)
            .reconnect_delay_callback(|_attempts| RECONNECT_DELAY)
            .event_callback(move |event| {
                let link = Arc::clone(&events);
                async move {
                    match event {
                        async_nats::Event::Disconnected => {
                            tracing::warn!(code = "JI-B102", "nats disconnected");
                            link.lost();
                        }
                        async_nats::Event::Connected => link.restored(),
                        other => tracing::debug!(event = ?other, "nats event"),
                    }
                }
            });

        options = match config.auth_type {
            AuthType::None => options,
            AuthType::Token => options.token(config.token.clone().unwrap_or_default()),
            AuthType::UserPassword | AuthType::UserPasswordBcrypt => options.user_and_password(
                config.user.clone().unwrap_or_default(),
                config.password.clone().unwrap_or_default(),
            ),
        };

        if let Some(tls) = tls {
            options = options.require_tls(true).add_root_certificates(tls.ca_file.clone());
            if let Some((cert, key)) = tls.client_identity() {
                options = options.add_client_certificate(cert.to_path_buf(), key.to_path_buf());
            }
        }

        let client = options.connect(url.as_str()).await.map_err(|e| BrokerError::Connect {
            kind: BrokerKind::Topic,
            target: url.clone(),
            message: e.to_string(),
        })?;
        tracing::info!(%url, key = %config.key, "connected to nats");

        Ok(Self { key: config.key.clone(), client, link, kv: OnceCell::new() })
    }

    async fn store(&self) -> Result<&kv::Store, BrokerError> {
        self.kv
            .get_or_try_init(|| async {
                let js = jetstream::new(self.client.clone());
                match js.get_key_value(KV_BUCKET).await {
                    Ok(store) => Ok(store),
                    Err(_) => js
                        .create_key_value(kv::Config {
                            bucket: KV_BUCKET.to_string(),
                            history: 1,
                            ..Default::default()
                        })
                        .await
                        .map_err(|e| BrokerError::command(BrokerKind::Topic, e)),
                }
            })
            .await
    }
}

/// Forward subscriber messages to `handler` until cancelled or closed.
fn pump(mut subscriber: async_nats::Subscriber, topic: &str, handler: MessageHandler) -> Subscription {
    let token = CancellationToken::new();
    let cancelled = token.clone();
    let owned_topic = topic.to_string();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancelled.cancelled() => {
                    if let Err(e) = subscriber.unsubscribe().await {
                        tracing::debug!(topic = %owned_topic, error = %e, "nats unsubscribe failed");
                    }
                    break;
                }
                message = subscriber.next() => match message {
                    Some(message) => handler(String::from_utf8_lossy(&message.payload).into_owned()),
                    None => break,
                },
            }
        }
    });
    Subscription::new(topic, token)
}

#[async_trait]
impl BrokerConnection for TopicBroker {
    fn kind(&self) -> BrokerKind {
        BrokerKind::Topic
    }

    fn key(&self) -> &str {
        &self.key
    }

    async fn publish(&self, topic: &str, payload: &str) {
        if let Err(e) = self.client.publish(topic.to_string(), payload.to_string().into()).await {
            tracing::error!(code = "JI-B103", topic, error = %e, "nats publish failed");
        }
    }

    async fn subscribe_grouped(
        &self,
        topic: &str,
        group: &str,
        handler: MessageHandler,
    ) -> Result<Subscription, BrokerError> {
        let subscriber = self
            .client
            .queue_subscribe(topic.to_string(), group.to_string())
            .await
            .map_err(|e| BrokerError::subscribe(BrokerKind::Topic, topic, e))?;
        Ok(pump(subscriber, topic, handler))
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: MessageHandler,
    ) -> Result<Subscription, BrokerError> {
        let subscriber = self
            .client
            .subscribe(topic.to_string())
            .await
            .map_err(|e| BrokerError::subscribe(BrokerKind::Topic, topic, e))?;
        Ok(pump(subscriber, topic, handler))
    }

    fn is_connected(&self) -> bool {
        matches!(self.client.connection_state(), async_nats::connection::State::Connected)
            && self.link.is_connected()
    }

    async fn get_key(&self, key: &str) -> Result<Option<String>, BrokerError> {
        let value = self
            .store()
            .await?
            .get(key)
            .await
            .map_err(|e| BrokerError::command(BrokerKind::Topic, e))?;
        Ok(value.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Bucket entries do not expire individually; `ttl` is ignored.
    async fn set_key(&self, key: &str, value: &str, _ttl: Option<Duration>) -> Result<(), BrokerError> {
        self.store()
            .await?
            .put(key, value.to_string().into())
            .await
            .map_err(|e| BrokerError::command(BrokerKind::Topic, e))?;
        Ok(())
    }
}
