// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store broker over Redis pub/sub.
//!
//! Redis has no consumer groups, so grouped subscriptions go through a
//! [`GroupGate`] backed by `SET NX PX`. This is best-effort at-most-once
//! delivery, weaker than the other transports.

use crate::connection::{BrokerConnection, MessageHandler, Subscription};
use crate::error::BrokerError;
use crate::group_lock::{GroupGate, GroupLock, GROUP_LOCK_TTL};
use crate::reconnect::{LinkState, RECONNECT_DELAY};
use crate::tls::TrustMaterial;
use crate::uri;
use async_trait::async_trait;
use futures_util::StreamExt;
use ji_core::{BrokerConnectionConfig, BrokerKind, EventBus};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn store_error(e: redis::RedisError) -> BrokerError {
    BrokerError::command(BrokerKind::Store, e)
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// `SET key 1 NX PX ttl` on the shared connection.
#[derive(Clone)]
pub struct RedisLock {
    conn: ConnectionManager,
}

#[async_trait]
impl GroupLock for RedisLock {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, BrokerError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(reply.is_some())
    }
}

struct StoreInner {
    key: String,
    client: redis::Client,
    conn: ConnectionManager,
    gate: GroupGate<RedisLock>,
    link: LinkState,
}

impl StoreInner {
    async fn ping(&self) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await.map_err(store_error)?;
        Ok(())
    }

    /// A pub/sub stream ended: ping until the server answers, then announce.
    fn connection_lost(self: &Arc<Self>) {
        tracing::warn!(code = "JI-B121", key = %self.key, "redis pubsub stream closed");
        if !self.link.lost() {
            return;
        }
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(RECONNECT_DELAY).await;
                match inner.ping().await {
                    Ok(()) => break,
                    Err(e) => {
                        tracing::warn!(code = "JI-B122", key = %inner.key, error = %e, "redis still unreachable");
                    }
                }
            }
            inner.link.restored();
        });
    }
}

pub struct StoreBroker {
    inner: Arc<StoreInner>,
}

impl StoreBroker {
    pub async fn connect(
        config: &BrokerConnectionConfig,
        tls: Option<&TrustMaterial>,
        bus: EventBus,
    ) -> Result<Self, BrokerError> {
        let scheme = if tls.is_some() { "rediss" } else { "redis" };
        let db = config.db.unwrap_or(0);
        let url = uri::build(
            scheme,
            config.user.as_deref(),
            config.password.as_deref(),
            &config.host,
            config.port,
            &format!("/{db}"),
        );
        let target = format!("{scheme}://{}:{}/{db}", config.host, config.port);
        let connect_error = |e: redis::RedisError| BrokerError::Connect {
            kind: BrokerKind::Store,
            target: target.clone(),
            message: e.to_string(),
        };

        let client = match tls {
            Some(tls) => {
                let client_tls = match tls.client_identity() {
                    Some((cert, key)) => Some(redis::ClientTlsConfig {
                        client_cert: read(cert)?,
                        client_key: read(key)?,
                    }),
                    None => None,
                };
                let certs = redis::TlsCertificates { client_tls, root_cert: Some(tls.read_ca()?) };
                redis::Client::build_with_tls(url.as_str(), certs)
            }
            None => redis::Client::open(url.as_str()),
        }
        .map_err(connect_error)?;
        let conn = client.get_connection_manager().await.map_err(connect_error)?;

        let inner = Arc::new(StoreInner {
            key: config.key.clone(),
            client,
            conn: conn.clone(),
            gate: GroupGate::new(RedisLock { conn }, GROUP_LOCK_TTL),
            link: LinkState::new(config.key.clone(), bus),
        });
        inner.ping().await?;
        tracing::info!(%target, key = %config.key, "connected to redis");
        Ok(Self { inner })
    }

    async fn listen(
        &self,
        topic: &str,
        group: Option<&str>,
        handler: MessageHandler,
    ) -> Result<Subscription, BrokerError> {
        let mut pubsub = self
            .inner
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| BrokerError::subscribe(BrokerKind::Store, topic, e))?;
        pubsub
            .subscribe(topic)
            .await
            .map_err(|e| BrokerError::subscribe(BrokerKind::Store, topic, e))?;

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let inner = Arc::clone(&self.inner);
        let topic_owned = topic.to_string();
        let group = group.map(str::to_string);
        tokio::spawn(async move {
            let stream_closed = {
                let mut messages = pubsub.on_message();
                loop {
                    tokio::select! {
                        _ = cancelled.cancelled() => break false,
                        message = messages.next() => {
                            let Some(message) = message else { break true };
                            let payload: String = match message.get_payload() {
                                Ok(payload) => payload,
                                Err(e) => {
                                    tracing::warn!(code = "JI-B123", topic = %topic_owned, error = %e, "undecodable redis payload");
                                    continue;
                                }
                            };
                            if let Some(group) = &group {
                                if !inner.gate.admit(&topic_owned, group, &payload).await {
                                    continue;
                                }
                            }
                            handler(payload);
                        }
                    }
                }
            };
            if stream_closed {
                inner.connection_lost();
            } else if let Err(e) = pubsub.unsubscribe(&topic_owned).await {
                tracing::debug!(topic = %topic_owned, error = %e, "redis unsubscribe failed");
            }
        });
        Ok(Subscription::new(topic, token))
    }
}

fn read(path: &std::path::Path) -> Result<Vec<u8>, BrokerError> {
    std::fs::read(path).map_err(|source| {
        BrokerError::Tls(crate::tls::TlsError::Io { path: path.to_path_buf(), source })
    })
}

#[async_trait]
impl BrokerConnection for StoreBroker {
    fn kind(&self) -> BrokerKind {
        BrokerKind::Store
    }

    fn key(&self) -> &str {
        &self.inner.key
    }

    async fn publish(&self, topic: &str, payload: &str) {
        let mut conn = self.inner.conn.clone();
        let result: Result<i64, _> =
            redis::cmd("PUBLISH").arg(topic).arg(payload).query_async(&mut conn).await;
        if let Err(e) = result {
            tracing::error!(code = "JI-B124", topic, error = %e, "redis publish failed");
        }
    }

    async fn subscribe_grouped(
        &self,
        topic: &str,
        group: &str,
        handler: MessageHandler,
    ) -> Result<Subscription, BrokerError> {
        self.listen(topic, Some(group), handler).await
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: MessageHandler,
    ) -> Result<Subscription, BrokerError> {
        self.listen(topic, None, handler).await
    }

    fn is_connected(&self) -> bool {
        self.inner.link.is_connected()
    }

    async fn get_key(&self, key: &str) -> Result<Option<String>, BrokerError> {
        let mut conn = self.inner.conn.clone();
        redis::cmd("GET").arg(key).query_async(&mut conn).await.map_err(store_error)
    }

    async fn set_key(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), BrokerError> {
        let mut conn = self.inner.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let _: String = cmd.query_async(&mut conn).await.map_err(store_error)?;
        Ok(())
    }
}
