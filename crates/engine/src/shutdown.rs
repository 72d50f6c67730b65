// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-wide shutdown over `{identity_id}.shutdown`.

use crate::context::AgentContext;
use crate::error::JobError;
use ji_broker::{handler, Subscription};
use ji_core::{topic, BusSubscription};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Publishes the shutdown notice at most once per process.
#[derive(Clone)]
pub struct ShutdownNotice {
    ctx: AgentContext,
    sent: Arc<AtomicBool>,
}

impl ShutdownNotice {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx, sent: Arc::new(AtomicBool::new(false)) }
    }

    /// Returns false if a notice was already published.
    pub async fn publish(&self, reason: &str) -> bool {
        if self.sent.swap(true, Ordering::SeqCst) {
            tracing::debug!(reason, "shutdown notice already sent");
            return false;
        }
        let topic = topic::shutdown(&self.ctx.identity);
        match self.ctx.connection() {
            Some(conn) => {
                tracing::warn!(code = "JI-S201", %topic, reason, "requesting agent shutdown");
                conn.publish(&topic, reason).await;
            }
            None => {
                tracing::error!(code = "JI-S202", %topic, reason, "no broker connection for shutdown notice");
            }
        }
        true
    }

    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::SeqCst)
    }
}

type OnShutdown = Arc<dyn Fn(String) + Send + Sync>;

struct ListenerInner {
    ctx: AgentContext,
    on_shutdown: OnShutdown,
    sub: tokio::sync::Mutex<Option<Subscription>>,
    refresh: Mutex<Option<BusSubscription>>,
}

/// Ungrouped subscription on our shutdown topic, re-resolved after every
/// reconnect.
#[derive(Clone)]
pub struct ShutdownListener {
    inner: Arc<ListenerInner>,
}

impl ShutdownListener {
    pub async fn start(
        ctx: AgentContext,
        on_shutdown: impl Fn(String) + Send + Sync + 'static,
    ) -> Result<Self, JobError> {
        let listener = Self {
            inner: Arc::new(ListenerInner {
                ctx,
                on_shutdown: Arc::new(on_shutdown),
                sub: tokio::sync::Mutex::new(None),
                refresh: Mutex::new(None),
            }),
        };
        listener.resubscribe().await?;

        let weak: Weak<ListenerInner> = Arc::downgrade(&listener.inner);
        let runtime = tokio::runtime::Handle::current();
        let refresh = listener.inner.ctx.on_refresh(move || {
            let Some(inner) = weak.upgrade() else { return };
            let listener = ShutdownListener { inner };
            runtime.spawn(async move {
                if let Err(e) = listener.resubscribe().await {
                    tracing::error!(code = "JI-S203", error = %e, "shutdown listener resubscribe failed");
                }
            });
        });
        *listener.inner.refresh.lock() = Some(refresh);
        Ok(listener)
    }

    async fn resubscribe(&self) -> Result<(), JobError> {
        let inner = &self.inner;
        let mut current = inner.sub.lock().await;
        if let Some(old) = current.take() {
            old.cancel();
        }
        let conn = inner
            .ctx
            .connection()
            .ok_or_else(|| JobError::NoConnection(inner.ctx.connection_key().to_string()))?;
        let topic = topic::shutdown(&inner.ctx.identity);
        let on_shutdown = Arc::clone(&inner.on_shutdown);
        let sub = conn
            .subscribe(&topic, handler(move |payload| {
                tracing::info!(reason = %payload, "shutdown notice received");
                on_shutdown(payload);
            }))
            .await?;
        tracing::debug!(%topic, "listening for shutdown");
        *current = Some(sub);
        Ok(())
    }

    pub async fn stop(&self) {
        if let Some(refresh) = self.inner.refresh.lock().take() {
            self.inner.ctx.bus.unsubscribe(&refresh);
        }
        if let Some(sub) = self.inner.sub.lock().await.take() {
            sub.cancel();
        }
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
