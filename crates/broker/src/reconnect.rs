// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-delay, unbounded reconnect policy.

use ji_core::{topic, EventBus};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Delay between reconnect attempts. There is no ceiling and no attempt limit.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Retry `attempt` until it succeeds or fails with an error `is_fatal`
/// accepts, sleeping `delay` between tries.
pub async fn retry_forever<T, E, F, Fut>(
    what: &str,
    delay: Duration,
    is_fatal: impl Fn(&E) -> bool,
    mut attempt: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut tries: u64 = 0;
    loop {
        tries += 1;
        match attempt().await {
            Ok(value) => {
                if tries > 1 {
                    tracing::info!(what, tries, "connected after retry");
                }
                return Ok(value);
            }
            Err(e) if is_fatal(&e) => return Err(e),
            Err(e) => {
                tracing::warn!(code = "JI-B101", what, tries, error = %e, retry_in = ?delay, "connect failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Tracks a connection's up/down state and announces recoveries on the
/// Local Event Bus so long-lived subscribers re-resolve their handles.
pub struct LinkState {
    key: String,
    bus: EventBus,
    connected: AtomicBool,
    recovering: AtomicBool,
}

impl LinkState {
    pub fn new(key: impl Into<String>, bus: EventBus) -> Self {
        Self {
            key: key.into(),
            bus,
            connected: AtomicBool::new(true),
            recovering: AtomicBool::new(false),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Mark the link down. Returns true for the caller that should drive
    /// recovery; concurrent losses collapse into one recovery.
    pub fn lost(&self) -> bool {
        self.connected.store(false, Ordering::SeqCst);
        !self.recovering.swap(true, Ordering::SeqCst)
    }

    /// Mark the link up and publish the refresh notice if it had been lost.
    pub fn restored(&self) {
        self.connected.store(true, Ordering::SeqCst);
        if self.recovering.swap(false, Ordering::SeqCst) {
            tracing::info!(key = %self.key, "broker reconnected, announcing refresh");
            self.bus.publish(topic::REFRESH_NOTICE, &self.key);
        }
    }
}

#[cfg(test)]
#[path = "reconnect_tests.rs"]
mod tests;
