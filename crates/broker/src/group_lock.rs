// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock-based consumer groups for transports without native grouping.
//!
//! Every subscriber receives every message; each one races to claim
//! `lock:{topic}:{group}:{sha256(payload)}` with a short TTL and only the
//! winner runs its handler. Topic and group appear verbatim in the key, so
//! different topics never collide. Job envelopes carry a unique task id, so
//! distinct messages hash apart; an identical payload republished after the
//! TTL expires is delivered again.

use crate::error::BrokerError;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Default lifetime of a group claim.
pub const GROUP_LOCK_TTL: Duration = Duration::from_secs(5);

/// Distributed set-if-absent with expiry.
#[async_trait]
pub trait GroupLock: Send + Sync + 'static {
    /// Returns true if this caller created the key.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, BrokerError>;
}

/// Lock key for one message in one consumer group.
pub fn lock_key(topic: &str, group: &str, payload: &str) -> String {
    let digest = Sha256::digest(payload.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("lock:{topic}:{group}:{hex}")
}

/// Decides whether this subscriber handles a grouped message.
pub struct GroupGate<L> {
    lock: L,
    ttl: Duration,
}

impl<L: GroupLock> GroupGate<L> {
    pub fn new(lock: L, ttl: Duration) -> Self {
        Self { lock, ttl }
    }

    /// True if this subscriber won the claim. Lock store failures drop the
    /// message rather than risk a duplicate.
    pub async fn admit(&self, topic: &str, group: &str, payload: &str) -> bool {
        let key = lock_key(topic, group, payload);
        match self.lock.try_acquire(&key, self.ttl).await {
            Ok(won) => {
                if !won {
                    tracing::trace!(topic, group, "group claim lost");
                }
                won
            }
            Err(e) => {
                tracing::warn!(code = "JI-B201", topic, group, error = %e, "group claim failed, dropping message");
                false
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
mod memory {
    use super::GroupLock;
    use crate::error::BrokerError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    /// Shared in-process lock table standing in for a lock store.
    #[derive(Clone, Default)]
    pub struct MemoryLock {
        claims: Arc<Mutex<HashMap<String, Instant>>>,
    }

    impl MemoryLock {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl GroupLock for MemoryLock {
        async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, BrokerError> {
            let now = Instant::now();
            let mut claims = self.claims.lock();
            match claims.get(key) {
                Some(expires) if *expires > now => Ok(false),
                _ => {
                    claims.insert(key.to_string(), now + ttl);
                    Ok(true)
                }
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryLock;

#[cfg(test)]
#[path = "group_lock_tests.rs"]
mod tests;
