// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory share-data store for the local control surface.
//!
//! The HTTP endpoint that serves it is an external collaborator; this crate
//! only owns the store and its expiry rules.
//!
//! Low-frequency control-plane traffic, so one store-wide RwLock is enough.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

#[derive(Clone, Default)]
pub struct ShareDataStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl ShareDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn put(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.write().insert(key.into(), Entry { value, expires_at });
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        self.entries.read().get(key).filter(|e| e.is_live(now)).map(|e| e.value.clone())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.write().remove(key).map(|e| e.value)
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
#[path = "share_data_tests.rs"]
mod tests;
