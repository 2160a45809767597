// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Ephemeral key-value storage for rate-limit counters.
//!
//! The store is a cache, not a ledger: entries expire at their TTL, may be
//! evicted early under capacity pressure, and reads and writes are separate
//! calls. Callers must tolerate a missing entry at any time.

use crate::clock::{Clock, SystemClock};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// A cached hit counter and the time it has left to live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedHits {
    pub count: u32,
    pub ttl: Duration,
}

/// TTL cache holding per-client hit counters.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Current counter for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Option<CachedHits>;

    /// Overwrite the counter for `key`, expiring after `ttl`.
    async fn put(&self, key: &str, count: u32, ttl: Duration);
}

#[derive(Debug)]
struct Slot {
    count: u32,
    expires_at: Instant,
}

/// In-process TTL cache with a capacity bound.
///
/// When full, inserting a new key first drops expired slots and then the
/// slot closest to expiry.
pub struct MemoryStore {
    slots: Arc<RwLock<HashMap<String, Slot>>>,
    clock: Arc<dyn Clock>,
    max_entries: usize,
}

impl MemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, Arc::new(SystemClock))
    }

    pub fn with_clock(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Arc::new(RwLock::new(HashMap::new())),
            clock,
            max_entries: max_entries.max(1),
        }
    }

    /// Number of slots currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    /// Drop expired slots (should be called periodically).
    pub async fn cleanup(&self) {
        let now = self.clock.now();
        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|_, slot| now < slot.expires_at);
        let removed = before - slots.len();
        if removed > 0 {
            debug!(removed, remaining = slots.len(), "Purged expired rate-limit entries");
        }
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<CachedHits> {
        let now = self.clock.now();
        let slots = self.slots.read().await;
        slots
            .get(key)
            .filter(|slot| now < slot.expires_at)
            .map(|slot| CachedHits {
                count: slot.count,
                ttl: slot.expires_at.duration_since(now),
            })
    }

    async fn put(&self, key: &str, count: u32, ttl: Duration) {
        let now = self.clock.now();
        let mut slots = self.slots.write().await;

        if !slots.contains_key(key) && slots.len() >= self.max_entries {
            slots.retain(|_, slot| now < slot.expires_at);
            if slots.len() >= self.max_entries {
                let victim = slots
                    .iter()
                    .min_by_key(|(_, slot)| slot.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(victim) = victim {
                    debug!(key = %victim, "Evicting rate-limit entry under capacity pressure");
                    slots.remove(&victim);
                }
            }
        }

        slots.insert(
            key.to_string(),
            Slot {
                count,
                expires_at: now + ttl,
            },
        );
    }
}
