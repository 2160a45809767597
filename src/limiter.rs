// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter for contact submissions.
//!
//! Each client key gets `max_requests` hits per window. The first hit opens
//! the window; later hits inside it keep the window's remaining TTL, so the
//! window never slides.
//!
//! The limiter is best-effort. It reads the counter and writes it back as two
//! separate store calls without holding a lock across them, so two concurrent
//! requests from one client can both read the same count and under-count by
//! one. The backing store may also forget a client early. Both are accepted:
//! the goal is deterrence, not metering.

use crate::config::RateLimitConfig;
use crate::store::{CachedHits, RateLimitStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        /// Remaining requests in current window
        remaining: u32,
        /// Time until window resets
        reset_in: Duration,
    },
    /// Request is rate limited
    Limited {
        /// Time until the window expires
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

/// Per-client hit counter over an injected TTL store.
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self { config, store }
    }

    /// Count a hit for `key` unless it is already over the threshold.
    pub async fn check_and_increment(&self, key: &str) -> RateLimitResult {
        let CachedHits { count, ttl } = self.store.get(key).await.unwrap_or(CachedHits {
            count: 0,
            ttl: self.config.window_duration(),
        });

        if count >= self.config.max_requests {
            debug!(client = %key, count, retry_after = ?ttl, "Client rate limit exceeded");
            return RateLimitResult::Limited { retry_after: ttl };
        }

        self.store.put(key, count + 1, ttl).await;

        RateLimitResult::Allowed {
            remaining: self.config.max_requests - count - 1,
            reset_in: ttl,
        }
    }
}
