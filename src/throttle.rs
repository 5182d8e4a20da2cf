//! Per-channel rate limiting for non-critical notification updates
//!
//! Token bucket per destination channel. Refill is driven by the scheduler's
//! cadence (tokens per reconciliation cycle, not per unit time), so a slow
//! polling loop throttles sends proportionally. Buckets are created lazily
//! and evicted after a period of inactivity.

use crate::types::ChannelId;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Token bucket tuning
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Maximum tokens a bucket can hold
    pub capacity: u32,
    /// Tokens added at the start of every reconciliation cycle
    pub refill_per_cycle: u32,
    /// Buckets untouched for this long are evicted
    pub idle_eviction: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            refill_per_cycle: 2,
            idle_eviction: Duration::minutes(30),
        }
    }
}

#[derive(Debug, Clone)]
struct Bucket {
    last_update: DateTime<Utc>,
    tokens: u32,
}

/// Process-wide per-channel token bucket table.
///
/// Only `alive`/`missing` status updates consume tokens; lobby creation and
/// `dead` updates bypass the limiter entirely.
#[derive(Debug)]
pub struct RateLimiter {
    config: ThrottleConfig,
    buckets: Mutex<HashMap<ChannelId, Bucket>>,
}

impl RateLimiter {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Take one token for a send to `channel`. Returns false when the bucket
    /// is exhausted and the update should be shed.
    pub fn try_acquire(&self, channel: &str, now: DateTime<Utc>) -> bool {
        let Ok(mut buckets) = self.buckets.lock() else {
            return false;
        };
        let bucket = buckets
            .entry(channel.to_string())
            .or_insert_with(|| Bucket {
                last_update: now,
                tokens: self.config.capacity,
            });
        bucket.last_update = now;
        if bucket.tokens == 0 {
            debug!(channel, "Shedding update, bucket exhausted");
            return false;
        }
        bucket.tokens -= 1;
        true
    }

    /// Cycle boundary: refill every bucket (capped at capacity) and evict
    /// buckets idle past the eviction window.
    pub fn replenish(&self, now: DateTime<Utc>) {
        let Ok(mut buckets) = self.buckets.lock() else {
            return;
        };
        buckets.retain(|channel, bucket| {
            if now - bucket.last_update > self.config.idle_eviction {
                debug!(channel, "Evicting idle throttle bucket");
                return false;
            }
            bucket.tokens = (bucket.tokens + self.config.refill_per_cycle).min(self.config.capacity);
            true
        });
    }

    /// Current token count for a channel, if a bucket exists (test hook)
    pub fn bucket_level(&self, channel: &str) -> Option<u32> {
        let buckets = self.buckets.lock().ok()?;
        buckets.get(channel).map(|b| b.tokens)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(ThrottleConfig::default())
    }

    #[test]
    fn test_fresh_bucket_accepts_capacity_then_sheds() {
        let limiter = limiter();
        let now = Utc::now();
        let accepted = (0..12).filter(|_| limiter.try_acquire("chan", now)).count();
        assert_eq!(accepted, 10);
        assert_eq!(limiter.bucket_level("chan"), Some(0));
    }

    #[test]
    fn test_refill_is_capped_at_capacity() {
        let limiter = limiter();
        let now = Utc::now();
        assert!(limiter.try_acquire("chan", now));
        for _ in 0..10 {
            limiter.replenish(now);
        }
        assert_eq!(limiter.bucket_level("chan"), Some(10));
    }

    #[test]
    fn test_refill_restores_two_tokens_per_cycle() {
        let limiter = limiter();
        let now = Utc::now();
        while limiter.try_acquire("chan", now) {}
        limiter.replenish(now);
        assert_eq!(limiter.bucket_level("chan"), Some(2));
        assert!(limiter.try_acquire("chan", now));
        assert!(limiter.try_acquire("chan", now));
        assert!(!limiter.try_acquire("chan", now));
    }

    #[test]
    fn test_idle_buckets_are_evicted() {
        let limiter = limiter();
        let now = Utc::now();
        assert!(limiter.try_acquire("chan", now));
        limiter.replenish(now + Duration::minutes(31));
        assert_eq!(limiter.bucket_level("chan"), None);

        // Active buckets survive
        assert!(limiter.try_acquire("chan", now));
        limiter.replenish(now + Duration::minutes(29));
        assert!(limiter.bucket_level("chan").is_some());
    }

    #[test]
    fn test_channels_are_independent() {
        let limiter = limiter();
        let now = Utc::now();
        while limiter.try_acquire("a", now) {}
        assert!(limiter.try_acquire("b", now));
        assert_eq!(limiter.bucket_level("a"), Some(0));
    }
}
