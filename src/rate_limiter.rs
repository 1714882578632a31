// =============================================================================
// Per-recipient rate limiter — token bucket keyed by contact
// =============================================================================
//
// Generalizes the teacher's single global `RateLimitTracker` (one process-
// wide atomic counter) to a per-recipient `governor` GCRA bucket stored in a
// `DashMap` keyed on contact. No persistence; the map is an explicit
// in-memory process-wide structure (spec §9: "no process-global mutable
// state beyond the rate-limit bucket map").

use std::num::NonZeroU32;
use std::sync::Arc;

use dashmap::DashMap;
use governor::{DefaultDirectRateLimiter, Quota};

pub struct RecipientRateLimiter {
    buckets: DashMap<String, Arc<DefaultDirectRateLimiter>>,
    quota: Quota,
}

impl RecipientRateLimiter {
    /// `capacity` tokens, refilling at `refill_per_minute` per 60 seconds.
    pub fn new(capacity: u32, refill_per_minute: u32) -> Self {
        let capacity = NonZeroU32::new(capacity.max(1)).unwrap();
        let refill = NonZeroU32::new(refill_per_minute.max(1)).unwrap();
        let quota = Quota::per_minute(refill).allow_burst(capacity);
        Self { buckets: DashMap::new(), quota }
    }

    /// Returns `true` if a send to `contact` is allowed right now, consuming
    /// a token. `false` means the caller should treat this as a transient
    /// `Throttled` condition.
    pub fn check(&self, contact: &str) -> bool {
        let bucket = self
            .buckets
            .entry(contact.to_string())
            .or_insert_with(|| Arc::new(governor::RateLimiter::direct(self.quota)))
            .clone();
        bucket.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_tokens_allowed_before_throttling() {
        let limiter = RecipientRateLimiter::new(3, 60);
        assert!(limiter.check("+1555"));
        assert!(limiter.check("+1555"));
        assert!(limiter.check("+1555"));
        assert!(!limiter.check("+1555"));
    }

    #[test]
    fn buckets_are_independent_per_contact() {
        let limiter = RecipientRateLimiter::new(1, 60);
        assert!(limiter.check("a"));
        assert!(limiter.check("b"));
        assert!(!limiter.check("a"));
    }
}
