// src/ratelimit.rs
// Per-app rate limiting (spec §6 registerApp's rateLimitPerMinute, spec §7
// QuotaError). Grounded in the teacher's RateLimiter
// (backend/src/utils/rate_limiter.rs), generalized from one fixed global
// limiter to one governor instance per app id, created lazily on first use.

use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovRateLimiter};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::CoreError;

type Limiter = GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub struct AppRateLimiter {
    limiters: RwLock<HashMap<String, Arc<Limiter>>>,
    clock: DefaultClock,
}

impl Default for AppRateLimiter {
    fn default() -> Self {
        Self {
            limiters: RwLock::new(HashMap::new()),
            clock: DefaultClock::default(),
        }
    }
}

impl AppRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn limiter_for(&self, app_id: &str, requests_per_minute: u32) -> Arc<Limiter> {
        if let Some(existing) = self.limiters.read().get(app_id) {
            return existing.clone();
        }
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute.max(1)).unwrap());
        self.limiters
            .write()
            .entry(app_id.to_string())
            .or_insert_with(|| Arc::new(GovRateLimiter::direct(quota)))
            .clone()
    }

    /// Non-blocking check against `app_id`'s configured per-minute quota.
    /// Returns `CoreError::Quota` with a retry-after estimate on rejection
    /// rather than making the caller wait, since ingestion is latency
    /// sensitive (spec §5 visibility target).
    pub fn check(&self, app_id: &str, requests_per_minute: u32) -> Result<(), CoreError> {
        let limiter = self.limiter_for(app_id, requests_per_minute);
        match limiter.check() {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                Err(CoreError::Quota {
                    subject: app_id.to_string(),
                    retry_after_ms: wait.as_millis() as u64,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_within_quota_succeeds() {
        let limiter = AppRateLimiter::new();
        assert!(limiter.check("app-1", 60).is_ok());
    }

    #[test]
    fn exhausted_quota_reports_retry_after() {
        let limiter = AppRateLimiter::new();
        assert!(limiter.check("app-2", 1).is_ok());
        let err = limiter.check("app-2", 1).unwrap_err();
        assert!(matches!(err, CoreError::Quota { .. }));
    }

    #[test]
    fn different_apps_have_independent_quotas() {
        let limiter = AppRateLimiter::new();
        assert!(limiter.check("a", 1).is_ok());
        assert!(limiter.check("b", 1).is_ok());
    }
}
