//! Login rate limiting keyed by client IP.
//!
//! Failures are counted in a fixed window that starts at the first failure.
//! Reaching the threshold blocks the client for [`LOGIN_BLOCK`]. A successful
//! login clears the client's record.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};
use tracing::warn;

pub const LOGIN_WINDOW: Duration = Duration::from_secs(10 * 60);
pub const LOGIN_BLOCK: Duration = Duration::from_secs(15 * 60);
pub const LOGIN_MAX_FAILURES: u32 = 8;

/// Unblocked records whose window started longer ago than this are dropped.
const STALE_AFTER: Duration = Duration::from_secs(3 * 10 * 60);

const UNKNOWN_KEY: &str = "unknown";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Allowance {
    pub allowed: bool,
    /// Zero when allowed, otherwise at least one.
    pub retry_after_seconds: u64,
}

impl Allowance {
    const ALLOWED: Self = Self {
        allowed: true,
        retry_after_seconds: 0,
    };
}

pub trait LoginRateLimiter: Send + Sync {
    /// Pure query; never changes the record for `key`.
    fn check_allowance(&self, key: &str) -> Allowance;
    fn record_result(&self, key: &str, success: bool);
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Clone, Copy, Debug)]
struct FailureRecord {
    failed_attempts: u32,
    window_started_at: Instant,
    blocked_until: Option<Instant>,
}

impl FailureRecord {
    fn is_blocked(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| until > now)
    }
}

/// Process-local limiter. Records are lost on restart.
pub struct InMemoryLoginRateLimiter {
    records: Mutex<HashMap<String, FailureRecord>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryLoginRateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn normalize_key(key: &str) -> &str {
        let key = key.trim();
        if key.is_empty() { UNKNOWN_KEY } else { key }
    }

    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<String, FailureRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| {
            warn!("Login rate limiter lock was poisoned; continuing");
            PoisonError::into_inner(poisoned)
        })
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.records().len()
    }
}

impl Default for InMemoryLoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryLoginRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLoginRateLimiter")
            .finish_non_exhaustive()
    }
}

fn collect_stale(records: &mut HashMap<String, FailureRecord>, now: Instant) {
    records.retain(|_, record| {
        record.is_blocked(now)
            || now.saturating_duration_since(record.window_started_at) <= STALE_AFTER
    });
}

/// Whole seconds until `until`, rounded up, never below one.
fn retry_after_seconds(until: Instant, now: Instant) -> u64 {
    let remaining = until.saturating_duration_since(now);
    let seconds = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    seconds.max(1)
}

impl LoginRateLimiter for InMemoryLoginRateLimiter {
    fn check_allowance(&self, key: &str) -> Allowance {
        let key = Self::normalize_key(key);
        let now = self.clock.now();
        let mut records = self.records();
        collect_stale(&mut records, now);

        match records.get(key).and_then(|record| record.blocked_until) {
            Some(until) if until > now => Allowance {
                allowed: false,
                retry_after_seconds: retry_after_seconds(until, now),
            },
            _ => Allowance::ALLOWED,
        }
    }

    fn record_result(&self, key: &str, success: bool) {
        let key = Self::normalize_key(key);
        let now = self.clock.now();
        let mut records = self.records();
        collect_stale(&mut records, now);

        if success {
            records.remove(key);
            return;
        }

        let record = records.entry(key.to_string()).or_insert(FailureRecord {
            failed_attempts: 0,
            window_started_at: now,
            blocked_until: None,
        });
        if now.saturating_duration_since(record.window_started_at) > LOGIN_WINDOW {
            record.failed_attempts = 0;
            record.window_started_at = now;
            record.blocked_until = None;
        }
        record.failed_attempts += 1;

        if record.failed_attempts >= LOGIN_MAX_FAILURES {
            warn!(client = key, "Login blocked after {} failures", record.failed_attempts);
            record.blocked_until = Some(now + LOGIN_BLOCK);
            record.failed_attempts = 0;
            record.window_started_at = now;
        }
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> (Arc<ManualClock>, InMemoryLoginRateLimiter) {
        let clock = Arc::new(ManualClock::new());
        let limiter = InMemoryLoginRateLimiter::with_clock(clock.clone());
        (clock, limiter)
    }

    fn fail(limiter: &InMemoryLoginRateLimiter, key: &str, times: u32) {
        for _ in 0..times {
            limiter.record_result(key, false);
        }
    }

    #[test]
    fn unknown_client_is_allowed() {
        let (_, limiter) = limiter();
        assert_eq!(limiter.check_allowance("1.2.3.4"), Allowance::ALLOWED);
    }

    #[test]
    fn seven_failures_stay_allowed() {
        let (_, limiter) = limiter();
        fail(&limiter, "1.2.3.4", LOGIN_MAX_FAILURES - 1);
        assert!(limiter.check_allowance("1.2.3.4").allowed);
    }

    #[test]
    fn eighth_failure_blocks_for_fifteen_minutes() {
        let (clock, limiter) = limiter();
        fail(&limiter, "1.2.3.4", LOGIN_MAX_FAILURES);

        let allowance = limiter.check_allowance("1.2.3.4");
        assert!(!allowance.allowed);
        assert_eq!(allowance.retry_after_seconds, 900);

        clock.advance(Duration::from_millis(1_500));
        assert_eq!(limiter.check_allowance("1.2.3.4").retry_after_seconds, 899);

        // Other clients are unaffected.
        assert!(limiter.check_allowance("5.6.7.8").allowed);
    }

    #[test]
    fn retry_after_never_drops_below_one() {
        let (clock, limiter) = limiter();
        fail(&limiter, "1.2.3.4", LOGIN_MAX_FAILURES);
        clock.advance(LOGIN_BLOCK - Duration::from_millis(10));
        let allowance = limiter.check_allowance("1.2.3.4");
        assert!(!allowance.allowed);
        assert_eq!(allowance.retry_after_seconds, 1);
    }

    #[test]
    fn block_expires() {
        let (clock, limiter) = limiter();
        fail(&limiter, "1.2.3.4", LOGIN_MAX_FAILURES);
        clock.advance(LOGIN_BLOCK);
        assert!(limiter.check_allowance("1.2.3.4").allowed);
    }

    #[test]
    fn success_clears_failures() {
        let (_, limiter) = limiter();
        fail(&limiter, "1.2.3.4", LOGIN_MAX_FAILURES - 1);
        limiter.record_result("1.2.3.4", true);
        fail(&limiter, "1.2.3.4", LOGIN_MAX_FAILURES - 1);
        assert!(limiter.check_allowance("1.2.3.4").allowed);
    }

    #[test]
    fn window_expiry_restarts_count() {
        let (clock, limiter) = limiter();
        fail(&limiter, "1.2.3.4", LOGIN_MAX_FAILURES - 1);
        clock.advance(LOGIN_WINDOW + Duration::from_secs(1));
        fail(&limiter, "1.2.3.4", LOGIN_MAX_FAILURES - 1);
        assert!(limiter.check_allowance("1.2.3.4").allowed);
        fail(&limiter, "1.2.3.4", 1);
        assert!(!limiter.check_allowance("1.2.3.4").allowed);
    }

    #[test]
    fn failures_inside_window_accumulate() {
        let (clock, limiter) = limiter();
        fail(&limiter, "1.2.3.4", 4);
        clock.advance(LOGIN_WINDOW);
        fail(&limiter, "1.2.3.4", 4);
        assert!(!limiter.check_allowance("1.2.3.4").allowed);
    }

    #[test]
    fn check_allowance_does_not_mutate() {
        let (_, limiter) = limiter();
        for _ in 0..20 {
            assert!(limiter.check_allowance("1.2.3.4").allowed);
        }
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn empty_key_is_unknown() {
        let (_, limiter) = limiter();
        fail(&limiter, "  ", LOGIN_MAX_FAILURES);
        assert!(!limiter.check_allowance("unknown").allowed);
        assert!(!limiter.check_allowance("").allowed);
    }

    #[test]
    fn stale_records_are_collected() {
        let (clock, limiter) = limiter();
        fail(&limiter, "1.2.3.4", 3);
        fail(&limiter, "5.6.7.8", LOGIN_MAX_FAILURES);
        assert_eq!(limiter.tracked(), 2);

        clock.advance(STALE_AFTER + Duration::from_secs(1));
        limiter.check_allowance("9.9.9.9");
        // The blocked record expired too, so both are gone.
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn blocked_records_survive_collection() {
        let (clock, limiter) = limiter();
        fail(&limiter, "5.6.7.8", LOGIN_MAX_FAILURES);
        fail(&limiter, "1.2.3.4", 1);
        clock.advance(Duration::from_secs(14 * 60));
        limiter.check_allowance("9.9.9.9");
        assert_eq!(limiter.tracked(), 2);
        assert!(!limiter.check_allowance("5.6.7.8").allowed);
    }
}
