//! Sliding-window denial rate limiting and cool-off lockout.
//!
//! Per spec §4.3: if a `(principal, toolName)` pair accumulates more than
//! `denial_threshold` DENY-or-user-rejected outcomes within `window`
//! seconds, subsequent checks return DENY with reason `"rate-limited"` for
//! `cooldown` seconds, regardless of what the rule set would otherwise say.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Sliding-window denial counters and lockout state, keyed by
/// `(principal, tool_name)`.
pub struct RateLimiter {
    denial_threshold: u32,
    window: Duration,
    cooldown: Duration,
    state: DashMap<(String, String), Counter>,
}

struct Counter {
    denials: Vec<Instant>,
    locked_until: Option<Instant>,
}

impl RateLimiter {
    /// Build a rate limiter with the given thresholds.
    #[must_use]
    pub fn new(denial_threshold: u32, window: Duration, cooldown: Duration) -> Self {
        Self {
            denial_threshold,
            window,
            cooldown,
            state: DashMap::new(),
        }
    }

    /// Record a denial (resolver DENY verdict, or a user rejecting an ASK
    /// prompt) for `(principal, tool_name)`. Trips the lockout once the
    /// sliding-window count exceeds the configured threshold.
    pub fn record_denial(&self, principal: &str, tool_name: &str) {
        let now = Instant::now();
        let key = (principal.to_string(), tool_name.to_string());
        let mut entry = self.state.entry(key).or_insert_with(|| Counter {
            denials: Vec::new(),
            locked_until: None,
        });
        entry.denials.retain(|t| now.duration_since(*t) <= self.window);
        entry.denials.push(now);
        if entry.denials.len() as u32 > self.denial_threshold {
            entry.locked_until = Some(now + self.cooldown);
        }
    }

    /// Whether `(principal, tool_name)` is currently locked out.
    #[must_use]
    pub fn is_locked_out(&self, principal: &str, tool_name: &str) -> bool {
        let key = (principal.to_string(), tool_name.to_string());
        let Some(mut entry) = self.state.get_mut(&key) else {
            return false;
        };
        match entry.locked_until {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                // Cooldown elapsed: clear state so the pair starts fresh.
                entry.locked_until = None;
                entry.denials.clear();
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_lockout_after_threshold_exceeded() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60), Duration::from_secs(300));
        for _ in 0..10 {
            limiter.record_denial("user", "bash");
            assert!(!limiter.is_locked_out("user", "bash"));
        }
        // The 11th denial exceeds the threshold of 10.
        limiter.record_denial("user", "bash");
        assert!(limiter.is_locked_out("user", "bash"));
    }

    #[test]
    fn distinct_pairs_have_independent_counters() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60), Duration::from_secs(300));
        limiter.record_denial("user", "bash");
        limiter.record_denial("user", "bash");
        assert!(limiter.is_locked_out("user", "bash"));
        assert!(!limiter.is_locked_out("user", "glob"));
        assert!(!limiter.is_locked_out("other-user", "bash"));
    }

    #[test]
    fn lockout_recovers_after_cooldown() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60), Duration::from_millis(10));
        limiter.record_denial("user", "bash");
        limiter.record_denial("user", "bash");
        assert!(limiter.is_locked_out("user", "bash"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(!limiter.is_locked_out("user", "bash"));
    }
}
