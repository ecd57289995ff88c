//! Sign-in rate limiter, keyed by email

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of attempts allowed
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Ban duration in seconds
    pub ban_duration_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,
            ban_duration_seconds: 3600,
        }
    }
}

#[derive(Debug)]
struct Entry {
    attempts: u32,
    window_start: Instant,
    ban_expires: Option<Instant>,
}

impl Entry {
    /// Nothing left to remember: the ban is over, or the window closed without one
    fn is_stale(&self, now: Instant, window: Duration) -> bool {
        match self.ban_expires {
            Some(ban_expires) => now >= ban_expires,
            None => now.duration_since(self.window_start) >= window,
        }
    }
}

/// In-memory attempt counter shared by all handlers
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record an attempt for `key`. Returns false while the key is banned.
    pub async fn check(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = Duration::from_secs(self.config.window_seconds);

        entries.retain(|_, entry| !entry.is_stale(now, window));

        let entry = entries.entry(key.to_string()).or_insert(Entry {
            attempts: 0,
            window_start: now,
            ban_expires: None,
        });

        if let Some(ban_expires) = entry.ban_expires {
            if now < ban_expires {
                return false;
            }
            entry.attempts = 0;
            entry.window_start = now;
            entry.ban_expires = None;
        }

        if now.duration_since(entry.window_start) >= window {
            entry.attempts = 0;
            entry.window_start = now;
        }

        if entry.attempts >= self.config.max_attempts {
            entry.ban_expires = Some(now + Duration::from_secs(self.config.ban_duration_seconds));
            warn!(
                "Banned sign-in for {} for {} seconds",
                key, self.config.ban_duration_seconds
            );
            return false;
        }

        entry.attempts += 1;
        true
    }

    /// Forget `key`, e.g. after a successful sign-in
    pub async fn reset(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_attempts: u32, ban_duration_seconds: u64) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            max_attempts,
            window_seconds: 300,
            ban_duration_seconds,
        })
    }

    #[tokio::test]
    async fn test_blocks_after_max_attempts() {
        let limiter = limiter(3, 3600);

        for _ in 0..3 {
            assert!(limiter.check("jane@example.com").await);
        }
        assert!(!limiter.check("jane@example.com").await);
        assert!(!limiter.check("jane@example.com").await);

        assert!(limiter.check("john@example.com").await);
    }

    #[tokio::test]
    async fn test_reset_clears_attempts() {
        let limiter = limiter(1, 3600);

        assert!(limiter.check("jane@example.com").await);
        limiter.reset("jane@example.com").await;
        assert!(limiter.check("jane@example.com").await);
    }

    #[tokio::test]
    async fn test_stale_entries_are_pruned() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_attempts: 1,
            window_seconds: 0,
            ban_duration_seconds: 0,
        });

        for n in 0..50 {
            assert!(limiter.check(&format!("user{n}@example.com")).await);
        }
        assert_eq!(limiter.tracked().await, 1);

        let banned = self::limiter(1, 3600);
        assert!(banned.check("jane@example.com").await);
        assert!(!banned.check("jane@example.com").await);
        assert!(banned.check("john@example.com").await);
        assert_eq!(banned.tracked().await, 2);
    }

    #[tokio::test]
    async fn test_expired_ban_is_lifted() {
        let limiter = limiter(1, 0);

        assert!(limiter.check("jane@example.com").await);
        assert!(!limiter.check("jane@example.com").await);
        assert!(limiter.check("jane@example.com").await);
    }
}
