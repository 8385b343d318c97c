//! Login throttling
//!
//! Counts login attempts per client and username. Unknown usernames are
//! counted exactly like known ones, so a lockout says nothing about whether
//! an account exists.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

use crate::config::{duration_var, number_var};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Failed attempts allowed inside one window
    pub max_failures: u32,
    /// Window in which failures are counted
    pub window: Duration,
    /// How long a client stays locked out of a username once the limit is hit
    pub lockout: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            window: Duration::from_secs(300),
            lockout: Duration::from_secs(900),
        }
    }
}

impl RateLimiterConfig {
    /// # Environment Variables
    /// - `LOGIN_MAX_FAILURES` (default: 5)
    /// - `LOGIN_FAILURE_WINDOW` (default: `5m`)
    /// - `LOGIN_LOCKOUT` (default: `15m`)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_failures: number_var("LOGIN_MAX_FAILURES", defaults.max_failures)?,
            window: duration_var("LOGIN_FAILURE_WINDOW", "5m")?,
            lockout: duration_var("LOGIN_LOCKOUT", "15m")?,
        })
    }
}

#[derive(Debug)]
struct Entry {
    attempts: u32,
    window_start: Instant,
    locked_at: Option<Instant>,
}

impl Entry {
    fn fresh(now: Instant) -> Self {
        Self {
            attempts: 0,
            window_start: now,
            locked_at: None,
        }
    }
}

/// Per-key attempt counter with temporary lockout
///
/// Every attempt is counted when it starts; a successful one calls
/// [`RateLimiter::reset`]. Checking and counting share one lock, so
/// concurrent attempts can never get past `max_failures`.
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

    /// Reserve an attempt for `key`, returning `false` while it is locked
    pub async fn try_acquire(&self, key: &str) -> bool {
        self.try_acquire_at(key, Instant::now()).await
    }

    /// Forget all attempts for `key`
    pub async fn reset(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    async fn try_acquire_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock().await;

        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::fresh(now));

        if let Some(locked_at) = entry.locked_at {
            if now.saturating_duration_since(locked_at) < self.config.lockout {
                return false;
            }
            *entry = Entry::fresh(now);
        }

        if now.saturating_duration_since(entry.window_start) >= self.config.window {
            *entry = Entry::fresh(now);
        }

        entry.attempts += 1;
        if entry.attempts >= self.config.max_failures {
            entry.locked_at = Some(now);
            warn!(
                "Locked login for {} after {} attempts for {:?}",
                key, entry.attempts, self.config.lockout
            );
        }
        true
    }

    /// Drop entries whose window and lockout have both passed
    pub async fn prune(&self) {
        self.prune_at(Instant::now()).await
    }

    async fn prune_at(&self, now: Instant) {
        let RateLimiterConfig { window, lockout, .. } = self.config;
        self.entries
            .lock()
            .await
            .retain(|_, entry| match entry.locked_at {
                Some(locked_at) => now.saturating_duration_since(locked_at) < lockout,
                None => now.saturating_duration_since(entry.window_start) < window,
            });
    }
}
