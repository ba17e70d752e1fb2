//! Per-operation fixed-window call limiter.
//!
//! Time is divided into non-overlapping windows of `window` length. Each
//! operation gets `max_calls` per window; counts reset fully at the boundary.
//! Entries for windows that have passed are pruned on every call, so there
//! is no background timer.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;

use crate::error::{Result, SnipError};

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Default calls allowed per operation per window.
pub const DEFAULT_MAX_CALLS: u32 = 100;

/// Limiter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_calls: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_calls: DEFAULT_MAX_CALLS,
        }
    }
}

/// Calls observed for one operation in one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub operation: String,
    pub count: u32,
    pub window_start: DateTime<Utc>,
    pub reset_time: DateTime<Utc>,
}

/// In-memory fixed-window counters owned by one store.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Record one call to `operation` at `now`.
    ///
    /// Returns `RateLimitExceeded` when the window's budget is spent; the
    /// rejected call is not counted.
    pub fn check(&self, operation: &str, now: DateTime<Utc>) -> Result<()> {
        let window_ms = self.window_millis();
        let now_ms = now.timestamp_millis().max(0);
        let index = now_ms / window_ms;
        let window_start = millis_to_datetime(index * window_ms);
        let reset_time = millis_to_datetime((index + 1) * window_ms);

        let mut entries = self
            .entries
            .lock()
            .map_err(|_| SnipError::Storage("Rate limiter state poisoned".to_string()))?;

        entries.retain(|_, entry| entry.reset_time > now);

        let key = format!("{}:{}", operation, index);
        let entry = entries.entry(key).or_insert_with(|| RateLimitEntry {
            operation: operation.to_string(),
            count: 0,
            window_start,
            reset_time,
        });

        if entry.count >= self.config.max_calls {
            let retry_after = (entry.reset_time - now).to_std().unwrap_or_default();
            warn!(
                operation,
                limit = self.config.max_calls,
                "rate limit exceeded"
            );
            return Err(SnipError::RateLimitExceeded {
                operation: operation.to_string(),
                retry_after,
            });
        }

        entry.count += 1;
        Ok(())
    }

    /// Calls recorded for `operation` in the window containing `now`.
    pub fn current_count(&self, operation: &str, now: DateTime<Utc>) -> u32 {
        let index = now.timestamp_millis().max(0) / self.window_millis();
        let key = format!("{}:{}", operation, index);
        self.entries
            .lock()
            .map(|entries| entries.get(&key).map(|e| e.count).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of live window entries.
    pub fn tracked_entries(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    fn window_millis(&self) -> i64 {
        i64::try_from(self.config.window.as_millis())
            .unwrap_or(i64::MAX)
            .max(1)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
