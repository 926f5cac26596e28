// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry policy with linear backoff.
//!
//! Attempt N waits N times the base delay before running again, capped at a
//! maximum. Presets cover the two call sites: connection establishment and
//! individual store operations.
//!
//! # Example
//!
//! ```
//! use redis_repository::RetryConfig;
//! use std::time::Duration;
//!
//! let config = RetryConfig::operation();
//! assert_eq!(config.max_attempts, 3);
//! assert_eq!(config.delay_for(2), config.delay_for(1) * 2);
//! ```

use std::time::Duration;

/// Retry behavior for connect and store-operation loops.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first. The final failure propagates.
    pub max_attempts: usize,
    /// Delay before the second attempt; attempt N waits `base_delay * N`.
    pub base_delay: Duration,
    /// Ceiling on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::operation()
    }
}

impl RetryConfig {
    /// Connection establishment: a few patient attempts so a briefly
    /// unavailable store doesn't fail startup.
    #[must_use]
    pub fn connect() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }

    /// Individual store operations: quick retries, then let the caller
    /// decide.
    #[must_use]
    pub fn operation() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }

    /// Delay to wait after the given attempt number (1-based) fails.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let scaled = self.base_delay.saturating_mul(attempt as u32);
        scaled.min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_linearly() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        };

        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(2), Duration::from_millis(200));
        assert_eq!(config.delay_for(3), Duration::from_millis(300));
    }

    #[test]
    fn delay_caps_at_max() {
        let config = RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
        };

        assert_eq!(config.delay_for(2), Duration::from_secs(2));
        assert_eq!(config.delay_for(5), Duration::from_secs(3));
        assert_eq!(config.delay_for(100), Duration::from_secs(3));
    }

    #[test]
    fn presets() {
        let connect = RetryConfig::connect();
        assert_eq!(connect.max_attempts, 5);

        let operation = RetryConfig::operation();
        assert_eq!(operation.max_attempts, 3);
    }
}
