//! Configuration for the connection manager and repositories.
//!
//! # Example
//!
//! ```
//! use redis_repository::{ManagerConfig, RepositoryConfig};
//!
//! let manager = ManagerConfig::new("redis://localhost:6379");
//! assert_eq!(manager.connect_attempts, 5);
//!
//! let repo = RepositoryConfig {
//!     key_prefix: Some("user:".into()),
//!     default_ttl: Some(3600),
//!     ..Default::default()
//! };
//! assert_eq!(repo.mget_chunk_size, 500);
//! ```

use serde::Deserialize;
use std::time::Duration;

use crate::retry::RetryConfig;

/// Configuration for [`RedisManager`](crate::RedisManager).
///
/// All fields besides `url` have sensible defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    /// Redis connection string (e.g., "redis://localhost:6379")
    pub url: String,

    /// Socket connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-command response timeout in milliseconds
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Connect attempts before `connect()` gives up
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: usize,

    /// Base retry delay; attempt N waits N times this (linear backoff)
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound on any single retry delay
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_connect_timeout_ms() -> u64 { 5_000 }
fn default_response_timeout_ms() -> u64 { 5_000 }
fn default_connect_attempts() -> usize { 5 }
fn default_retry_base_delay_ms() -> u64 { 200 }
fn default_retry_max_delay_ms() -> u64 { 5_000 }

impl ManagerConfig {
    /// Config with defaults for the given connection string.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout_ms: default_connect_timeout_ms(),
            response_timeout_ms: default_response_timeout_ms(),
            connect_attempts: default_connect_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }

    /// Retry policy for connection establishment, derived from this config.
    pub(crate) fn connect_retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.connect_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub(crate) fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// Configuration for a [`Repository`](crate::Repository) instance.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    /// Namespace prefix prepended to every raw key. Defaults to the
    /// lower-cased name of the create shape's type plus ":".
    #[serde(default)]
    pub key_prefix: Option<String>,

    /// TTL in seconds applied to writes that don't supply their own.
    /// `None` means records never expire unless a per-call TTL is given.
    #[serde(default)]
    pub default_ttl: Option<u64>,

    /// How many keys a single MGET fetches during list operations
    #[serde(default = "default_mget_chunk_size")]
    pub mget_chunk_size: usize,

    /// COUNT hint passed to SCAN (server-side batch sizing)
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,
}

fn default_mget_chunk_size() -> usize { 500 }
fn default_scan_count() -> usize { 1_000 }

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            key_prefix: None,
            default_ttl: None,
            mget_chunk_size: default_mget_chunk_size(),
            scan_count: default_scan_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_config_defaults() {
        let config = ManagerConfig::new("redis://localhost:6379");
        assert_eq!(config.url, "redis://localhost:6379");
        assert_eq!(config.connect_attempts, 5);
        assert_eq!(config.connect_timeout_ms, 5_000);
        assert_eq!(config.response_timeout_ms, 5_000);
    }

    #[test]
    fn manager_config_deserializes_with_defaults() {
        let config: ManagerConfig =
            serde_json::from_str(r#"{"url": "redis://cache:6379", "connect_attempts": 2}"#)
                .unwrap();
        assert_eq!(config.url, "redis://cache:6379");
        assert_eq!(config.connect_attempts, 2);
        assert_eq!(config.retry_base_delay_ms, 200);
    }

    #[test]
    fn repository_config_defaults() {
        let config = RepositoryConfig::default();
        assert!(config.key_prefix.is_none());
        assert!(config.default_ttl.is_none());
        assert_eq!(config.mget_chunk_size, 500);
        assert_eq!(config.scan_count, 1_000);
    }

    #[test]
    fn connect_retry_uses_configured_delays() {
        let mut config = ManagerConfig::new("redis://localhost");
        config.retry_base_delay_ms = 100;
        config.retry_max_delay_ms = 250;
        let retry = config.connect_retry();
        assert_eq!(retry.delay_for(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for(2), Duration::from_millis(200));
        // Capped
        assert_eq!(retry.delay_for(3), Duration::from_millis(250));
    }
}
