// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error taxonomy for the repository engine and the connection manager.
//!
//! Two public error types exist on purpose:
//! - [`RepositoryError`] covers engine-level failures (bad data, missing
//!   records, store transience, lock conflicts).
//! - [`ConnectionError`] covers connection lifecycle failures (exhausted
//!   connect retries, client requested before connect).
//!
//! Engine methods return `RepositoryError`; a `ConnectionError` raised
//! underneath is carried through transparently so callers can still match
//! on it.

use thiserror::Error;

/// Failures raised by the connection manager.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// A client handle was requested before `connect()` succeeded, or after
    /// the connection was demoted by a failed health probe.
    #[error("redis client not connected; call connect() first")]
    NotConnected,

    /// The connection string could not be parsed. Retrying cannot help.
    #[error("invalid redis connection string: {0}")]
    InvalidDsn(#[source] redis::RedisError),

    /// All connect attempts failed; the last underlying error is attached.
    #[error("redis connection failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: usize,
        #[source]
        source: redis::RedisError,
    },

    /// A dedicated (unshared) connection could not be opened. These are used
    /// for WATCH transactions, which must not share a multiplexed handle.
    #[error("failed to open dedicated redis connection: {0}")]
    Dedicated(#[source] redis::RedisError),
}

/// Failures raised by the repository engine.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A record could not be encoded to its wire form.
    #[error("failed to serialize record: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Stored bytes could not be decoded into the expected shape. Covers
    /// both malformed payloads and shape mismatches.
    #[error("failed to deserialize stored record: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// The result shape rejected the fields supplied by the create shape.
    #[error("failed to build result record: {0}")]
    ResultConstruction(String),

    /// No record exists at the given key or pattern where one was required.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The store was unreachable or timed out. Retrying the whole operation
    /// may succeed.
    #[error("transient redis error during {op}: {source}")]
    Transient {
        op: &'static str,
        #[source]
        source: redis::RedisError,
    },

    /// The optimistic lock was invalidated by a concurrent writer. Retry the
    /// read-modify-write; the connection itself is fine.
    #[error("atomic update conflict for key: {0}")]
    AtomicUpdateConflict(String),

    /// Unclassified store failure, wrapped so the raw client error type does
    /// not leak into the public contract.
    #[error("redis error during {op}: {source}")]
    Backend {
        op: &'static str,
        #[source]
        source: redis::RedisError,
    },

    /// Connection lifecycle failure surfaced through an engine call.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl RepositoryError {
    /// Classify a raw client error: network/timeout failures become
    /// [`RepositoryError::Transient`], everything else is wrapped as
    /// [`RepositoryError::Backend`].
    pub(crate) fn from_redis(source: redis::RedisError, op: &'static str) -> Self {
        if source.is_timeout()
            || source.is_connection_refusal()
            || source.is_connection_dropped()
            || source.is_io_error()
        {
            RepositoryError::Transient { op, source }
        } else {
            RepositoryError::Backend { op, source }
        }
    }

    /// True for failure classes where retrying the whole operation is a
    /// reasonable caller response.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RepositoryError::Transient { .. } | RepositoryError::AtomicUpdateConflict(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_classify_as_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timed out");
        let err = RepositoryError::from_redis(redis::RedisError::from(io), "get");
        assert!(matches!(err, RepositoryError::Transient { op: "get", .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn response_errors_classify_as_backend() {
        let raw = redis::RedisError::from((redis::ErrorKind::ResponseError, "WRONGTYPE"));
        let err = RepositoryError::from_redis(raw, "set");
        assert!(matches!(err, RepositoryError::Backend { op: "set", .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn conflict_is_retryable_but_not_found_is_not() {
        assert!(RepositoryError::AtomicUpdateConflict("user:u1".into()).is_retryable());
        assert!(!RepositoryError::NotFound("user:u1".into()).is_retryable());
    }

    #[test]
    fn connection_error_carries_through_transparently() {
        let err: RepositoryError = ConnectionError::NotConnected.into();
        assert!(matches!(
            err,
            RepositoryError::Connection(ConnectionError::NotConnected)
        ));
    }
}
