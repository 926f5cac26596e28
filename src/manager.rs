// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Connection lifecycle management.
//!
//! [`RedisManager`] owns the multiplexed connection to Redis and guards its
//! lifecycle: retried establishment, health probing, idempotent teardown,
//! and a retry wrapper for transient operation failures. All concurrent
//! callers share the one managed connection; connection establishment is the
//! only serialized critical section.

use std::future::Future;

use redis::aio::{ConnectionManager, ConnectionManagerConfig, MultiplexedConnection};
use redis::Client;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ManagerConfig;
use crate::error::ConnectionError;
use crate::retry::RetryConfig;

/// Observable connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

struct Inner {
    state: ConnectionState,
    client: Option<Client>,
    conn: Option<ConnectionManager>,
}

/// Async Redis manager with a shared multiplexed connection.
///
/// `Connected` implies both the client and the connection handle are
/// present and the last ping succeeded (or has not yet been invalidated by
/// a failed health probe).
pub struct RedisManager {
    config: ManagerConfig,
    connect_retry: RetryConfig,
    operation_retry: RetryConfig,
    inner: Mutex<Inner>,
}

impl RedisManager {
    pub fn new(config: ManagerConfig) -> Self {
        let connect_retry = config.connect_retry();
        Self {
            config,
            connect_retry,
            operation_retry: RetryConfig::operation(),
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                client: None,
                conn: None,
            }),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    /// Establish the connection, retrying with linear backoff.
    ///
    /// A no-op when already connected (checked under the lock, without
    /// re-probing the store). The lock is held for the whole establish
    /// sequence, so concurrent callers cannot race duplicate connections.
    /// After the configured attempts are exhausted the last error surfaces
    /// as [`ConnectionError::Exhausted`] and the state stays Disconnected.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let mut inner = self.inner.lock().await;
        if inner.state == ConnectionState::Connected {
            return Ok(());
        }
        inner.state = ConnectionState::Connecting;

        match self.establish().await {
            Ok((client, conn)) => {
                inner.client = Some(client);
                inner.conn = Some(conn);
                inner.state = ConnectionState::Connected;
                crate::metrics::set_connected(true);
                info!(url = %self.config.url, "connected to redis");
                Ok(())
            }
            Err(err) => {
                inner.state = ConnectionState::Disconnected;
                crate::metrics::set_connected(false);
                Err(err)
            }
        }
    }

    async fn establish(&self) -> Result<(Client, ConnectionManager), ConnectionError> {
        // A bad DSN cannot be fixed by retrying.
        let client =
            Client::open(self.config.url.as_str()).map_err(ConnectionError::InvalidDsn)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let manager_config = ConnectionManagerConfig::new()
                .set_connection_timeout(self.config.connect_timeout())
                .set_response_timeout(self.config.response_timeout())
                .set_number_of_retries(1);

            let result = async {
                let mut conn =
                    ConnectionManager::new_with_config(client.clone(), manager_config).await?;
                redis::cmd("PING").query_async::<String>(&mut conn).await?;
                Ok::<_, redis::RedisError>(conn)
            }
            .await;

            match result {
                Ok(conn) => {
                    if attempt > 1 {
                        info!(attempt, "redis connection established after retries");
                    }
                    return Ok((client, conn));
                }
                Err(err) => {
                    if attempt >= self.connect_retry.max_attempts {
                        return Err(ConnectionError::Exhausted {
                            attempts: attempt,
                            source: err,
                        });
                    }
                    let delay = self.connect_retry.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.connect_retry.max_attempts,
                        error = %err,
                        "redis connection failed; retrying in {:?}",
                        delay
                    );
                    crate::metrics::record_retry("connect");
                    sleep(delay).await;
                }
            }
        }
    }

    /// Connect only if not already connected. Dependents call this as a
    /// pre-flight guard before grabbing a client handle.
    pub async fn ensure_connection(&self) -> Result<(), ConnectionError> {
        if self.state().await == ConnectionState::Connected {
            return Ok(());
        }
        self.connect().await
    }

    /// Lightweight liveness probe. Returns a boolean, never an error.
    ///
    /// A failed probe demotes the state to Disconnected so subsequent
    /// [`client`](Self::client) calls fail fast; the next
    /// `ensure_connection` heals it.
    pub async fn health_check(&self) -> bool {
        let conn = self.inner.lock().await.conn.clone();
        let Some(mut conn) = conn else {
            return false;
        };

        match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "redis health check failed; demoting to disconnected");
                let mut inner = self.inner.lock().await;
                inner.client = None;
                inner.conn = None;
                inner.state = ConnectionState::Disconnected;
                crate::metrics::set_connected(false);
                false
            }
        }
    }

    /// Clone of the shared connection handle.
    pub async fn client(&self) -> Result<ConnectionManager, ConnectionError> {
        self.inner
            .lock()
            .await
            .conn
            .clone()
            .ok_or(ConnectionError::NotConnected)
    }

    /// A fresh connection not shared with any other task.
    ///
    /// WATCH marks are per-connection; optimistic-lock transactions must not
    /// run on the shared multiplexed handle where another task's commands
    /// would interleave.
    pub async fn dedicated_connection(&self) -> Result<MultiplexedConnection, ConnectionError> {
        let client = self
            .inner
            .lock()
            .await
            .client
            .clone()
            .ok_or(ConnectionError::NotConnected)?;

        client
            .get_multiplexed_async_connection_with_timeouts(
                self.config.response_timeout(),
                self.config.connect_timeout(),
            )
            .await
            .map_err(ConnectionError::Dedicated)
    }

    /// Release the connection and reset to Disconnected.
    ///
    /// Idempotent. Dropping the handles closes their sockets; there is no
    /// fallible teardown surface, and the state reset happens regardless.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if inner.conn.take().is_some() {
            debug!("closing redis connection");
        }
        inner.client = None;
        inner.state = ConnectionState::Disconnected;
        crate::metrics::set_connected(false);
    }

    /// Run a store operation, retrying transient failures with backoff.
    ///
    /// Reconnects first when disconnected. A failed attempt triggers a
    /// health probe (demoting a dead connection so the next attempt
    /// re-establishes it) before backing off. The last failure propagates
    /// once attempts are exhausted. Lock conflicts are not retried here;
    /// only whole-operation transience is.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        op_name: &str,
        mut op: F,
    ) -> Result<T, E>
    where
        E: From<ConnectionError> + std::fmt::Display,
        F: FnMut(ConnectionManager) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let conn = match self.ensure_connection().await {
                Ok(()) => match self.client().await {
                    Ok(conn) => conn,
                    Err(err) => {
                        if attempt >= self.operation_retry.max_attempts {
                            return Err(err.into());
                        }
                        warn!(operation = op_name, attempt, error = %err, "client unavailable; backing off");
                        crate::metrics::record_retry("execute");
                        sleep(self.operation_retry.delay_for(attempt)).await;
                        continue;
                    }
                },
                Err(err) => {
                    if attempt >= self.operation_retry.max_attempts {
                        return Err(err.into());
                    }
                    warn!(operation = op_name, attempt, error = %err, "reconnect failed; backing off");
                    crate::metrics::record_retry("execute");
                    sleep(self.operation_retry.delay_for(attempt)).await;
                    continue;
                }
            };

            match op(conn).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation = op_name, attempt, "operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if attempt >= self.operation_retry.max_attempts {
                        return Err(err);
                    }
                    warn!(operation = op_name, attempt, error = %err, "operation failed; retrying");
                    crate::metrics::record_retry("execute");
                    self.health_check().await;
                    sleep(self.operation_retry.delay_for(attempt)).await;
                }
            }
        }
    }
}
