// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cursor-based key scanning.
//!
//! SCAN iterates the keyspace in bounded server round trips instead of a
//! single blocking KEYS call. [`KeyScan`] wraps the cursor loop: each
//! `next_batch` call is one round trip, and the scan is restartable by
//! constructing a fresh instance.

use redis::aio::ConnectionManager;

use crate::error::RepositoryError;

/// One in-progress SCAN over keys matching a pattern.
pub struct KeyScan {
    conn: ConnectionManager,
    pattern: String,
    count: usize,
    cursor: u64,
    done: bool,
}

impl KeyScan {
    /// Start a scan for keys matching `pattern`. `count` is the server-side
    /// batch size hint; it bounds round-trip sizes, not the result.
    pub fn new(conn: ConnectionManager, pattern: String, count: usize) -> Self {
        Self {
            conn,
            pattern,
            count,
            cursor: 0,
            done: false,
        }
    }

    /// Fetch the next non-empty batch of matching keys.
    ///
    /// Returns `Ok(None)` once the cursor is exhausted. SCAN may legally
    /// return empty batches mid-iteration; those are skipped here so callers
    /// only see progress.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<String>>, RepositoryError> {
        while !self.done {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(self.cursor)
                .arg("MATCH")
                .arg(&self.pattern)
                .arg("COUNT")
                .arg(self.count)
                .query_async(&mut self.conn)
                .await
                .map_err(|e| RepositoryError::from_redis(e, "scan"))?;

            self.cursor = next_cursor;
            if next_cursor == 0 {
                self.done = true;
            }
            if !keys.is_empty() {
                return Ok(Some(keys));
            }
        }
        Ok(None)
    }
}
