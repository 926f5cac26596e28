// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The repository engine: typed CRUD over a namespaced slice of the
//! keyspace.
//!
//! A [`Repository`] is generic over three shapes: the create shape (full
//! required fields, the stored form), the update shape (a field-level
//! patch), and the result shape (create's fields plus the raw key). All
//! keys live under one fixed prefix; callers supply raw keys only.
//!
//! The engine holds no mutable state beyond its configuration, so one
//! instance can serve any number of concurrent callers. Cross-key write
//! conflicts are delegated to the store's optimistic lock: `update` runs a
//! WATCH transaction and surfaces a conflict as a distinct retryable error
//! instead of retrying internally.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::chunk::{take_up_to, Rebatcher};
use crate::codec;
use crate::config::RepositoryConfig;
use crate::error::RepositoryError;
use crate::manager::RedisManager;
use crate::model::{Patch, ResultRecord};
use crate::scan::KeyScan;

/// Per-call error policy.
///
/// `Suppress` converts an operation's failure classes into its neutral
/// value (`None`, `false`, `0`, a partial list) and logs them; `Raise`
/// propagates the typed error. Connection lifecycle errors propagate under
/// both policies since no neutral value is meaningful without a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    #[default]
    Suppress,
    Raise,
}

/// Expiry state of an existing key. Missing keys surface as Not-Found
/// instead; the store's -1/-2 sentinels never escape as raw integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlStatus {
    /// Key exists without expiration.
    NoExpiry,
    /// Key expires after the given duration.
    ExpiresIn(Duration),
}

/// Options for [`Repository::clear`].
#[derive(Debug, Clone)]
pub struct ClearOptions {
    /// Count matching keys without deleting them.
    pub dry_run: bool,
    /// Running cap on the total processed; `Some(0)` deletes nothing.
    pub max_delete: Option<u64>,
    /// Keys unlinked per round trip.
    pub batch_size: usize,
}

impl Default for ClearOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_delete: None,
            batch_size: 500,
        }
    }
}

/// Typed repository over a prefixed keyspace namespace.
pub struct Repository<C, U, R> {
    manager: Arc<RedisManager>,
    prefix: String,
    default_ttl: Option<u64>,
    mget_chunk_size: usize,
    scan_count: usize,
    _shapes: PhantomData<fn() -> (C, U, R)>,
}

/// Default namespace prefix: the lower-cased terminal segment of the create
/// shape's type name, plus ":".
fn type_prefix<C>() -> String {
    let full = std::any::type_name::<C>();
    let base = full.split('<').next().unwrap_or(full);
    let name = base.rsplit("::").next().unwrap_or(base);
    format!("{}:", name.to_ascii_lowercase())
}

impl<C, U, R> Repository<C, U, R>
where
    C: Serialize + DeserializeOwned,
    U: Patch<C>,
    R: ResultRecord<C>,
{
    /// Repository with a derived prefix and no default TTL.
    pub fn new(manager: Arc<RedisManager>) -> Self {
        Self::with_config(manager, RepositoryConfig::default())
    }

    pub fn with_config(manager: Arc<RedisManager>, config: RepositoryConfig) -> Self {
        Self {
            manager,
            prefix: config.key_prefix.unwrap_or_else(type_prefix::<C>),
            default_ttl: config.default_ttl,
            mget_chunk_size: config.mget_chunk_size,
            scan_count: config.scan_count,
            _shapes: PhantomData,
        }
    }

    /// The namespace prefix applied to every raw key.
    pub fn key_prefix(&self) -> &str {
        &self.prefix
    }

    /// TTL in seconds applied when a call supplies none.
    pub fn default_ttl(&self) -> Option<u64> {
        self.default_ttl
    }

    #[inline]
    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    #[inline]
    fn full_pattern(&self, pattern: &str) -> String {
        format!("{}{}", self.prefix, pattern)
    }

    fn build_result(&self, data: &C, key: &str) -> Result<R, RepositoryError> {
        let mut record = R::from_create(data).map_err(|reason| {
            error!(key, reason = %reason, "failed to build result record");
            RepositoryError::ResultConstruction(reason)
        })?;
        record.set_key(key);
        Ok(record)
    }

    fn settle<T>(
        &self,
        policy: ErrorPolicy,
        op: &'static str,
        context: &str,
        err: RepositoryError,
        neutral: T,
    ) -> Result<T, RepositoryError> {
        match policy {
            ErrorPolicy::Suppress => {
                warn!(operation = op, context = %context, error = %err, "suppressing repository error");
                crate::metrics::record_operation(op, "suppressed");
                Ok(neutral)
            }
            ErrorPolicy::Raise => {
                crate::metrics::record_operation(op, "error");
                Err(err)
            }
        }
    }

    /// Store a new record under `key` with the resolved TTL (per-call, else
    /// the repository default, else no expiry).
    ///
    /// The result record is built and the payload serialized before the
    /// write, so construction and serialization failures never touch the
    /// store. Returns the freshly built result record.
    #[tracing::instrument(skip(self, data), fields(prefix = %self.prefix))]
    pub async fn create(
        &self,
        key: &str,
        data: &C,
        ttl: Option<u64>,
        policy: ErrorPolicy,
    ) -> Result<Option<R>, RepositoryError> {
        let full_key = self.full_key(key);

        let staged = self.build_result(data, key).and_then(|record| {
            let payload = codec::encode(data)?;
            Ok((record, payload))
        });
        let (record, payload) = match staged {
            Ok(staged) => staged,
            Err(err) => return self.settle(policy, "create", key, err, None),
        };

        let mut conn = self.manager.client().await?;
        let write = match ttl.or(self.default_ttl) {
            Some(seconds) => conn.set_ex::<_, _, ()>(&full_key, &payload, seconds).await,
            None => conn.set::<_, _, ()>(&full_key, &payload).await,
        };
        if let Err(err) = write {
            let err = RepositoryError::from_redis(err, "create");
            return self.settle(policy, "create", key, err, None);
        }

        debug!(key = %full_key, "created record");
        crate::metrics::record_operation("create", "success");
        Ok(Some(record))
    }

    /// Fetch the record at `key`. Absence is Not-Found.
    pub async fn get(
        &self,
        key: &str,
        policy: ErrorPolicy,
    ) -> Result<Option<R>, RepositoryError> {
        let mut conn = self.manager.client().await?;
        let full_key = self.full_key(key);

        let data: Option<String> = match conn.get(&full_key).await {
            Ok(data) => data,
            Err(err) => {
                let err = RepositoryError::from_redis(err, "get");
                return self.settle(policy, "get", key, err, None);
            }
        };
        let Some(data) = data else {
            return self.settle(policy, "get", key, RepositoryError::NotFound(full_key), None);
        };

        match codec::decode::<C>(&data).and_then(|stored| self.build_result(&stored, key)) {
            Ok(record) => {
                crate::metrics::record_operation("get", "success");
                Ok(Some(record))
            }
            Err(err) => self.settle(policy, "get", key, err, None),
        }
    }

    /// Atomically patch the record at `key` with the fields set in `patch`.
    ///
    /// Runs the read-modify-write under the store's optimistic lock: WATCH,
    /// read, merge, then a conditional transaction. When a concurrent
    /// writer invalidates the watch, the commit is rejected and the call
    /// fails with [`RepositoryError::AtomicUpdateConflict`] — retryable,
    /// but the retry is the caller's decision.
    #[tracing::instrument(skip(self, patch), fields(prefix = %self.prefix))]
    pub async fn update(
        &self,
        key: &str,
        patch: &U,
        ttl: Option<u64>,
        policy: ErrorPolicy,
    ) -> Result<Option<R>, RepositoryError> {
        let full_key = self.full_key(key);
        // The watch mark must be private to this call, so the transaction
        // runs on a dedicated connection. Dropping it discards the mark on
        // every exit path.
        let mut conn = self.manager.dedicated_connection().await?;

        match self.update_txn(&mut conn, key, &full_key, patch, ttl).await {
            Ok(record) => {
                debug!(key = %full_key, "updated record");
                crate::metrics::record_operation("update", "success");
                Ok(Some(record))
            }
            Err(err) => self.settle(policy, "update", key, err, None),
        }
    }

    async fn update_txn(
        &self,
        conn: &mut MultiplexedConnection,
        key: &str,
        full_key: &str,
        patch: &U,
        ttl: Option<u64>,
    ) -> Result<R, RepositoryError> {
        redis::cmd("WATCH")
            .arg(full_key)
            .query_async::<()>(conn)
            .await
            .map_err(|e| RepositoryError::from_redis(e, "update"))?;

        let current: Option<String> = conn
            .get(full_key)
            .await
            .map_err(|e| RepositoryError::from_redis(e, "update"))?;
        let Some(current) = current else {
            return Err(RepositoryError::NotFound(full_key.to_string()));
        };

        let mut record: C = codec::decode(&current)?;
        patch.apply_to(&mut record);
        let payload = codec::encode(&record)?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        match ttl.or(self.default_ttl) {
            Some(seconds) => {
                pipe.cmd("SET").arg(full_key).arg(&payload).arg("EX").arg(seconds);
            }
            None => {
                pipe.set(full_key, &payload);
            }
        }

        // EXEC replies nil when the watched key changed underneath us.
        let reply: Option<redis::Value> = pipe
            .query_async(conn)
            .await
            .map_err(|e| RepositoryError::from_redis(e, "update"))?;
        if reply.is_none() {
            return Err(RepositoryError::AtomicUpdateConflict(full_key.to_string()));
        }

        self.build_result(&record, key)
    }

    /// Remove the record at `key`. Unlinks rather than deletes so large
    /// values are reclaimed off the command path.
    pub async fn delete(&self, key: &str, policy: ErrorPolicy) -> Result<bool, RepositoryError> {
        let mut conn = self.manager.client().await?;
        let full_key = self.full_key(key);

        let removed: u64 = match conn.unlink(&full_key).await {
            Ok(removed) => removed,
            Err(err) => {
                let err = RepositoryError::from_redis(err, "delete");
                return self.settle(policy, "delete", key, err, false);
            }
        };
        if removed > 0 {
            debug!(key = %full_key, "deleted record");
            crate::metrics::record_operation("delete", "success");
            Ok(true)
        } else {
            self.settle(policy, "delete", key, RepositoryError::NotFound(full_key), false)
        }
    }

    /// Pure existence probe. Transient store errors always propagate; there
    /// is no sensible neutral value to fall back to.
    pub async fn exists(&self, key: &str) -> Result<bool, RepositoryError> {
        let mut conn = self.manager.client().await?;
        conn.exists(self.full_key(key))
            .await
            .map_err(|e| RepositoryError::from_redis(e, "exists"))
    }

    /// Produce up to `limit` result records whose raw keys match `pattern`
    /// under the repository prefix (`"*"` for all; `None` for unbounded).
    ///
    /// Keys come from a cursor scan and are fetched in fixed-size MGET
    /// chunks, so memory and round-trip sizes stay bounded regardless of
    /// how many keys match. Values deleted between scan and fetch are
    /// silently omitted; undecodable values are skipped with a warning
    /// under `Suppress` and abort the listing under `Raise`.
    #[tracing::instrument(skip(self), fields(prefix = %self.prefix))]
    pub async fn list(
        &self,
        pattern: &str,
        limit: Option<usize>,
        policy: ErrorPolicy,
    ) -> Result<Vec<R>, RepositoryError> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let conn = self.manager.client().await?;
        let mut scan = KeyScan::new(conn.clone(), self.full_pattern(pattern), self.scan_count);
        let mut fetch_conn = conn;
        let mut batcher = Rebatcher::new(self.mget_chunk_size);
        let mut results: Vec<R> = Vec::new();

        loop {
            let keys = match scan.next_batch().await {
                Ok(Some(keys)) => keys,
                Ok(None) => break,
                Err(err) => return self.settle(policy, "list", pattern, err, results),
            };
            for chunk in batcher.push(keys) {
                match self
                    .fetch_chunk(&mut fetch_conn, &chunk, &mut results, limit, policy)
                    .await
                {
                    Ok(true) => {
                        crate::metrics::record_latency("list", started.elapsed());
                        crate::metrics::record_operation("list", "success");
                        return Ok(results);
                    }
                    Ok(false) => {}
                    Err(err) => return self.settle(policy, "list", pattern, err, results),
                }
            }
        }
        if let Some(chunk) = batcher.flush() {
            if let Err(err) = self
                .fetch_chunk(&mut fetch_conn, &chunk, &mut results, limit, policy)
                .await
            {
                return self.settle(policy, "list", pattern, err, results);
            }
        }

        crate::metrics::record_latency("list", started.elapsed());
        crate::metrics::record_operation("list", "success");
        Ok(take_up_to(results, limit))
    }

    /// Fetch one chunk of keys. Returns `Ok(true)` once `limit` records
    /// have been collected.
    async fn fetch_chunk(
        &self,
        conn: &mut ConnectionManager,
        keys: &[String],
        results: &mut Vec<R>,
        limit: Option<usize>,
        policy: ErrorPolicy,
    ) -> Result<bool, RepositoryError> {
        let values: Vec<Option<String>> = conn
            .mget(keys)
            .await
            .map_err(|e| RepositoryError::from_redis(e, "list"))?;

        for (full_key, value) in keys.iter().zip(values) {
            // Deleted between scan and fetch: an expected race, not an error.
            let Some(value) = value else { continue };
            let raw_key = full_key.strip_prefix(&self.prefix).unwrap_or(full_key);

            match codec::decode::<C>(&value).and_then(|stored| self.build_result(&stored, raw_key)) {
                Ok(record) => {
                    results.push(record);
                    if let Some(n) = limit {
                        if results.len() >= n {
                            return Ok(true);
                        }
                    }
                }
                Err(err) => {
                    if policy == ErrorPolicy::Raise {
                        return Err(err);
                    }
                    warn!(key = %full_key, error = %err, "skipping undecodable record");
                }
            }
        }
        Ok(false)
    }

    /// Count keys matching `pattern` via the cursor scan, without fetching
    /// values. Constant local memory; round trips bounded by the scan
    /// batch size.
    pub async fn count(&self, pattern: &str) -> Result<u64, RepositoryError> {
        let conn = self.manager.client().await?;
        let mut scan = KeyScan::new(conn, self.full_pattern(pattern), self.scan_count);
        let mut total = 0u64;
        while let Some(keys) = scan.next_batch().await? {
            total += keys.len() as u64;
        }
        Ok(total)
    }

    /// Set the expiry of an existing key to `ttl` seconds.
    pub async fn set_ttl(
        &self,
        key: &str,
        ttl: u64,
        policy: ErrorPolicy,
    ) -> Result<bool, RepositoryError> {
        let mut conn = self.manager.client().await?;
        let full_key = self.full_key(key);

        let applied: bool = match conn.expire(&full_key, ttl as i64).await {
            Ok(applied) => applied,
            Err(err) => {
                let err = RepositoryError::from_redis(err, "set_ttl");
                return self.settle(policy, "set_ttl", key, err, false);
            }
        };
        if applied {
            crate::metrics::record_operation("set_ttl", "success");
            Ok(true)
        } else {
            self.settle(policy, "set_ttl", key, RepositoryError::NotFound(full_key), false)
        }
    }

    /// Remaining expiry of the key: `NoExpiry` for a persistent key,
    /// Not-Found when the key is absent.
    pub async fn get_ttl(
        &self,
        key: &str,
        policy: ErrorPolicy,
    ) -> Result<Option<TtlStatus>, RepositoryError> {
        let mut conn = self.manager.client().await?;
        let full_key = self.full_key(key);

        let raw: i64 = match conn.ttl(&full_key).await {
            Ok(raw) => raw,
            Err(err) => {
                let err = RepositoryError::from_redis(err, "get_ttl");
                return self.settle(policy, "get_ttl", key, err, None);
            }
        };
        match parse_ttl_reply(raw, &full_key) {
            Ok(status) => Ok(Some(status)),
            Err(err) => self.settle(policy, "get_ttl", key, err, None),
        }
    }

    /// Delete (or, with `dry_run`, count) every key matching `pattern` in
    /// fixed-size batches. Returns the total processed.
    ///
    /// `max_delete` caps the running total: the batch that would exceed it
    /// is truncated to exactly fill the remaining budget, and an
    /// empty-after-truncation batch ends the loop. Zero processed with
    /// `Raise` is Not-Found.
    #[tracing::instrument(skip(self), fields(prefix = %self.prefix))]
    pub async fn clear(
        &self,
        pattern: &str,
        options: ClearOptions,
        policy: ErrorPolicy,
    ) -> Result<u64, RepositoryError> {
        let started = Instant::now();
        let conn = self.manager.client().await?;
        let full_pattern = self.full_pattern(pattern);
        let mut scan = KeyScan::new(conn.clone(), full_pattern.clone(), self.scan_count);
        let mut delete_conn = conn;
        let mut batcher = Rebatcher::new(options.batch_size);
        let mut total = 0u64;
        let mut capped = false;

        'scan: loop {
            let keys = match scan.next_batch().await {
                Ok(Some(keys)) => keys,
                Ok(None) => break 'scan,
                Err(err) => return self.settle(policy, "clear", pattern, err, total),
            };
            for batch in batcher.push(keys) {
                match self
                    .clear_batch(&mut delete_conn, batch, &options, &mut total)
                    .await
                {
                    Ok(true) => {
                        capped = true;
                        break 'scan;
                    }
                    Ok(false) => {}
                    Err(err) => return self.settle(policy, "clear", pattern, err, total),
                }
            }
        }
        if !capped {
            if let Some(batch) = batcher.flush() {
                if let Err(err) = self
                    .clear_batch(&mut delete_conn, batch, &options, &mut total)
                    .await
                {
                    return self.settle(policy, "clear", pattern, err, total);
                }
            }
        }

        if total > 0 {
            info!(total, pattern = %full_pattern, dry_run = options.dry_run, "cleared records");
        }
        crate::metrics::record_latency("clear", started.elapsed());
        if total == 0 && policy == ErrorPolicy::Raise {
            crate::metrics::record_operation("clear", "not_found");
            return Err(RepositoryError::NotFound(full_pattern));
        }
        crate::metrics::record_operation("clear", "success");
        Ok(total)
    }

    /// Process one batch. Returns `Ok(true)` when the `max_delete` budget
    /// is exhausted.
    async fn clear_batch(
        &self,
        conn: &mut ConnectionManager,
        mut batch: Vec<String>,
        options: &ClearOptions,
        total: &mut u64,
    ) -> Result<bool, RepositoryError> {
        if let Some(cap) = options.max_delete {
            let remaining = cap.saturating_sub(*total);
            batch.truncate(remaining as usize);
            if batch.is_empty() {
                return Ok(true);
            }
        }
        if options.dry_run {
            *total += batch.len() as u64;
            return Ok(false);
        }
        let deleted: u64 = conn
            .unlink(&batch)
            .await
            .map_err(|e| RepositoryError::from_redis(e, "clear"))?;
        *total += deleted;
        Ok(false)
    }
}

fn parse_ttl_reply(raw: i64, full_key: &str) -> Result<TtlStatus, RepositoryError> {
    match raw {
        -2 => Err(RepositoryError::NotFound(full_key.to_string())),
        -1 => Ok(TtlStatus::NoExpiry),
        seconds => Ok(TtlStatus::ExpiresIn(Duration::from_secs(seconds.max(0) as u64))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct TaskCreate {
        title: String,
        done: bool,
    }

    #[derive(Debug, Default)]
    struct TaskUpdate {
        title: Option<String>,
        done: Option<bool>,
    }

    impl Patch<TaskCreate> for TaskUpdate {
        fn apply_to(&self, target: &mut TaskCreate) {
            if let Some(title) = &self.title {
                target.title = title.clone();
            }
            if let Some(done) = self.done {
                target.done = done;
            }
        }
    }

    #[derive(Debug)]
    struct TaskResult {
        key: String,
        title: String,
        done: bool,
    }

    impl ResultRecord<TaskCreate> for TaskResult {
        fn from_create(data: &TaskCreate) -> Result<Self, String> {
            Ok(Self {
                key: String::new(),
                title: data.title.clone(),
                done: data.done,
            })
        }

        fn set_key(&mut self, key: &str) {
            self.key = key.to_string();
        }
    }

    fn offline_repo() -> Repository<TaskCreate, TaskUpdate, TaskResult> {
        let manager = Arc::new(RedisManager::new(ManagerConfig::new("redis://localhost:6379")));
        Repository::new(manager)
    }

    #[test]
    fn prefix_derives_from_create_shape() {
        let repo = offline_repo();
        assert_eq!(repo.key_prefix(), "taskcreate:");
    }

    #[test]
    fn prefix_override_wins() {
        let manager = Arc::new(RedisManager::new(ManagerConfig::new("redis://localhost:6379")));
        let repo: Repository<TaskCreate, TaskUpdate, TaskResult> = Repository::with_config(
            manager,
            RepositoryConfig {
                key_prefix: Some("task:".into()),
                ..Default::default()
            },
        );
        assert_eq!(repo.key_prefix(), "task:");
        assert_eq!(repo.full_key("t1"), "task:t1");
        assert_eq!(repo.full_pattern("*"), "task:*");
    }

    #[test]
    fn result_record_gets_raw_key() {
        let repo = offline_repo();
        let record = repo
            .build_result(
                &TaskCreate {
                    title: "write docs".into(),
                    done: false,
                },
                "t1",
            )
            .unwrap();
        assert_eq!(record.key, "t1");
        assert_eq!(record.title, "write docs");
    }

    #[test]
    fn patch_touches_only_set_fields() {
        let mut record = TaskCreate {
            title: "write docs".into(),
            done: false,
        };
        TaskUpdate {
            done: Some(true),
            ..Default::default()
        }
        .apply_to(&mut record);
        assert_eq!(record.title, "write docs");
        assert!(record.done);
    }

    #[test]
    fn ttl_sentinels_map_to_named_states() {
        assert!(matches!(
            parse_ttl_reply(-2, "task:t1"),
            Err(RepositoryError::NotFound(_))
        ));
        assert_eq!(parse_ttl_reply(-1, "task:t1").unwrap(), TtlStatus::NoExpiry);
        assert_eq!(
            parse_ttl_reply(42, "task:t1").unwrap(),
            TtlStatus::ExpiresIn(Duration::from_secs(42))
        );
    }

    #[test]
    fn clear_options_default() {
        let options = ClearOptions::default();
        assert!(!options.dry_run);
        assert!(options.max_delete.is_none());
        assert_eq!(options.batch_size, 500);
    }

    #[test]
    fn error_policy_defaults_to_suppress() {
        assert_eq!(ErrorPolicy::default(), ErrorPolicy::Suppress);
    }

    #[tokio::test]
    async fn operations_fail_fast_when_disconnected() {
        let repo = offline_repo();
        let err = repo.exists("t1").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Connection(_)));

        // Connection errors propagate even under Suppress.
        let err = repo.get("t1", ErrorPolicy::Suppress).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Connection(_)));
    }
}
