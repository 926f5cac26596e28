//! # Redis Repository
//!
//! A typed, async repository layer over Redis with namespaced keys,
//! optimistic-lock updates, and configurable error suppression.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Repository<C, U, R>                     │
//! │  • Typed CRUD: create / get / update / delete / exists      │
//! │  • Bulk: list / count / clear over SCAN cursors             │
//! │  • TTL: set_ttl / get_ttl with named expiry states          │
//! │  • Per-call ErrorPolicy: Suppress (neutral value) or Raise  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                   (prefix + raw key, JSON payloads)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        RedisManager                         │
//! │  • One shared multiplexed connection for all callers        │
//! │  • Retried connect with linear backoff, PING verification   │
//! │  • Health probing, idempotent close, operation retries      │
//! │  • Dedicated connections for WATCH transactions             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use redis_repository::{
//!     ErrorPolicy, ManagerConfig, Patch, RedisManager, Repository, ResultRecord,
//! };
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct UserCreate {
//!     username: String,
//!     age: u32,
//! }
//!
//! #[derive(Debug, Default)]
//! struct UserUpdate {
//!     username: Option<String>,
//!     age: Option<u32>,
//! }
//!
//! impl Patch<UserCreate> for UserUpdate {
//!     fn apply_to(&self, target: &mut UserCreate) {
//!         if let Some(username) = &self.username {
//!             target.username = username.clone();
//!         }
//!         if let Some(age) = self.age {
//!             target.age = age;
//!         }
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct UserResult {
//!     key: String,
//!     username: String,
//!     age: u32,
//! }
//!
//! impl ResultRecord<UserCreate> for UserResult {
//!     fn from_create(data: &UserCreate) -> Result<Self, String> {
//!         Ok(Self {
//!             key: String::new(),
//!             username: data.username.clone(),
//!             age: data.age,
//!         })
//!     }
//!
//!     fn set_key(&mut self, key: &str) {
//!         self.key = key.to_string();
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = Arc::new(RedisManager::new(ManagerConfig::new(
//!         "redis://localhost:6379",
//!     )));
//!     manager.connect().await?;
//!
//!     // Keys land under "usercreate:" by default.
//!     let users: Repository<UserCreate, UserUpdate, UserResult> =
//!         Repository::new(manager.clone());
//!
//!     let data = UserCreate { username: "ada".into(), age: 36 };
//!     users.create("u1", &data, Some(3600), ErrorPolicy::Raise).await?;
//!
//!     let patch = UserUpdate { age: Some(37), ..Default::default() };
//!     users.update("u1", &patch, None, ErrorPolicy::Raise).await?;
//!
//!     if let Some(user) = users.get("u1", ErrorPolicy::Suppress).await? {
//!         println!("{} is {}", user.username, user.age);
//!     }
//!
//!     manager.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Typed shapes**: create / update / result types per repository, with
//!   field-level patch semantics on update
//! - **Atomic updates**: WATCH-based optimistic locking; concurrent-writer
//!   conflicts surface as a distinct retryable error
//! - **Namespace isolation**: every key under a fixed prefix, derived from
//!   the create shape or set explicitly
//! - **Error policy**: suppress failures into neutral values with a warning,
//!   or raise the typed error, per call
//! - **Bounded bulk ops**: SCAN cursors, chunked MGET, batched UNLINK with a
//!   delete budget and dry-run mode
//! - **Connection resilience**: linear-backoff connect retries, health
//!   probing with fail-fast demotion, operation retry wrapper
//!
//! ## Modules
//!
//! - [`repository`]: the typed [`Repository`] engine
//! - [`manager`]: [`RedisManager`] connection lifecycle
//! - [`model`]: the [`Patch`] and [`ResultRecord`] shape contracts
//! - [`config`]: manager and repository configuration
//! - [`error`]: the [`RepositoryError`] / [`ConnectionError`] taxonomy
//! - [`scan`]: cursor-based key scanning
//! - [`chunk`]: slicing and re-batching helpers for bulk operations

pub mod chunk;
pub mod codec;
pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod model;
pub mod repository;
pub mod retry;
pub mod scan;

pub use config::{ManagerConfig, RepositoryConfig};
pub use error::{ConnectionError, RepositoryError};
pub use manager::{ConnectionState, RedisManager};
pub use model::{Patch, ResultRecord};
pub use repository::{ClearOptions, ErrorPolicy, Repository, TtlStatus};
pub use retry::RetryConfig;
pub use scan::KeyScan;
