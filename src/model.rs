//! Capability contracts for the three record shapes.
//!
//! A repository is generic over a *create* shape (full required fields, the
//! stored form), an *update* shape (every field optional, applied as a
//! field-level patch), and a *result* shape (create's fields plus the key,
//! returned from every read and write).
//!
//! # Example
//!
//! ```
//! use redis_repository::{Patch, ResultRecord};
//! use serde::{Deserialize, Serialize};
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
//! let mut record = UserCreate { username: "a".into(), age: 1 };
//! UserUpdate { age: Some(2), ..Default::default() }.apply_to(&mut record);
//! assert_eq!(record.age, 2);
//! assert_eq!(record.username, "a");
//! ```

/// Field-level patch applied on top of a stored create-shape record.
///
/// Implementors carry `Option` fields; `None` means "not supplied, leave the
/// current value alone". Only fields explicitly set are written through.
pub trait Patch<C> {
    fn apply_to(&self, target: &mut C);
}

/// Result shape built from a stored create-shape record plus its raw key.
///
/// Construction may reject the supplied fields (for example when the result
/// shape requires a field the create shape cannot provide); the rejection
/// message is surfaced as a result-construction error.
pub trait ResultRecord<C>: Sized {
    fn from_create(data: &C) -> Result<Self, String>;

    /// Inject the namespace-relative key. Called by the engine after every
    /// read or write; the key never includes the repository prefix.
    fn set_key(&mut self, key: &str);
}
