//! # docstore-session
//!
//! Session store for web-session middleware, backed by a document database.
//!
//! Every session is one document in a single collection, keyed by session ID.
//! The store maps the usual session-store operations onto document reads,
//! writes and deletes:
//!
//! - **get**: read the session document, `SessionError::NotFound` if it is missing
//! - **set**: write the session data, merging into or overwriting the document
//! - **destroy**: delete the session document
//! - **clear** / **all**: wipe or read the whole collection
//!
//! ## Features
//!
//! - **Pluggable databases**: Redis, MongoDB, in-memory, or any [`DocumentDatabase`]
//! - **Configurable collection and merge behavior** via [`StoreOptions`]
//! - **No TTL handling**: configure expiration in the database if needed
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docstore_session::{DocumentStore, MemoryDatabase, SessionData, SessionStore, StoreOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), docstore_session::SessionError> {
//!     let store = DocumentStore::with_options(
//!         MemoryDatabase::new(),
//!         StoreOptions::new().with_collection("sessions").with_merge(true),
//!     );
//!
//!     let mut data = SessionData::new();
//!     data.set("views", 1)?;
//!     store.set("session-id", &data).await?;
//!
//!     let loaded = store.get("session-id").await?;
//!     assert_eq!(loaded.get::<i32>("views"), Some(1));
//!
//!     store.destroy("session-id").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod session;
pub mod store;

pub use config::{StoreOptions, DEFAULT_COLLECTION};
pub use database::{DocumentDatabase, MemoryDatabase};
pub use error::{DatabaseError, SessionError};
pub use session::SessionData;
pub use store::{DocumentStore, SessionStore};

#[cfg(feature = "redis-backend")]
pub use database::RedisDatabase;

#[cfg(feature = "mongodb-backend")]
pub use database::MongoDatabase;
