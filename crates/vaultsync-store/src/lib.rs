//! # Vaultsync Store
//!
//! Path-addressed document storage for vaultsync. Provides a trait-based
//! interface with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The sync layer keeps everything it persists (vault documents, the push and
//! pull logs, cursors, remote configuration) in a [`DocumentStore`]. Paths are
//! `/`-delimited and listed in byte order, so the logs use zero-padded index
//! components to get numeric ordering from the store.
//!
//! ## Key Types
//!
//! - [`DocumentStore`] - The async trait for all storage operations
//! - [`StoreExt`] - Typed accessors (counters, flags, strings) at fixed paths
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vaultsync_store::{DocumentStore, SqliteStore, StoreExt};
//!
//! async fn example() {
//!     let store = SqliteStore::open("vault.db").unwrap();
//!
//!     store.set("/notes/today", b"hello").await.unwrap();
//!     store.set_i64("/sync/push", 1).await.unwrap();
//! }
//! ```

pub mod error;
pub mod memory;
pub mod migration;
pub mod path;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Document, DocumentStore, DocumentsOpts, StoreExt};
