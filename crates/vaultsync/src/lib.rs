//! # Vaultsync
//!
//! Encrypted document vaults that sync across devices through an untrusted
//! remote.
//!
//! ## Overview
//!
//! - **Documents** live at `/`-delimited paths in a local [`DocumentStore`](store::DocumentStore)
//! - **Records** of every write are sealed under the vault master key and
//!   queued in the push log
//! - **Sync** pushes the queue to the remote and pulls what other devices sent
//! - **Requests** to the remote are signed with a key derived from the master
//!   key, and checked against replay on the remote side
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vaultsync::{Vault, VaultConfig};
//! use vaultsync::core::SecretKey;
//! use vaultsync::store::SqliteStore;
//! use vaultsync::sync::{MemoryTransport, VaultService};
//!
//! async fn example() -> vaultsync::Result<()> {
//!     let store = SqliteStore::open("vault.db")?;
//!     let transport = MemoryTransport::new(Arc::new(VaultService::new()));
//!     let vault = Vault::new(store, transport, VaultConfig::default());
//!
//!     vault.unlock(SecretKey::generate()).await?;
//!     vault.setup_remote(None).await?;
//!
//!     vault.set("/notes/1", b"hello").await?;
//!     vault.sync().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `vaultsync::core` - Keys, identities and the signing codec
//! - `vaultsync::store` - Document store trait, SQLite and memory backends
//! - `vaultsync::auth` - Request signing and verification, replay guard
//! - `vaultsync::sync` - Vault log, remote protocol and sync engine

pub mod config;
pub mod error;
pub mod vault;

pub use vaultsync_auth as auth;
pub use vaultsync_core as core;
pub use vaultsync_store as store;
pub use vaultsync_sync as sync;

pub use config::VaultConfig;
pub use error::{Result, VaultError};
pub use vault::{RemoteConfig, SyncReport, SyncStatus, Vault, REMOTE_KEY_CONTEXT, SALT_SIZE};

pub use vaultsync_core::{Identity, Keypair, SecretKey};
pub use vaultsync_sync::CancelToken;
