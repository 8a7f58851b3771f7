//! # Vaultsync Sync
//!
//! The vault log model, the remote vault protocol and the engine that moves
//! entries between them.
//!
//! ## Log layout
//!
//! Everything lives in the vault's own [`DocumentStore`](vaultsync_store::DocumentStore):
//!
//! ```text
//! /push/<index>/<doc path>    sealed record waiting to be sent
//! /pull/<index>/<doc path>    remote event already applied locally
//! /sync/...                   indexes, remote key salt and kid, seen nonces
//! ```
//!
//! Indexes are zero-padded to 15 digits so lexical order is numeric order.
//!
//! ## Key Types
//!
//! - [`VaultLog`] - Push log, pull log and sync metadata over a store
//! - [`SyncEngine`] - Push, pull and log reset
//! - [`VaultClient`] - Signed calls to the remote
//! - [`VaultService`] - In-process remote with request authentication
//! - [`Transport`] - How a signed request reaches the remote

pub mod cancel;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod log;
pub mod server;
pub mod transport;

pub use cancel::CancelToken;
pub use client::VaultClient;
pub use config::SyncConfig;
pub use engine::{PullReport, PushReport, SyncEngine};
pub use error::{Result, SyncError};
pub use event::{Event, PullResponse, PushedEvent, Record};
pub use log::{LogEntry, ResetReport, VaultLog};
pub use server::VaultService;
pub use transport::memory::MemoryTransport;
pub use transport::{Response, Transport};
