//! # Vaultsync Testkit
//!
//! Testing utilities for vaultsync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Signed requests with known canonical URLs and headers
//! - **Generators**: Proptest strategies for paths, records and requests
//! - **Fixtures**: A shared in-memory remote, devices that sync through it,
//!   and a transport that fails on demand
//!
//! ## Golden Vectors
//!
//! ```rust
//! use vaultsync_testkit::vectors::{all_vectors, verify_vector};
//!
//! for vector in all_vectors() {
//!     verify_vector(&vector).unwrap();
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use vaultsync_testkit::fixtures::RemoteFixture;
//!
//! async fn example() {
//!     let remote = RemoteFixture::new();
//!     let (a, b) = remote.paired_devices().await;
//!     a.set("/notes/1", b"hello").await.unwrap();
//!     a.sync().await.unwrap();
//!     b.sync().await.unwrap();
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    master_key, seeded_keypair, Fault, FlakyStore, FlakyTransport, RemoteFixture, TestVault,
};
pub use generators::{doc_path, record, WriteOp};
pub use vectors::{all_vectors, verify_all_vectors, verify_vector, SigningVector};
