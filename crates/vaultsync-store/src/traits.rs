//! DocumentStore trait: the abstract interface for path-addressed documents.
//!
//! The sync layer only needs ordered, prefix-scoped listing and atomic
//! single-key reads and writes. Implementations include SQLite (primary) and
//! in-memory (for tests).

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, StoreError};

/// A stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Normalized path.
    pub path: String,
    /// Document bytes. Empty when listed with `no_data`.
    pub data: Bytes,
    /// When the document was first written (Unix ms).
    pub created_at: i64,
    /// When the document was last written (Unix ms).
    pub updated_at: i64,
}

/// Options for [`DocumentStore::documents`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentsOpts {
    /// Only documents whose path below the parent starts with this prefix.
    pub prefix: Option<String>,
    /// Skip loading document bytes.
    pub no_data: bool,
}

impl DocumentsOpts {
    pub fn no_data() -> Self {
        Self {
            prefix: None,
            no_data: true,
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            no_data: false,
        }
    }
}

/// Async interface for document persistence.
///
/// Paths are normalized by the store (see [`crate::path`]). Listing is
/// ordered by path, byte-wise, so zero-padded numeric components sort
/// numerically.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Single Document Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a document. Fails with `AlreadyExists` if the path is taken.
    async fn create(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Create or replace a document. `created_at` is kept on replace.
    async fn set(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Get a document.
    async fn get(&self, path: &str) -> Result<Option<Document>>;

    /// Check if a document exists.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Delete a document. Returns whether it existed.
    async fn delete(&self, path: &str) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Listing
    // ─────────────────────────────────────────────────────────────────────────

    /// All documents below `parent`, ordered by path.
    ///
    /// `"/"` lists everything.
    async fn documents(&self, parent: &str, opts: DocumentsOpts) -> Result<Vec<Document>>;

    /// Documents at the given paths. Missing paths are skipped.
    async fn get_all(&self, paths: &[String]) -> Result<Vec<Document>>;

    /// Root collection names, sorted.
    async fn collections(&self, parent: &str) -> Result<Vec<String>>;
}

/// Listing prefix for `parent` and an optional key prefix.
pub(crate) fn listing_prefix(parent: &str, opts: &DocumentsOpts) -> Result<String> {
    let mut prefix = if crate::path::components(parent).is_empty() {
        "/".to_string()
    } else {
        crate::path::normalize(parent)? + "/"
    };
    if let Some(key_prefix) = &opts.prefix {
        prefix.push_str(key_prefix.trim_start_matches('/'));
    }
    Ok(prefix)
}

/// Only root collections are listed.
pub(crate) fn check_collections_parent(parent: &str) -> Result<()> {
    if crate::path::components(parent).is_empty() {
        Ok(())
    } else {
        Err(StoreError::Unsupported(
            "only root collections supported".into(),
        ))
    }
}

/// Typed accessors over fixed paths.
///
/// Integers are 8-byte big-endian, booleans a single byte. Missing values
/// read as zero, `false` or `None`.
pub trait StoreExt: DocumentStore {
    /// Read an integer counter.
    fn get_i64(&self, path: &str) -> impl std::future::Future<Output = Result<i64>> + Send;

    /// Write an integer counter.
    fn set_i64(&self, path: &str, n: i64) -> impl std::future::Future<Output = Result<()>> + Send;

    fn get_bool(&self, path: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    fn set_bool(&self, path: &str, b: bool)
        -> impl std::future::Future<Output = Result<()>> + Send;

    /// Raw bytes at a path, if any.
    fn get_bytes(&self, path: &str)
        -> impl std::future::Future<Output = Result<Option<Bytes>>> + Send;

    /// UTF-8 string at a path, if any.
    fn get_string(&self, path: &str)
        -> impl std::future::Future<Output = Result<Option<String>>> + Send;
}

impl<S: DocumentStore + ?Sized> StoreExt for S {
    async fn get_i64(&self, path: &str) -> Result<i64> {
        let Some(doc) = self.get(path).await? else {
            return Ok(0);
        };
        let arr: [u8; 8] = doc.data[..]
            .try_into()
            .map_err(|_| StoreError::InvalidData {
                path: doc.path.clone(),
                reason: format!("expected 8 bytes, got {}", doc.data.len()),
            })?;
        Ok(i64::from_be_bytes(arr))
    }

    async fn set_i64(&self, path: &str, n: i64) -> Result<()> {
        self.set(path, &n.to_be_bytes()).await
    }

    async fn get_bool(&self, path: &str) -> Result<bool> {
        let Some(doc) = self.get(path).await? else {
            return Ok(false);
        };
        match doc.data.as_ref() {
            [0] => Ok(false),
            [1] => Ok(true),
            other => Err(StoreError::InvalidData {
                path: doc.path.clone(),
                reason: format!("expected 1 byte bool, got {} bytes", other.len()),
            }),
        }
    }

    async fn set_bool(&self, path: &str, b: bool) -> Result<()> {
        self.set(path, &[b as u8]).await
    }

    async fn get_bytes(&self, path: &str) -> Result<Option<Bytes>> {
        Ok(self.get(path).await?.map(|doc| doc.data))
    }

    async fn get_string(&self, path: &str) -> Result<Option<String>> {
        let Some(doc) = self.get(path).await? else {
            return Ok(None);
        };
        String::from_utf8(doc.data.to_vec())
            .map(Some)
            .map_err(|_| StoreError::InvalidData {
                path: doc.path,
                reason: "not utf-8".into(),
            })
    }
}
