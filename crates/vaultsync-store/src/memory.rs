//! In-memory implementation of the DocumentStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use vaultsync_core::{Clock, SystemClock};

use crate::error::{Result, StoreError};
use crate::path;
use crate::traits::{check_collections_parent, listing_prefix, Document, DocumentStore, DocumentsOpts};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Debug)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<String, Stored>>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone)]
struct Stored {
    data: Bytes,
    created_at: i64,
    updated_at: i64,
}

impl Stored {
    fn to_document(&self, path: &str, no_data: bool) -> Document {
        Document {
            path: path.to_string(),
            data: if no_data { Bytes::new() } else { self.data.clone() },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store that stamps documents with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
            clock,
        }
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.docs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, path: &str, data: &[u8]) -> Result<()> {
        let path = path::normalize(path)?;
        let now = self.clock.now_millis();
        let mut docs = self.docs.write().unwrap();

        if docs.contains_key(&path) {
            return Err(StoreError::AlreadyExists(path));
        }
        docs.insert(
            path,
            Stored {
                data: Bytes::copy_from_slice(data),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn set(&self, path: &str, data: &[u8]) -> Result<()> {
        let path = path::normalize(path)?;
        let now = self.clock.now_millis();
        let mut docs = self.docs.write().unwrap();

        let created_at = docs.get(&path).map(|s| s.created_at).unwrap_or(now);
        docs.insert(
            path,
            Stored {
                data: Bytes::copy_from_slice(data),
                created_at,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Document>> {
        let path = path::normalize(path)?;
        let docs = self.docs.read().unwrap();
        Ok(docs.get(&path).map(|s| s.to_document(&path, false)))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let path = path::normalize(path)?;
        Ok(self.docs.read().unwrap().contains_key(&path))
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let path = path::normalize(path)?;
        Ok(self.docs.write().unwrap().remove(&path).is_some())
    }

    async fn documents(&self, parent: &str, opts: DocumentsOpts) -> Result<Vec<Document>> {
        let prefix = listing_prefix(parent, &opts)?;
        let docs = self.docs.read().unwrap();

        Ok(docs
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .map(|(p, s)| s.to_document(p, opts.no_data))
            .collect())
    }

    async fn get_all(&self, paths: &[String]) -> Result<Vec<Document>> {
        let normalized = paths
            .iter()
            .map(|p| path::normalize(p))
            .collect::<Result<Vec<_>>>()?;
        let docs = self.docs.read().unwrap();

        Ok(normalized
            .iter()
            .filter_map(|p| docs.get(p).map(|s| s.to_document(p, false)))
            .collect())
    }

    async fn collections(&self, parent: &str) -> Result<Vec<String>> {
        check_collections_parent(parent)?;
        let docs = self.docs.read().unwrap();

        let names: BTreeSet<&str> = docs.keys().map(|p| path::first(p)).collect();
        Ok(names.into_iter().map(str::to_string).collect())
    }
}
