//! SQLite implementation of the DocumentStore trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};

use vaultsync_core::{Clock, SystemClock};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::path;
use crate::traits::{check_collections_parent, listing_prefix, Document, DocumentStore, DocumentsOpts};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_conn(conn, Arc::new(SystemClock)))
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_conn(conn, Arc::new(SystemClock)))
    }

    /// Replace the clock used for document timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn from_conn(conn: Connection, clock: Arc<dyn Clock>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            clock,
        }
    }

    /// Run a blocking operation on the connection.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Task(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

// Columns: path, data, created_at, updated_at
fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let data: Vec<u8> = row.get(1)?;
    Ok(Document {
        path: row.get(0)?,
        data: Bytes::from(data),
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

const SELECT_DOCUMENT: &str =
    "SELECT path, data, created_at, updated_at FROM documents WHERE path = ?1";

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create(&self, path: &str, data: &[u8]) -> Result<()> {
        let path = path::normalize(path)?;
        let data = data.to_vec();
        let now = self.clock.now_millis();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM documents WHERE path = ?1)",
                params![path],
                |row| row.get(0),
            )?;
            if exists {
                return Err(StoreError::AlreadyExists(path));
            }
            tx.execute(
                "INSERT INTO documents (path, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![path, data, now],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn set(&self, path: &str, data: &[u8]) -> Result<()> {
        let path = path::normalize(path)?;
        let data = data.to_vec();
        let now = self.clock.now_millis();

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO documents (path, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(path) DO UPDATE SET
                    data = excluded.data,
                    updated_at = excluded.updated_at",
                params![path, data, now],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, path: &str) -> Result<Option<Document>> {
        let path = path::normalize(path)?;

        self.run(move |conn| {
            Ok(conn
                .query_row(SELECT_DOCUMENT, params![path], row_to_document)
                .optional()?)
        })
        .await
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let path = path::normalize(path)?;

        self.run(move |conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM documents WHERE path = ?1)",
                params![path],
                |row| row.get(0),
            )?)
        })
        .await
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let path = path::normalize(path)?;

        self.run(move |conn| {
            let deleted = conn.execute("DELETE FROM documents WHERE path = ?1", params![path])?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn documents(&self, parent: &str, opts: DocumentsOpts) -> Result<Vec<Document>> {
        let prefix = listing_prefix(parent, &opts)?;
        let sql = if opts.no_data {
            "SELECT path, X'', created_at, updated_at FROM documents
             WHERE substr(path, 1, length(?1)) = ?1 ORDER BY path"
        } else {
            "SELECT path, data, created_at, updated_at FROM documents
             WHERE substr(path, 1, length(?1)) = ?1 ORDER BY path"
        };

        self.run(move |conn| {
            let mut stmt = conn.prepare(sql)?;
            let docs = stmt
                .query_map(params![prefix], row_to_document)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(docs)
        })
        .await
    }

    async fn get_all(&self, paths: &[String]) -> Result<Vec<Document>> {
        let paths = paths
            .iter()
            .map(|p| path::normalize(p))
            .collect::<Result<Vec<_>>>()?;

        self.run(move |conn| {
            let mut stmt = conn.prepare(SELECT_DOCUMENT)?;
            let mut docs = Vec::with_capacity(paths.len());
            for path in &paths {
                if let Some(doc) = stmt.query_row(params![path], row_to_document).optional()? {
                    docs.push(doc);
                }
            }
            Ok(docs)
        })
        .await
    }

    async fn collections(&self, parent: &str) -> Result<Vec<String>> {
        check_collections_parent(parent)?;

        self.run(move |conn| {
            let mut stmt = conn.prepare("SELECT path FROM documents")?;
            let paths = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let names: BTreeSet<String> = paths
                .iter()
                .map(|p| path::first(p).to_string())
                .collect();
            Ok(names.into_iter().collect())
        })
        .await
    }
}
