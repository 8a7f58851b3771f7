//! Vault log model.
//!
//! Sync state lives in the document store next to the vault's documents:
//!
//! ```text
//! /push/<index>/<doc path>   sealed record awaiting push
//! /pull/<index>/<doc path>   CBOR Event as received from the remote
//! /sync/push                 last assigned push index
//! /sync/pull                 last applied remote index
//! /sync/lastSync             last successful sync (Unix ms, 0 = never)
//! /sync/rsalt                remote key salt
//! /sync/rkid                 remote identity
//! /sync/autoDisabled         auto-sync switch
//! /sync/nonces/<nonce>       event nonces already applied
//! /sync/reset                CBOR ResetPlan of an unfinished log reset
//! ```
//!
//! Indexes are zero-padded to 15 digits so path order is index order.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use vaultsync_core::{EventNonce, Identity};
use vaultsync_store::{path, Document, DocumentStore, DocumentsOpts, StoreExt};

use crate::error::{Result, SyncError};
use crate::event::{from_cbor, to_cbor, Event};

/// Collection holding the push log.
pub const PUSH: &str = "push";
/// Collection holding the pull log.
pub const PULL: &str = "pull";
/// Collection holding sync metadata.
pub const SYNC: &str = "sync";

/// Collections the log owns. Vault documents may not live in them.
pub const RESERVED_COLLECTIONS: [&str; 3] = [PUSH, PULL, SYNC];

pub const PUSH_INDEX_PATH: &str = "/sync/push";
pub const PULL_INDEX_PATH: &str = "/sync/pull";
pub const LAST_SYNC_PATH: &str = "/sync/lastSync";
pub const REMOTE_SALT_PATH: &str = "/sync/rsalt";
pub const REMOTE_KID_PATH: &str = "/sync/rkid";
pub const AUTO_DISABLED_PATH: &str = "/sync/autoDisabled";
pub const NONCES_PATH: &str = "/sync/nonces";
pub const RESET_PATH: &str = "/sync/reset";

/// Zero-pad a log index.
pub fn pad(index: i64) -> String {
    format!("{:015}", index)
}

/// Store path of a log entry.
pub fn entry_path(log: &str, index: i64, doc_path: &str) -> String {
    path::join(&[log, pad(index).as_str(), doc_path])
}

/// Whether `doc_path` falls in a collection the log owns.
pub fn is_reserved(doc_path: &str) -> bool {
    RESERVED_COLLECTIONS.contains(&path::first(doc_path))
}

/// One entry of the push or pull log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub index: i64,
    /// Path of the document the entry concerns.
    pub path: String,
    /// Sealed record (push) or CBOR event (pull).
    pub data: Bytes,
    /// Where the entry itself is stored.
    pub store_path: String,
}

impl LogEntry {
    fn from_document(doc: Document) -> Result<Self> {
        let index = path::nth(&doc.path, 1)
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| SyncError::InvalidEntry(doc.path.clone()))?;
        Ok(Self {
            index,
            path: path::path_from(&doc.path, 2),
            data: doc.data,
            store_path: doc.path,
        })
    }
}

/// What a log reset moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetReport {
    /// Pull entries moved to the front of the push log.
    pub pulled: usize,
    /// Pending push entries moved behind them.
    pub pending: usize,
}

/// Typed view of the sync state in a document store.
///
/// Not synchronized on its own: callers serialize mutation through the
/// vault lock.
pub struct VaultLog<S: DocumentStore> {
    store: Arc<S>,
}

impl<S: DocumentStore> Clone for VaultLog<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: DocumentStore> VaultLog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entries
    // ─────────────────────────────────────────────────────────────────────────

    /// Push entries, oldest first.
    pub async fn push_entries(&self) -> Result<Vec<LogEntry>> {
        self.entries(PUSH).await
    }

    /// Pull entries, oldest first.
    pub async fn pull_entries(&self) -> Result<Vec<LogEntry>> {
        self.entries(PULL).await
    }

    async fn entries(&self, log: &str) -> Result<Vec<LogEntry>> {
        self.store
            .documents(log, DocumentsOpts::default())
            .await?
            .into_iter()
            .map(LogEntry::from_document)
            .collect()
    }

    /// Append a sealed record to the push log. Returns its index.
    pub async fn append_push(&self, doc_path: &str, sealed: &[u8]) -> Result<i64> {
        let index = self.push_index_next().await?;
        self.store
            .set(&entry_path(PUSH, index, doc_path), sealed)
            .await?;
        Ok(index)
    }

    /// Record an applied remote event in the pull log.
    pub async fn append_pull(&self, doc_path: &str, event: &Event) -> Result<()> {
        let data = to_cbor(event)?;
        self.store
            .set(&entry_path(PULL, event.index, doc_path), &data)
            .await?;
        Ok(())
    }

    /// Drop a push entry once the remote has it.
    pub async fn remove_entry(&self, entry: &LogEntry) -> Result<()> {
        self.store.delete(&entry.store_path).await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cursors
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn push_index(&self) -> Result<i64> {
        Ok(self.store.get_i64(PUSH_INDEX_PATH).await?)
    }

    pub async fn set_push_index(&self, n: i64) -> Result<()> {
        Ok(self.store.set_i64(PUSH_INDEX_PATH, n).await?)
    }

    /// Advance the push index and return the new value. The first is 1.
    pub async fn push_index_next(&self) -> Result<i64> {
        let n = self.push_index().await? + 1;
        self.set_push_index(n).await?;
        Ok(n)
    }

    pub async fn pull_index(&self) -> Result<i64> {
        Ok(self.store.get_i64(PULL_INDEX_PATH).await?)
    }

    pub async fn set_pull_index(&self, n: i64) -> Result<()> {
        Ok(self.store.set_i64(PULL_INDEX_PATH, n).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Metadata
    // ─────────────────────────────────────────────────────────────────────────

    /// Last successful sync (Unix ms), 0 if never.
    pub async fn last_sync(&self) -> Result<i64> {
        Ok(self.store.get_i64(LAST_SYNC_PATH).await?)
    }

    pub async fn set_last_sync(&self, millis: i64) -> Result<()> {
        Ok(self.store.set_i64(LAST_SYNC_PATH, millis).await?)
    }

    pub async fn remote_salt(&self) -> Result<Option<Bytes>> {
        Ok(self.store.get_bytes(REMOTE_SALT_PATH).await?)
    }

    pub async fn set_remote_salt(&self, salt: &[u8]) -> Result<()> {
        Ok(self.store.set(REMOTE_SALT_PATH, salt).await?)
    }

    /// Persisted remote identity, if a remote is configured.
    pub async fn remote_kid(&self) -> Result<Option<Identity>> {
        match self.store.get_string(REMOTE_KID_PATH).await? {
            Some(s) => Identity::parse(&s).map(Some).map_err(SyncError::from),
            None => Ok(None),
        }
    }

    pub async fn set_remote_kid(&self, kid: &Identity) -> Result<()> {
        Ok(self
            .store
            .set(REMOTE_KID_PATH, kid.as_str().as_bytes())
            .await?)
    }

    /// Forget the remote: salt, then identity.
    ///
    /// The identity goes last so a vault that still reports a remote can be
    /// unsynced again.
    pub async fn clear_remote(&self) -> Result<()> {
        self.store.delete(REMOTE_SALT_PATH).await?;
        self.store.delete(REMOTE_KID_PATH).await?;
        Ok(())
    }

    pub async fn auto_sync_disabled(&self) -> Result<bool> {
        Ok(self.store.get_bool(AUTO_DISABLED_PATH).await?)
    }

    pub async fn set_auto_sync_disabled(&self, disabled: bool) -> Result<()> {
        Ok(self.store.set_bool(AUTO_DISABLED_PATH, disabled).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event nonces
    // ─────────────────────────────────────────────────────────────────────────

    fn nonce_path(nonce: &EventNonce) -> String {
        path::join(&[NONCES_PATH, nonce.to_base58().as_str()])
    }

    /// Fail with `NonceCollision` if the nonce was already applied.
    pub async fn check_nonce(&self, nonce: &EventNonce) -> Result<()> {
        if self.store.exists(&Self::nonce_path(nonce)).await? {
            return Err(SyncError::NonceCollision(nonce.to_base58()));
        }
        Ok(())
    }

    pub async fn commit_nonce(&self, nonce: &EventNonce) -> Result<()> {
        Ok(self.store.set(&Self::nonce_path(nonce), &[0x01]).await?)
    }

    /// Remove every recorded event nonce.
    pub async fn clear_nonces(&self) -> Result<usize> {
        let docs = self
            .store
            .documents(NONCES_PATH, DocumentsOpts::no_data())
            .await?;
        for doc in &docs {
            self.store.delete(&doc.path).await?;
        }
        Ok(docs.len())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reset
    // ─────────────────────────────────────────────────────────────────────────

    /// Fold the pull log back into the push log.
    ///
    /// Afterwards the push log holds the pulled events' records, in pull
    /// order, at indexes `1..=U`, followed by the pending push entries at
    /// `U+1..=U+P`. The pull log is empty and the push index is `U+P`. With
    /// an empty pull log nothing changes.
    ///
    /// The target layout is saved at [`RESET_PATH`] before anything moves.
    /// An interrupted reset finishes that saved plan on the next call
    /// instead of planning from the half-moved logs.
    pub async fn reset_log(&self) -> Result<ResetReport> {
        let plan = match self.saved_reset_plan().await? {
            Some(plan) => {
                tracing::info!(writes = plan.writes.len(), "resuming log reset");
                plan
            }
            None => match self.plan_reset().await? {
                Some(plan) => plan,
                None => return Ok(ResetReport::default()),
            },
        };
        self.apply_reset(&plan).await?;
        Ok(plan.report)
    }

    async fn saved_reset_plan(&self) -> Result<Option<ResetPlan>> {
        match self.store.get_bytes(RESET_PATH).await? {
            Some(bytes) => Ok(Some(from_cbor(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Compute and persist the reset layout. `None` if nothing was pulled.
    async fn plan_reset(&self) -> Result<Option<ResetPlan>> {
        let push = self.push_entries().await?;
        let pull = self.pull_entries().await?;
        if pull.is_empty() {
            return Ok(None);
        }

        let offset = pull.len() as i64;
        let mut writes = Vec::with_capacity(pull.len() + push.len());
        for (i, entry) in pull.iter().enumerate() {
            let event: Event = from_cbor(&entry.data)?;
            writes.push((entry_path(PUSH, i as i64 + 1, &entry.path), event.data));
        }
        for (i, entry) in push.iter().enumerate() {
            writes.push((
                entry_path(PUSH, offset + i as i64 + 1, &entry.path),
                entry.data.clone(),
            ));
        }

        let plan = ResetPlan {
            writes,
            deletes: push
                .iter()
                .chain(pull.iter())
                .map(|e| e.store_path.clone())
                .collect(),
            push_index: offset + push.len() as i64,
            report: ResetReport {
                pulled: pull.len(),
                pending: push.len(),
            },
        };
        // Bumped first so later appends never land inside the planned layout
        self.set_push_index(plan.push_index).await?;
        self.store.set(RESET_PATH, &to_cbor(&plan)?).await?;
        Ok(Some(plan))
    }

    /// Write the target layout, drop the old paths it does not reuse, then
    /// forget the plan. Every step can be repeated.
    async fn apply_reset(&self, plan: &ResetPlan) -> Result<()> {
        self.set_push_index(plan.push_index).await?;

        let mut targets = HashSet::with_capacity(plan.writes.len());
        for (target, data) in &plan.writes {
            self.store.set(target, data).await?;
            tracing::debug!(to = %target, "wrote reset entry");
            targets.insert(target.as_str());
        }
        for old in &plan.deletes {
            if !targets.contains(old.as_str()) {
                self.store.delete(old).await?;
            }
        }

        self.store.delete(RESET_PATH).await?;
        Ok(())
    }
}

/// A log reset's target layout, persisted while the reset runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ResetPlan {
    /// Push entries to write, by store path.
    writes: Vec<(String, Bytes)>,
    /// Store paths of the entries being replaced.
    deletes: Vec<String>,
    push_index: i64,
    report: ResetReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vaultsync_core::TestClock;
    use vaultsync_store::MemoryStore;

    fn log() -> VaultLog<MemoryStore> {
        VaultLog::new(Arc::new(MemoryStore::with_clock(Arc::new(TestClock::new()))))
    }

    fn event(index: i64, data: &[u8]) -> Event {
        Event {
            data: Bytes::copy_from_slice(data),
            nonce: EventNonce([index as u8; 24]),
            index,
            timestamp: 0,
        }
    }

    fn contents(entries: &[LogEntry]) -> Vec<(i64, String, Vec<u8>)> {
        entries
            .iter()
            .map(|e| (e.index, e.path.clone(), e.data.to_vec()))
            .collect()
    }

    #[test]
    fn test_pad_orders_lexicographically() {
        assert_eq!(pad(1), "000000000000001");
        assert!(pad(9) < pad(10));
        assert_eq!(
            entry_path(PUSH, 2, "/notes/a"),
            "/push/000000000000002/notes/a"
        );
        assert!(is_reserved("/sync/push"));
        assert!(!is_reserved("/notes/push"));
    }

    #[tokio::test]
    async fn test_push_index_next_starts_at_one() {
        let log = log();
        assert_eq!(log.push_index_next().await.unwrap(), 1);
        assert_eq!(log.push_index_next().await.unwrap(), 2);
        assert_eq!(log.push_index().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_append_and_read_entries() {
        let log = log();
        log.append_push("/notes/a", b"sealed-a").await.unwrap();
        log.append_push("/notes/b/c", b"sealed-b").await.unwrap();

        let entries = log.push_entries().await.unwrap();
        assert_eq!(
            contents(&entries),
            vec![
                (1, "/notes/a".to_string(), b"sealed-a".to_vec()),
                (2, "/notes/b/c".to_string(), b"sealed-b".to_vec()),
            ]
        );

        log.remove_entry(&entries[0]).await.unwrap();
        assert_eq!(log.push_entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_nonces() {
        let log = log();
        let nonce = EventNonce([3; 24]);
        log.check_nonce(&nonce).await.unwrap();
        log.commit_nonce(&nonce).await.unwrap();

        let err = log.check_nonce(&nonce).await.unwrap_err();
        assert_eq!(err.to_string(), format!("nonce collision {}", nonce.to_base58()));

        assert_eq!(log.clear_nonces().await.unwrap(), 1);
        log.check_nonce(&nonce).await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_metadata() {
        let log = log();
        assert_eq!(log.remote_kid().await.unwrap(), None);

        let kid = vaultsync_core::Keypair::from_seed(&[1; 32]).identity();
        log.set_remote_kid(&kid).await.unwrap();
        log.set_remote_salt(&[9; 32]).await.unwrap();
        assert_eq!(log.remote_kid().await.unwrap(), Some(kid));

        log.clear_remote().await.unwrap();
        assert_eq!(log.remote_kid().await.unwrap(), None);
        assert_eq!(log.remote_salt().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reset_log_empty_pull_is_noop() {
        let log = log();
        log.append_push("/a", b"1").await.unwrap();
        let before = log.push_entries().await.unwrap();

        assert_eq!(log.reset_log().await.unwrap(), ResetReport::default());
        assert_eq!(log.push_entries().await.unwrap(), before);
        assert_eq!(log.push_index().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reset_log_orders_pulled_before_pending() {
        let log = log();
        for (i, p) in ["/a", "/b", "/c"].iter().enumerate() {
            let idx = i as i64 + 1;
            log.append_pull(p, &event(idx, format!("u{}", idx).as_bytes()))
                .await
                .unwrap();
        }
        // Pending entries at sparse indexes, overlapping the pulled range
        log.set_push_index(1).await.unwrap();
        log.append_push("/x", b"p1").await.unwrap(); // index 2
        log.append_push("/a", b"p2").await.unwrap(); // index 3

        let report = log.reset_log().await.unwrap();
        assert_eq!(report, ResetReport { pulled: 3, pending: 2 });

        assert_eq!(
            contents(&log.push_entries().await.unwrap()),
            vec![
                (1, "/a".to_string(), b"u1".to_vec()),
                (2, "/b".to_string(), b"u2".to_vec()),
                (3, "/c".to_string(), b"u3".to_vec()),
                (4, "/x".to_string(), b"p1".to_vec()),
                (5, "/a".to_string(), b"p2".to_vec()),
            ]
        );
        assert!(log.pull_entries().await.unwrap().is_empty());
        assert_eq!(log.push_index().await.unwrap(), 5);

        // Second reset has nothing to do
        assert_eq!(log.reset_log().await.unwrap(), ResetReport::default());
    }

    #[tokio::test]
    async fn test_reset_log_resumes_interrupted_reset() {
        let log = log();
        for (i, p) in ["/a", "/b", "/c"].iter().enumerate() {
            let idx = i as i64 + 1;
            log.append_pull(p, &event(idx, format!("u{}", idx).as_bytes()))
                .await
                .unwrap();
        }
        log.set_push_index(1).await.unwrap();
        log.append_push("/x", b"p1").await.unwrap(); // index 2
        log.append_push("/a", b"p2").await.unwrap(); // index 3

        // Interrupted after two writes and one delete
        let plan = log.plan_reset().await.unwrap().unwrap();
        for (target, data) in &plan.writes[..2] {
            log.store.set(target, data).await.unwrap();
        }
        log.store
            .delete(&entry_path(PULL, 1, "/a"))
            .await
            .unwrap();
        assert!(log.store.exists(RESET_PATH).await.unwrap());

        let report = log.reset_log().await.unwrap();
        assert_eq!(report, ResetReport { pulled: 3, pending: 2 });
        assert_eq!(
            contents(&log.push_entries().await.unwrap()),
            vec![
                (1, "/a".to_string(), b"u1".to_vec()),
                (2, "/b".to_string(), b"u2".to_vec()),
                (3, "/c".to_string(), b"u3".to_vec()),
                (4, "/x".to_string(), b"p1".to_vec()),
                (5, "/a".to_string(), b"p2".to_vec()),
            ]
        );
        assert!(log.pull_entries().await.unwrap().is_empty());
        assert_eq!(log.push_index().await.unwrap(), 5);
        assert!(!log.store.exists(RESET_PATH).await.unwrap());

        assert_eq!(log.reset_log().await.unwrap(), ResetReport::default());
    }

    proptest! {
        #[test]
        fn reset_log_invariant(
            pulled in prop::collection::vec(("[a-c]{1,2}", any::<u8>()), 1..6),
            pending in prop::collection::vec(("[a-c]{1,2}", any::<u8>()), 0..6),
            skip in 0i64..4,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let log = log();
                for (i, (p, b)) in pulled.iter().enumerate() {
                    log.append_pull(&format!("/{}", p), &event(i as i64 + 1, &[*b, 0xaa]))
                        .await
                        .unwrap();
                }
                log.set_push_index(skip).await.unwrap();
                for (p, b) in &pending {
                    log.append_push(&format!("/{}", p), &[*b, 0xbb]).await.unwrap();
                }

                log.reset_log().await.unwrap();

                let expected: Vec<(i64, String, Vec<u8>)> = pulled
                    .iter()
                    .map(|(p, b)| (format!("/{}", p), vec![*b, 0xaa]))
                    .chain(pending.iter().map(|(p, b)| (format!("/{}", p), vec![*b, 0xbb])))
                    .enumerate()
                    .map(|(i, (p, d))| (i as i64 + 1, p, d))
                    .collect();

                assert_eq!(contents(&log.push_entries().await.unwrap()), expected);
                assert!(log.pull_entries().await.unwrap().is_empty());
                assert_eq!(
                    log.push_index().await.unwrap(),
                    (pulled.len() + pending.len()) as i64
                );
            });
        }

        #[test]
        fn entry_paths_sort_by_index(
            a in 0i64..1_000_000_000_000_000,
            b in 0i64..1_000_000_000_000_000,
            pa in "[a-z]{1,8}(/[a-z]{1,8})?",
            pb in "[a-z]{1,8}(/[a-z]{1,8})?",
        ) {
            prop_assume!(a != b);
            let left = entry_path(PUSH, a, &format!("/{}", pa));
            let right = entry_path(PUSH, b, &format!("/{}", pb));
            prop_assert_eq!(left < right, a < b);
        }
    }
}
