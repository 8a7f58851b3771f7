//! Sync engine: push, pull and log reset.
//!
//! The engine does no locking of its own. The vault holds its exclusive lock
//! around every call, so at most one engine operation touches the log at a
//! time.
//!
//! Progress is durable at entry granularity and never rolled back:
//!
//! - push deletes each entry only after the remote accepted it, so a failed
//!   push resends at most the entry in flight (the remote drops duplicates
//!   by event nonce);
//! - pull persists the pull index after each applied event, so a failed pull
//!   resumes after the last applied event.

use bytes::Bytes;
use vaultsync_core::{EventNonce, Keypair, SecretKey};
use vaultsync_store::{path, DocumentStore};

use crate::cancel::CancelToken;
use crate::client::VaultClient;
use crate::error::{Result, SyncError};
use crate::event::{Event, PushedEvent, Record};
use crate::log::{is_reserved, ResetReport, VaultLog};
use crate::transport::Transport;

/// Outcome of a push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Entries accepted by the remote and removed locally.
    pub pushed: usize,
}

/// Outcome of a pull.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Events applied.
    pub pulled: usize,
    /// Pull index afterwards.
    pub index: i64,
}

/// Moves entries between a vault log and its remote.
pub struct SyncEngine<S: DocumentStore, T: Transport> {
    log: VaultLog<S>,
    client: VaultClient<T>,
}

impl<S: DocumentStore, T: Transport> SyncEngine<S, T> {
    pub fn new(log: VaultLog<S>, client: VaultClient<T>) -> Self {
        Self { log, client }
    }

    pub fn log(&self) -> &VaultLog<S> {
        &self.log
    }

    pub fn client(&self) -> &VaultClient<T> {
        &self.client
    }

    /// Send every push entry to the remote, oldest first.
    ///
    /// Stops at the first failure; entries not yet sent stay in the log.
    pub async fn push(&self, key: &Keypair, cancel: &CancelToken) -> Result<PushReport> {
        let entries = self.log.push_entries().await?;
        let mut report = PushReport::default();

        for entry in &entries {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let event = PushedEvent::from_sealed(entry.data.clone())?;
            self.client
                .push(key, std::slice::from_ref(&event), cancel)
                .await?;
            self.log.remove_entry(entry).await?;
            report.pushed += 1;
            tracing::debug!(index = entry.index, path = %entry.path, "pushed entry");
        }

        Ok(report)
    }

    /// Apply remote events after the pull index, in remote order.
    ///
    /// Pages through the remote until it reports no more events. A missing
    /// remote vault counts as empty.
    pub async fn pull(
        &self,
        key: &Keypair,
        master_key: &SecretKey,
        cancel: &CancelToken,
    ) -> Result<PullReport> {
        let mut report = PullReport {
            pulled: 0,
            index: self.log.pull_index().await?,
        };

        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let Some(page) = self.client.pull(key, report.index, cancel).await? else {
                break;
            };
            let since = report.index;

            for event in &page.events {
                if event.index <= report.index {
                    continue;
                }
                if cancel.is_cancelled() {
                    return Err(SyncError::Cancelled);
                }
                self.apply(event, master_key).await?;
                report.index = event.index;
                report.pulled += 1;
            }

            if !page.truncated {
                break;
            }
            if report.index == since {
                tracing::warn!(index = since, "remote sent a truncated page with nothing new");
                break;
            }
        }

        Ok(report)
    }

    /// Apply one event. The nonce is committed last, after the pull index,
    /// so an interrupted apply is retried rather than reported as a replay.
    async fn apply(&self, event: &Event, master_key: &SecretKey) -> Result<()> {
        self.log.check_nonce(&event.nonce).await?;

        if EventNonce::from_sealed(&event.data) != Some(event.nonce) {
            return Err(SyncError::Serialization(format!(
                "event {} nonce does not match its payload",
                event.index
            )));
        }
        let record = Record::open(&event.data, master_key)?;
        let doc_path = path::normalize(&record.path)?;
        if is_reserved(&doc_path) {
            return Err(SyncError::InvalidEntry(doc_path));
        }

        let store = self.log.store();
        match &record.data {
            Some(data) => store.set(&doc_path, data).await?,
            None => {
                store.delete(&doc_path).await?;
            }
        }

        self.log.append_pull(&doc_path, event).await?;
        self.log.set_pull_index(event.index).await?;
        self.log.commit_nonce(&event.nonce).await?;

        tracing::debug!(index = event.index, path = %doc_path, deleted = record.data.is_none(), "applied event");
        Ok(())
    }

    /// Fold the pull log back into the push log.
    pub async fn reset(&self) -> Result<ResetReport> {
        self.log.reset_log().await
    }

    /// Delete the remote vault. `false` if it was already gone.
    pub async fn delete_remote(&self, key: &Keypair, cancel: &CancelToken) -> Result<bool> {
        self.client.delete_vault(key, cancel).await
    }

    /// Seal a record and append it to the push log.
    pub async fn record(&self, record: &Record, master_key: &SecretKey) -> Result<i64> {
        let sealed = Bytes::from(record.seal(master_key)?);
        self.log.append_push(&record.path, &sealed).await
    }
}
