//! The Vault: an encrypted document store that syncs through a remote.
//!
//! Writes land in the local store and, sealed under the master key, in the
//! push log. [`Vault::sync`] sends the push log to the remote and applies
//! whatever other devices sent since the last pull.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::RngCore;
use tokio::sync::Mutex;
use vaultsync_core::{Clock, Identity, Keypair, SecretKey, SystemClock};
use vaultsync_store::{path, Document, DocumentStore, DocumentsOpts};
use vaultsync_sync::log::is_reserved;
use vaultsync_sync::{CancelToken, Record, SyncEngine, Transport, VaultClient, VaultLog};

use crate::config::VaultConfig;
use crate::error::{Result, VaultError};

/// Key derivation context for the remote signing key.
pub const REMOTE_KEY_CONTEXT: &str = "vaultsync 2024 remote signing key";

/// Size of a generated remote salt.
pub const SALT_SIZE: usize = 32;

/// The remote a vault syncs with.
///
/// The signing key is derived from the master key and the salt, and its
/// identity names the vault on the remote. Every device holding the same
/// master key and salt addresses the same remote vault.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub key: Keypair,
    pub salt: Bytes,
}

impl RemoteConfig {
    pub fn derive(master_key: &SecretKey, salt: impl Into<Bytes>) -> Self {
        let salt = salt.into();
        Self {
            key: master_key.derive_keypair(REMOTE_KEY_CONTEXT, &salt),
            salt,
        }
    }

    /// Remote vault id.
    pub fn kid(&self) -> Identity {
        self.key.identity()
    }
}

/// Remote and time of the last successful sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub kid: Identity,
    pub salt: Bytes,
    /// Unix ms.
    pub synced_at: i64,
}

/// Outcome of a sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub pushed: usize,
    pub pulled: usize,
}

#[derive(Default)]
struct VaultState {
    master_key: Option<SecretKey>,
    remote: Option<RemoteConfig>,
}

/// A vault over a document store and a remote transport.
///
/// Sync, unsync, remote setup and local writes hold the vault lock for their
/// whole duration, so only one of them touches the log at a time. Reads and
/// status queries go straight to the store.
pub struct Vault<S: DocumentStore, T: Transport> {
    engine: SyncEngine<S, T>,
    clock: Arc<dyn Clock>,
    state: Mutex<VaultState>,
}

impl<S: DocumentStore, T: Transport> Vault<S, T> {
    /// Create a locked vault.
    pub fn new(store: S, transport: T, config: VaultConfig) -> Self {
        Self::with_clock(store, transport, Arc::new(SystemClock), config)
    }

    /// Create a locked vault reading time from `clock`.
    pub fn with_clock(store: S, transport: T, clock: Arc<dyn Clock>, config: VaultConfig) -> Self {
        let log = VaultLog::new(Arc::new(store));
        let client = VaultClient::new(transport, config.base_url, clock.clone(), config.sync);
        Self {
            engine: SyncEngine::new(log, client),
            clock,
            state: Mutex::new(VaultState::default()),
        }
    }

    pub fn store(&self) -> &S {
        self.engine.log().store().as_ref()
    }

    pub fn log(&self) -> &VaultLog<S> {
        self.engine.log()
    }

    pub fn transport(&self) -> &T {
        self.engine.client().transport()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lock / Unlock
    // ─────────────────────────────────────────────────────────────────────────

    /// Load the master key.
    ///
    /// If a remote is configured its key is re-derived from the stored salt,
    /// and must match the stored remote identity.
    pub async fn unlock(&self, master_key: SecretKey) -> Result<()> {
        let mut state = self.state.lock().await;
        let remote = self.load_remote(&master_key).await?;
        state.master_key = Some(master_key);
        state.remote = remote;
        tracing::debug!("vault unlocked");
        Ok(())
    }

    /// Drop the master key and remote key.
    pub async fn lock(&self) {
        *self.state.lock().await = VaultState::default();
        tracing::debug!("vault locked");
    }

    pub async fn is_locked(&self) -> bool {
        self.state.lock().await.master_key.is_none()
    }

    async fn load_remote(&self, master_key: &SecretKey) -> Result<Option<RemoteConfig>> {
        let log = self.engine.log();
        let (Some(salt), Some(kid)) = (log.remote_salt().await?, log.remote_kid().await?) else {
            return Ok(None);
        };
        let remote = RemoteConfig::derive(master_key, salt);
        if remote.kid() != kid {
            return Err(VaultError::KeyMismatch(kid.to_string()));
        }
        Ok(Some(remote))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Remote
    // ─────────────────────────────────────────────────────────────────────────

    /// Configure the remote and return its vault id.
    ///
    /// With no salt the stored one is reused, or a random one generated.
    /// Passing another device's salt joins that device's remote vault.
    pub async fn setup_remote(&self, salt: Option<&[u8]>) -> Result<Identity> {
        let mut state = self.state.lock().await;
        let master_key = state.master_key.as_ref().ok_or(VaultError::Locked)?;
        let log = self.engine.log();

        let salt = match (salt, log.remote_salt().await?) {
            (Some(s), _) if s.is_empty() => {
                return Err(VaultError::InvalidInput("empty salt".into()));
            }
            (Some(s), Some(existing)) if s != &existing[..] => {
                return Err(VaultError::InvalidInput(
                    "a different remote is already configured".into(),
                ));
            }
            (Some(s), _) => Bytes::copy_from_slice(s),
            (None, Some(existing)) => existing,
            (None, None) => random_salt(),
        };

        let remote = RemoteConfig::derive(master_key, salt);
        let kid = remote.kid();
        log.set_remote_salt(&remote.salt).await?;
        log.set_remote_kid(&kid).await?;
        state.remote = Some(remote);

        tracing::info!(kid = %kid, "remote configured");
        Ok(kid)
    }

    /// Stored remote vault id, if any.
    pub async fn remote_kid(&self) -> Result<Option<Identity>> {
        Ok(self.engine.log().remote_kid().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Documents
    // ─────────────────────────────────────────────────────────────────────────

    /// Write a document and queue the change for the remote.
    pub async fn set(&self, path: &str, data: &[u8]) -> Result<()> {
        let path = doc_path(path)?;
        let state = self.state.lock().await;
        let master_key = state.master_key.as_ref().ok_or(VaultError::Locked)?;

        self.store().set(&path, data).await?;
        let record = Record::set(path, Bytes::copy_from_slice(data));
        self.engine.record(&record, master_key).await?;
        Ok(())
    }

    /// Delete a document and queue the deletion. Returns whether it existed;
    /// nothing is queued if it did not.
    pub async fn delete(&self, path: &str) -> Result<bool> {
        let path = doc_path(path)?;
        let state = self.state.lock().await;
        let master_key = state.master_key.as_ref().ok_or(VaultError::Locked)?;

        if !self.store().delete(&path).await? {
            return Ok(false);
        }
        self.engine.record(&Record::delete(path), master_key).await?;
        Ok(true)
    }

    pub async fn get(&self, path: &str) -> Result<Option<Document>> {
        let path = doc_path(path)?;
        Ok(self.store().get(&path).await?)
    }

    /// Documents in a collection, ordered by path.
    pub async fn documents(&self, collection: &str) -> Result<Vec<Document>> {
        let parent = doc_path(collection)?;
        Ok(self
            .store()
            .documents(&parent, DocumentsOpts::default())
            .await?)
    }

    /// Collections holding documents, without the sync collections.
    pub async fn collections(&self) -> Result<Vec<String>> {
        let mut cols = self.store().collections("/").await?;
        cols.retain(|c| !is_reserved(c));
        Ok(cols)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync
    // ─────────────────────────────────────────────────────────────────────────

    /// Push pending changes, then pull remote ones.
    pub async fn sync(&self) -> Result<SyncReport> {
        self.sync_with_cancel(&CancelToken::new()).await
    }

    /// [`sync`](Self::sync) that stops between entries once `cancel` fires.
    ///
    /// Progress made before a failure is kept; calling again resumes.
    pub async fn sync_with_cancel(&self, cancel: &CancelToken) -> Result<SyncReport> {
        let state = self.state.lock().await;
        let master_key = state.master_key.as_ref().ok_or(VaultError::Locked)?;
        let remote = state.remote.as_ref().ok_or(VaultError::NoRemote)?;
        let kid = remote.kid();

        tracing::info!(kid = %kid, "syncing vault");
        let pushed = self
            .engine
            .push(&remote.key, cancel)
            .await
            .map_err(VaultError::Push)?;
        let pulled = self
            .engine
            .pull(&remote.key, master_key, cancel)
            .await
            .map_err(VaultError::Pull)?;
        self.engine
            .log()
            .set_last_sync(self.clock.now_millis())
            .await?;

        tracing::info!(
            kid = %kid,
            pushed = pushed.pushed,
            pulled = pulled.pulled,
            index = pulled.index,
            "vault synced"
        );
        Ok(SyncReport {
            pushed: pushed.pushed,
            pulled: pulled.pulled,
        })
    }

    /// Detach from the remote.
    pub async fn unsync(&self) -> Result<()> {
        self.unsync_with_cancel(&CancelToken::new()).await
    }

    /// Delete the remote vault, fold the pull log into the push log and
    /// forget the remote.
    ///
    /// Each step completes before the next starts. If one fails, calling
    /// again picks up where it stopped. A remote vault that is already gone
    /// counts as deleted, and an interrupted log reset finishes its saved
    /// plan. The remote identity is forgotten last.
    pub async fn unsync_with_cancel(&self, cancel: &CancelToken) -> Result<()> {
        let mut state = self.state.lock().await;
        let log = self.engine.log();
        let Some(kid) = log.remote_kid().await? else {
            return Err(VaultError::NoRemote);
        };
        if state.master_key.is_none() {
            return Err(VaultError::Locked);
        }
        let Some(remote) = state.remote.as_ref() else {
            // Salt already cleared: only the identity is left
            tracing::info!(kid = %kid, "finishing interrupted unsync");
            log.clear_remote().await?;
            return Ok(());
        };

        tracing::info!(kid = %kid, "unsyncing vault");
        if !self.engine.delete_remote(&remote.key, cancel).await? {
            tracing::debug!(kid = %kid, "remote vault already deleted");
        }

        let reset = self.engine.reset().await?;
        log.set_last_sync(0).await?;
        log.set_pull_index(0).await?;
        let nonces = log.clear_nonces().await?;
        log.clear_remote().await?;
        state.remote = None;

        tracing::info!(
            kid = %kid,
            pulled = reset.pulled,
            pending = reset.pending,
            nonces,
            "vault unsynced"
        );
        Ok(())
    }

    /// Remote and last sync time, `None` before the first sync or without a
    /// remote.
    pub async fn sync_status(&self) -> Result<Option<SyncStatus>> {
        let log = self.engine.log();
        let Some(kid) = log.remote_kid().await? else {
            return Ok(None);
        };
        let synced_at = log.last_sync().await?;
        if synced_at == 0 {
            return Ok(None);
        }
        let salt = log.remote_salt().await?.unwrap_or_default();
        Ok(Some(SyncStatus {
            kid,
            salt,
            synced_at,
        }))
    }

    pub async fn auto_sync_disabled(&self) -> Result<bool> {
        Ok(self.engine.log().auto_sync_disabled().await?)
    }

    pub async fn set_auto_sync_disabled(&self, disabled: bool) -> Result<()> {
        Ok(self.engine.log().set_auto_sync_disabled(disabled).await?)
    }

    /// Sync if a remote is configured, auto sync is on, the vault is unlocked
    /// and the last sync is older than `max_age`. Returns whether it synced.
    pub async fn check_sync(&self, max_age: Duration) -> Result<bool> {
        let log = self.engine.log();
        if log.remote_kid().await?.is_none() || log.auto_sync_disabled().await? {
            return Ok(false);
        }
        let last = log.last_sync().await?;
        let age = self.clock.now_millis().saturating_sub(last);
        if last != 0 && age < max_age.as_millis() as i64 {
            return Ok(false);
        }
        if self.is_locked().await {
            tracing::debug!("skipping auto sync, vault is locked");
            return Ok(false);
        }
        self.sync().await?;
        Ok(true)
    }
}

/// Normalize a document path, rejecting the sync collections.
fn doc_path(raw: &str) -> Result<String> {
    let path = path::normalize(raw).map_err(|e| VaultError::InvalidInput(e.to_string()))?;
    if is_reserved(&path) {
        return Err(VaultError::InvalidInput(format!(
            "reserved collection {}",
            path::first(&path)
        )));
    }
    Ok(path)
}

fn random_salt() -> Bytes {
    let mut salt = vec![0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    Bytes::from(salt)
}
