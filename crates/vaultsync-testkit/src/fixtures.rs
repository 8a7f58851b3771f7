//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a shared in-memory remote,
//! devices syncing through it, and a transport and store that fail on
//! demand.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use vaultsync::{Vault, VaultConfig};
use vaultsync_auth::SignedRequest;
use vaultsync_core::{Clock, Keypair, SecretKey, TestClock};
use vaultsync_store::{Document, DocumentStore, DocumentsOpts, MemoryStore, StoreError};
use vaultsync_sync::{MemoryTransport, Response, SyncError, Transport, VaultService};

/// Deterministic request signing key.
pub fn seeded_keypair(n: u8) -> Keypair {
    Keypair::from_seed(&[n; 32])
}

/// Deterministic vault master key.
pub fn master_key(n: u8) -> SecretKey {
    SecretKey::from_bytes([n; 32])
}

/// How a [`FlakyTransport`] fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail without reaching the remote.
    Refuse,
    /// Deliver the request, then fail as if the response was lost.
    LoseResponse,
}

#[derive(Debug)]
struct FlakyState {
    /// Calls still allowed through; `None` means no fault is armed.
    pass: Option<usize>,
    fault: Fault,
    calls: usize,
    failures: usize,
}

/// A transport over a [`MemoryTransport`] that can be told to fail.
///
/// Clones share their fault state.
#[derive(Debug, Clone)]
pub struct FlakyTransport {
    inner: MemoryTransport,
    state: Arc<Mutex<FlakyState>>,
}

impl FlakyTransport {
    pub fn new(inner: MemoryTransport) -> Self {
        Self {
            inner,
            state: Arc::new(Mutex::new(FlakyState {
                pass: None,
                fault: Fault::Refuse,
                calls: 0,
                failures: 0,
            })),
        }
    }

    /// Let `n` more calls through, then fail every call with `fault`.
    pub fn fail_after(&self, n: usize, fault: Fault) {
        let mut state = self.state.lock().unwrap();
        state.pass = Some(n);
        state.fault = fault;
    }

    /// Stop failing.
    pub fn heal(&self) {
        self.state.lock().unwrap().pass = None;
    }

    /// Calls seen, failed ones included.
    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    pub fn failures(&self) -> usize {
        self.state.lock().unwrap().failures
    }

    pub fn service(&self) -> &Arc<VaultService> {
        self.inner.service()
    }

    fn next_fault(&self) -> Option<Fault> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        match state.pass {
            None => None,
            Some(0) => {
                state.failures += 1;
                Some(state.fault)
            }
            Some(n) => {
                state.pass = Some(n - 1);
                None
            }
        }
    }
}

#[async_trait]
impl Transport for FlakyTransport {
    async fn round_trip(&self, request: SignedRequest) -> vaultsync_sync::Result<Response> {
        match self.next_fault() {
            None => self.inner.round_trip(request).await,
            Some(Fault::Refuse) => Err(SyncError::Transport("connection refused".into())),
            Some(Fault::LoseResponse) => {
                self.inner.round_trip(request).await?;
                Err(SyncError::Transport("connection reset".into()))
            }
        }
    }
}

/// A delete fault armed on a [`FlakyStore`].
#[derive(Debug)]
struct DeleteFault {
    prefix: String,
    /// Matching deletes still allowed through.
    pass: usize,
}

/// A [`MemoryStore`] whose deletes can be told to fail.
#[derive(Debug)]
pub struct FlakyStore {
    inner: MemoryStore,
    faults: Mutex<Vec<DeleteFault>>,
}

impl FlakyStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: MemoryStore::with_clock(clock),
            faults: Mutex::new(Vec::new()),
        }
    }

    /// Let `n` deletes under `prefix` through, then fail the next one once.
    pub fn fail_delete_after(&self, prefix: &str, n: usize) {
        self.faults.lock().unwrap().push(DeleteFault {
            prefix: prefix.to_string(),
            pass: n,
        });
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn take_fault(&self, path: &str) -> bool {
        let mut faults = self.faults.lock().unwrap();
        let Some(i) = faults.iter().position(|f| path.starts_with(&f.prefix)) else {
            return false;
        };
        if faults[i].pass > 0 {
            faults[i].pass -= 1;
            return false;
        }
        faults.remove(i);
        true
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn create(&self, path: &str, data: &[u8]) -> vaultsync_store::Result<()> {
        self.inner.create(path, data).await
    }

    async fn set(&self, path: &str, data: &[u8]) -> vaultsync_store::Result<()> {
        self.inner.set(path, data).await
    }

    async fn get(&self, path: &str) -> vaultsync_store::Result<Option<Document>> {
        self.inner.get(path).await
    }

    async fn exists(&self, path: &str) -> vaultsync_store::Result<bool> {
        self.inner.exists(path).await
    }

    async fn delete(&self, path: &str) -> vaultsync_store::Result<bool> {
        if self.take_fault(path) {
            return Err(StoreError::Task(format!("injected delete failure {}", path)));
        }
        self.inner.delete(path).await
    }

    async fn documents(
        &self,
        parent: &str,
        opts: DocumentsOpts,
    ) -> vaultsync_store::Result<Vec<Document>> {
        self.inner.documents(parent, opts).await
    }

    async fn get_all(&self, paths: &[String]) -> vaultsync_store::Result<Vec<Document>> {
        self.inner.get_all(paths).await
    }

    async fn collections(&self, parent: &str) -> vaultsync_store::Result<Vec<String>> {
        self.inner.collections(parent).await
    }
}

/// A vault as used in tests.
pub type TestVault = Vault<FlakyStore, FlakyTransport>;

/// One in-memory remote and a virtual clock shared by every device.
pub struct RemoteFixture {
    pub clock: Arc<TestClock>,
    pub service: Arc<VaultService>,
    pub config: VaultConfig,
}

impl RemoteFixture {
    pub fn new() -> Self {
        let clock = Arc::new(TestClock::new());
        Self {
            service: Arc::new(VaultService::with_clock(clock.clone())),
            clock,
            config: VaultConfig::default(),
        }
    }

    /// A new, locked device with an empty store.
    pub fn device(&self) -> TestVault {
        Vault::with_clock(
            FlakyStore::new(self.clock.clone()),
            FlakyTransport::new(MemoryTransport::new(self.service.clone())),
            self.clock.clone(),
            self.config.clone(),
        )
    }

    /// A device unlocked with `master_key(1)`, no remote configured.
    pub async fn unlocked_device(&self) -> TestVault {
        let vault = self.device();
        vault.unlock(master_key(1)).await.unwrap();
        vault
    }

    /// Two unlocked devices sharing a master key and a remote vault.
    pub async fn paired_devices(&self) -> (TestVault, TestVault) {
        let a = self.unlocked_device().await;
        a.setup_remote(None).await.unwrap();
        let salt = a.log().remote_salt().await.unwrap().unwrap();

        let b = self.unlocked_device().await;
        b.setup_remote(Some(&salt[..])).await.unwrap();
        (a, b)
    }

    /// Events the remote holds for `vault`.
    pub async fn event_count(&self, vault: &TestVault) -> usize {
        let kid = vault.remote_kid().await.unwrap().unwrap();
        self.service.event_count(&kid).await
    }
}

impl Default for RemoteFixture {
    fn default() -> Self {
        Self::new()
    }
}
