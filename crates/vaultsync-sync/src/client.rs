//! Signed client for the vault remote.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use vaultsync_auth::new_request;
use vaultsync_core::{content_digest, Clock, Keypair};

use crate::cancel::CancelToken;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::event::{from_cbor, to_cbor, PullResponse, PushedEvent};
use crate::transport::{Response, Transport};

/// Client for one remote, signing every call with the vault's remote key.
///
/// Each call races the cancel token and is bounded by the configured
/// request timeout.
pub struct VaultClient<T: Transport> {
    transport: T,
    base_url: String,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
}

impl<T: Transport> VaultClient<T> {
    pub fn new(transport: T, base_url: impl Into<String>, clock: Arc<dyn Clock>, config: SyncConfig) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            clock,
            config,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn vault_url(&self, key: &Keypair) -> String {
        format!("{}/vault/{}", self.base_url, key.identity())
    }

    /// Send events to the remote.
    pub async fn push(&self, key: &Keypair, events: &[PushedEvent], cancel: &CancelToken) -> Result<()> {
        let body = Bytes::from(to_cbor(&events)?);
        let resp = self.send("POST", &self.vault_url(key), body, key, cancel).await?;
        check_status(&resp)
    }

    /// Fetch events after `since`. `None` if the remote has no such vault.
    pub async fn pull(
        &self,
        key: &Keypair,
        since: i64,
        cancel: &CancelToken,
    ) -> Result<Option<PullResponse>> {
        let url = format!(
            "{}?idx={}&limit={}",
            self.vault_url(key),
            since,
            self.config.pull_limit
        );
        let resp = self.send("GET", &url, Bytes::new(), key, cancel).await?;
        if resp.status == 404 {
            return Ok(None);
        }
        check_status(&resp)?;
        from_cbor(&resp.body).map(Some)
    }

    /// Delete the vault on the remote. Returns `false` if it did not exist.
    pub async fn delete_vault(&self, key: &Keypair, cancel: &CancelToken) -> Result<bool> {
        let resp = self
            .send("DELETE", &self.vault_url(key), Bytes::new(), key, cancel)
            .await?;
        if resp.status == 404 {
            return Ok(false);
        }
        check_status(&resp)?;
        Ok(true)
    }

    async fn send(
        &self,
        method: &str,
        url: &str,
        body: Bytes,
        key: &Keypair,
        cancel: &CancelToken,
    ) -> Result<Response> {
        let digest = content_digest(&body);
        let req = new_request(method, url, body, &digest, self.clock.now_millis(), key)?;
        tracing::trace!(method, url = %req.url, "remote request");
        self.bounded(self.transport.round_trip(req), cancel).await
    }

    async fn bounded<F>(&self, call: F, cancel: &CancelToken) -> Result<Response>
    where
        F: Future<Output = Result<Response>>,
    {
        let timeout = self.config.request_timeout;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SyncError::Cancelled),
            res = tokio::time::timeout(timeout, call) => match res {
                Ok(resp) => resp,
                Err(_) => Err(SyncError::Timeout(timeout)),
            },
        }
    }
}

fn check_status(resp: &Response) -> Result<()> {
    if resp.is_success() {
        Ok(())
    } else {
        Err(SyncError::Remote {
            status: resp.status,
            message: resp.text(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::VaultService;
    use crate::transport::memory::MemoryTransport;
    use async_trait::async_trait;
    use std::time::Duration;
    use vaultsync_auth::SignedRequest;
    use vaultsync_core::{EventNonce, TestClock};

    fn client() -> VaultClient<MemoryTransport> {
        let clock = Arc::new(TestClock::new());
        let service = Arc::new(VaultService::with_clock(clock.clone()));
        VaultClient::new(
            MemoryTransport::new(service),
            "https://remote/",
            clock,
            SyncConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_push_pull_delete() {
        let client = client();
        let key = Keypair::from_seed(&[0x07; 32]);
        let cancel = CancelToken::new();

        assert_eq!(client.pull(&key, 0, &cancel).await.unwrap(), None);

        let events = vec![PushedEvent {
            data: Bytes::from_static(b"sealed"),
            nonce: EventNonce([1; 24]),
        }];
        client.push(&key, &events, &cancel).await.unwrap();

        let resp = client.pull(&key, 0, &cancel).await.unwrap().unwrap();
        assert_eq!(resp.events.len(), 1);
        assert_eq!(resp.events[0].data, events[0].data);

        assert!(client.delete_vault(&key, &cancel).await.unwrap());
        assert!(!client.delete_vault(&key, &cancel).await.unwrap());
    }

    #[derive(Debug)]
    struct Hang;

    #[async_trait]
    impl Transport for Hang {
        async fn round_trip(&self, _request: SignedRequest) -> Result<Response> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_timeout_and_cancel() {
        let config = SyncConfig {
            request_timeout: Duration::from_millis(20),
            ..SyncConfig::default()
        };
        let client = VaultClient::new(Hang, "https://remote", Arc::new(TestClock::new()), config);
        let key = Keypair::from_seed(&[0x07; 32]);

        let err = client.pull(&key, 0, &CancelToken::new()).await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout(_)));

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = client.delete_vault(&key, &cancel).await.unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
    }
}
