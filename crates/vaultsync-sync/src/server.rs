//! In-memory reference implementation of the vault remote.
//!
//! Serves the three remote calls over [`SignedRequest`]s:
//!
//! | Method | Path | Body | Response |
//! |---|---|---|---|
//! | `POST` | `/vault/{vid}` | CBOR `Vec<PushedEvent>` | empty |
//! | `GET` | `/vault/{vid}?idx=&limit=` | | CBOR [`PullResponse`] |
//! | `DELETE` | `/vault/{vid}` | | empty |
//!
//! Every request must be signed by the key whose identity is `{vid}`.
//! Pushed events are de-duplicated by nonce, so a client that re-sends after
//! a lost response does not create duplicate history.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use url::Url;

use vaultsync_auth::{
    AuthConfig, AuthError, AuthRequest, Authenticator, MemoryReplayGuard, SignedRequest,
};
use vaultsync_core::{content_digest, Clock, EventNonce, Identity, SystemClock};

use crate::event::{from_cbor, to_cbor, Event, PullResponse, PushedEvent};
use crate::transport::Response;

/// Largest page a pull may request.
pub const MAX_PULL_LIMIT: usize = 1000;

#[derive(Debug, Default)]
struct RemoteVault {
    events: Vec<Event>,
    nonces: HashSet<EventNonce>,
}

/// The reference remote.
#[derive(Debug)]
pub struct VaultService {
    vaults: Mutex<HashMap<Identity, RemoteVault>>,
    auth: Authenticator,
    clock: Arc<dyn Clock>,
}

impl VaultService {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Service whose clock stamps events and checks request timestamps.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let guard = Arc::new(MemoryReplayGuard::with_clock(clock.clone()));
        Self {
            vaults: Mutex::new(HashMap::new()),
            auth: Authenticator::with_defaults(guard, clock.clone()),
            clock,
        }
    }

    /// Service with explicit verifier settings.
    pub fn with_config(clock: Arc<dyn Clock>, config: AuthConfig) -> Result<Self, AuthError> {
        let guard = Arc::new(MemoryReplayGuard::with_clock(clock.clone()));
        Ok(Self {
            vaults: Mutex::new(HashMap::new()),
            auth: Authenticator::new(guard, clock.clone(), config)?,
            clock,
        })
    }

    /// Current time on the service clock.
    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Number of events stored for a vault.
    pub async fn event_count(&self, vid: &Identity) -> usize {
        self.vaults
            .lock()
            .await
            .get(vid)
            .map(|v| v.events.len())
            .unwrap_or(0)
    }

    pub async fn vault_exists(&self, vid: &Identity) -> bool {
        self.vaults.lock().await.contains_key(vid)
    }

    /// Handle one request.
    pub async fn handle(&self, req: &SignedRequest) -> Response {
        let url = match Url::parse(&req.url) {
            Ok(url) => url,
            Err(e) => return Response::error(400, format!("invalid url: {}", e)),
        };

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|c| !c.is_empty()).collect())
            .unwrap_or_default();
        let vid = match segments.as_slice() {
            ["vault", vid] => match Identity::parse(vid) {
                Ok(vid) => vid,
                Err(_) => return Response::error(400, "invalid vault id"),
            },
            _ => return Response::error(404, "not found"),
        };

        let digest = content_digest(&req.body);
        let auth_req = AuthRequest {
            method: &req.method,
            url: &req.url,
            authorization: &req.authorization,
            content_digest: &digest,
        };
        if let Err(err) = self.auth.check(&auth_req, &vid).await {
            return auth_error_response(err);
        }

        match req.method.as_str() {
            "POST" => self.push(&vid, &req.body).await,
            "GET" => self.pull(&vid, &url).await,
            "DELETE" => self.delete(&vid).await,
            _ => Response::error(405, "method not allowed"),
        }
    }

    async fn push(&self, vid: &Identity, body: &[u8]) -> Response {
        let pushed: Vec<PushedEvent> = match from_cbor(body) {
            Ok(events) => events,
            Err(e) => return Response::error(400, e.to_string()),
        };

        let mut vaults = self.vaults.lock().await;
        let vault = vaults.entry(vid.clone()).or_default();
        let mut accepted = 0;
        for event in pushed {
            if !vault.nonces.insert(event.nonce) {
                continue;
            }
            let index = vault.events.len() as i64 + 1;
            vault.events.push(Event {
                data: event.data,
                nonce: event.nonce,
                index,
                timestamp: self.clock.now_millis(),
            });
            accepted += 1;
        }
        tracing::debug!(vid = %vid, accepted, total = vault.events.len(), "remote accepted push");
        Response::ok(bytes::Bytes::new())
    }

    async fn pull(&self, vid: &Identity, url: &Url) -> Response {
        let mut idx: i64 = 0;
        let mut limit = MAX_PULL_LIMIT;
        for (k, v) in url.query_pairs() {
            match k.as_ref() {
                "idx" => match v.parse() {
                    Ok(n) => idx = n,
                    Err(_) => return Response::error(400, "invalid idx"),
                },
                "limit" => match v.parse::<usize>() {
                    Ok(n) if n > 0 => limit = n.min(MAX_PULL_LIMIT),
                    _ => return Response::error(400, "invalid limit"),
                },
                _ => {}
            }
        }

        let vaults = self.vaults.lock().await;
        let Some(vault) = vaults.get(vid) else {
            return Response::error(404, "vault not found");
        };

        // Index n lives at position n - 1
        let start = idx.clamp(0, vault.events.len() as i64) as usize;
        let remaining = &vault.events[start..];
        let events: Vec<Event> = remaining.iter().take(limit).cloned().collect();
        let resp = PullResponse {
            index: events.last().map(|e| e.index).unwrap_or(idx),
            truncated: remaining.len() > events.len(),
            events,
        };

        match to_cbor(&resp) {
            Ok(body) => Response::ok(body),
            Err(e) => Response::error(500, e.to_string()),
        }
    }

    async fn delete(&self, vid: &Identity) -> Response {
        match self.vaults.lock().await.remove(vid) {
            Some(_) => {
                tracing::debug!(vid = %vid, "remote vault deleted");
                Response::ok(bytes::Bytes::new())
            }
            None => Response::error(404, "vault not found"),
        }
    }
}

impl Default for VaultService {
    fn default() -> Self {
        Self::new()
    }
}

fn auth_error_response(err: AuthError) -> Response {
    match err {
        AuthError::InvalidHeader(_) | AuthError::InvalidKid | AuthError::VerifyFailed => {
            Response::error(403, err.to_string())
        }
        AuthError::InvalidInput(_) => Response::error(400, err.to_string()),
        AuthError::ReplayGuard(_) | AuthError::InvalidConfig(_) => {
            Response::error(500, err.to_string())
        }
    }
}
