//! Server side: checking a signed request.

use std::sync::Arc;

use url::Url;
use vaultsync_core::{signable_bytes, signing, AuthHeader, Clock, Identity};

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::guard::ReplayGuard;

/// The parts of an incoming request the verifier looks at.
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    pub method: &'a str,
    /// URL exactly as received.
    pub url: &'a str,
    /// `Authorization` header value.
    pub authorization: &'a str,
    /// Digest of the received body; empty when there is no body.
    pub content_digest: &'a str,
}

/// A request that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    /// Verified signer.
    pub kid: Identity,
    /// Request timestamp (Unix ms).
    pub timestamp: i64,
}

/// Verify a request signed by `expected`.
///
/// Checks run in order: header shape, signer identity, signature over the
/// literal method/url/digest, timestamp window, then the replay guard. The
/// nonce is only recorded once everything else has passed.
pub async fn check_authorization(
    req: &AuthRequest<'_>,
    expected: &Identity,
    guard: &dyn ReplayGuard,
    now: i64,
    config: &AuthConfig,
) -> Result<AuthResult> {
    let header = AuthHeader::parse(req.authorization).map_err(|e| {
        tracing::warn!(error = %e, "rejecting request: malformed authorization header");
        AuthError::from(e)
    })?;

    if header.kid != expected.as_str() {
        tracing::warn!(kid = %header.kid, expected = %expected, "rejecting request: unexpected kid");
        return Err(AuthError::InvalidKid);
    }

    let bytes = signable_bytes(req.method, req.url, req.content_digest);
    header
        .decode_signature()
        .and_then(|sig| signing::verify(&bytes, &sig, expected))
        .map_err(|_| reject(expected, "bad signature"))?;

    let url = Url::parse(req.url).map_err(|_| reject(expected, "unparseable url"))?;
    let mut nonce = None;
    let mut ts = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            signing::NONCE_PARAM => nonce = Some(v.into_owned()),
            signing::TS_PARAM => ts = Some(v.into_owned()),
            _ => {}
        }
    }
    let nonce = nonce
        .filter(|n| !n.is_empty())
        .ok_or_else(|| reject(expected, "missing nonce"))?;
    let timestamp: i64 = ts
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| reject(expected, "missing or invalid ts"))?;

    let skew = config.max_clock_skew.as_millis() as u64;
    if now.abs_diff(timestamp) > skew {
        tracing::warn!(kid = %expected, timestamp, now, "rejecting request: timestamp outside skew window");
        return Err(AuthError::VerifyFailed);
    }

    if guard
        .check_and_set(expected.as_str(), &nonce, config.nonce_ttl)
        .await?
    {
        tracing::warn!(kid = %expected, nonce = %nonce, "rejecting request: nonce replay");
        return Err(AuthError::VerifyFailed);
    }

    Ok(AuthResult {
        kid: expected.clone(),
        timestamp,
    })
}

fn reject(kid: &Identity, reason: &'static str) -> AuthError {
    tracing::warn!(kid = %kid, reason, "rejecting request");
    AuthError::VerifyFailed
}

/// A verifier bundling its replay guard, clock and settings.
#[derive(Clone)]
pub struct Authenticator {
    guard: Arc<dyn ReplayGuard>,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
}

impl Authenticator {
    /// Create a verifier. Fails if `config` does not validate.
    pub fn new(guard: Arc<dyn ReplayGuard>, clock: Arc<dyn Clock>, config: AuthConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { guard, clock, config })
    }

    /// Verifier with the default settings.
    pub fn with_defaults(guard: Arc<dyn ReplayGuard>, clock: Arc<dyn Clock>) -> Self {
        Self {
            guard,
            clock,
            config: AuthConfig::default(),
        }
    }

    /// Verify a request against the clock's current time.
    pub async fn check(&self, req: &AuthRequest<'_>, expected: &Identity) -> Result<AuthResult> {
        let now = self.clock.now_millis();
        check_authorization(req, expected, self.guard.as_ref(), now, &self.config).await
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("clock", &self.clock)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::MemoryReplayGuard;
    use crate::request::{new_request, new_request_with_nonce, SignedRequest};
    use bytes::Bytes;
    use std::time::Duration;
    use vaultsync_core::{content_digest, Keypair, Nonce, TestClock};

    struct Fixture {
        clock: Arc<TestClock>,
        guard: MemoryReplayGuard,
        alice: Keypair,
        bob: Keypair,
        config: AuthConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let clock = Arc::new(TestClock::new());
            Self {
                guard: MemoryReplayGuard::with_clock(clock.clone()),
                clock,
                alice: Keypair::from_seed(&[0x01; 32]),
                bob: Keypair::from_seed(&[0x02; 32]),
                config: AuthConfig::default(),
            }
        }

        fn sign(&self, method: &str, url: &str, body: &[u8]) -> SignedRequest {
            let digest = content_digest(body);
            new_request(
                method,
                url,
                Bytes::copy_from_slice(body),
                &digest,
                self.clock.now_millis(),
                &self.alice,
            )
            .unwrap()
        }

        async fn check(
            &self,
            method: &str,
            url: &str,
            authorization: &str,
            digest: &str,
            expected: &Identity,
        ) -> Result<AuthResult> {
            let req = AuthRequest {
                method,
                url,
                authorization,
                content_digest: digest,
            };
            check_authorization(&req, expected, &self.guard, self.clock.now_millis(), &self.config)
                .await
        }
    }

    #[tokio::test]
    async fn test_check_authorization_and_replay() {
        let fx = Fixture::new();
        let alice = fx.alice.identity();
        let url = format!("https://keys.pub/vault/{}?idx=123", alice);
        let req = fx.sign("GET", &url, b"");

        let expected_prefix = format!("https://keys.pub/vault/{}?idx=123&nonce=", alice);
        assert!(req.url.starts_with(&expected_prefix));
        assert!(req.url.ends_with("&ts=1234567890001"));

        let result = fx
            .check("GET", &req.url, &req.authorization, "", &alice)
            .await
            .unwrap();
        assert_eq!(result.kid, alice);
        assert_eq!(result.timestamp, 1234567890001);

        // Same request again
        let err = fx
            .check("GET", &req.url, &req.authorization, "", &alice)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::VerifyFailed);
        assert_eq!(err.to_string(), "verify failed");
    }

    #[tokio::test]
    async fn test_method_change_fails() {
        let fx = Fixture::new();
        let alice = fx.alice.identity();
        let req = fx.sign("GET", "https://keys.pub/test", b"");

        let err = fx
            .check("HEAD", &req.url, &req.authorization, "", &alice)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::VerifyFailed);
    }

    #[tokio::test]
    async fn test_reordered_params_fail() {
        let fx = Fixture::new();
        let alice = fx.alice.identity();
        let nonce = Nonce::from_bytes([0x03; 32]);
        let req = new_request_with_nonce(
            "GET",
            "https://keys.pub/vault/x?idx=123",
            Bytes::new(),
            "",
            fx.clock.now_millis(),
            &nonce,
            &fx.alice,
        )
        .unwrap();

        let reordered = format!(
            "https://keys.pub/vault/x?nonce={}&idx=123&ts=1234567890001",
            nonce.encode()
        );
        let err = fx
            .check("GET", &reordered, &req.authorization, "", &alice)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::VerifyFailed);

        // The nonce was not consumed by the failed attempt
        fx.check("GET", &req.url, &req.authorization, "", &alice)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_kid_fails_before_signature() {
        let fx = Fixture::new();
        let req = fx.sign("GET", "https://keys.pub/test", b"");

        let err = fx
            .check("GET", &req.url, &req.authorization, "", &fx.bob.identity())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidKid);
        assert_eq!(err.to_string(), "invalid kid");

        // Garbage signature still reports the kid mismatch
        let forged = format!("{}:not-a-signature", fx.alice.identity());
        let err = fx
            .check("GET", &req.url, &forged, "", &fx.bob.identity())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidKid);
    }

    #[tokio::test]
    async fn test_content_digest_binding() {
        let fx = Fixture::new();
        let alice = fx.alice.identity();
        let body = br#"{"test": 1}"#;
        let req = fx.sign("POST", "https://keys.pub/vault/x", body);

        let err = fx
            .check("POST", &req.url, &req.authorization, &content_digest(b"invalid"), &alice)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::VerifyFailed);

        fx.check("POST", &req.url, &req.authorization, &req.content_digest, &alice)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_timestamp_outside_window() {
        let fx = Fixture::new();
        let alice = fx.alice.identity();
        let req = fx.sign("GET", "https://keys.pub/test", b"");

        fx.clock.advance(Duration::from_secs(31 * 60));
        let err = fx
            .check("GET", &req.url, &req.authorization, "", &alice)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::VerifyFailed);
        assert!(fx.guard.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_header() {
        let fx = Fixture::new();
        let alice = fx.alice.identity();
        let req = fx.sign("GET", "https://keys.pub/test", b"");

        let err = fx
            .check("GET", &req.url, "no-separator", "", &alice)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidHeader(_)));
    }

    #[tokio::test]
    async fn test_missing_nonce_fails() {
        let fx = Fixture::new();
        let alice = fx.alice.identity();

        // Signed, but without the nonce/ts the codec would add
        let url = "https://keys.pub/test?ts=1234567890001";
        let sig = fx.alice.sign(&signable_bytes("GET", url, ""));
        let header = AuthHeader::new(&alice, &sig).to_string();

        let err = fx.check("GET", url, &header, "", &alice).await.unwrap_err();
        assert_eq!(err, AuthError::VerifyFailed);
    }

    #[tokio::test]
    async fn test_authenticator_rejects_bad_config() {
        let config = AuthConfig {
            max_clock_skew: Duration::from_secs(60),
            nonce_ttl: Duration::from_secs(1),
        };
        let result = Authenticator::new(
            Arc::new(MemoryReplayGuard::new()),
            Arc::new(TestClock::new()),
            config,
        );
        assert!(matches!(result, Err(AuthError::InvalidConfig(_))));
    }
}
