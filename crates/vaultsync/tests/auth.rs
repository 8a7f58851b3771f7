//! Signed requests against the reference remote.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use vaultsync::auth::{new_request, new_request_with_nonce, AuthConfig};
use vaultsync::core::{content_digest, Clock, Nonce, TestClock};
use vaultsync::sync::VaultService;
use vaultsync_testkit::seeded_keypair;

fn service() -> (Arc<TestClock>, VaultService) {
    let clock = Arc::new(TestClock::new());
    let service = VaultService::with_config(clock.clone(), AuthConfig::default()).unwrap();
    (clock, service)
}

#[tokio::test]
async fn test_replayed_request_rejected() {
    let (clock, service) = service();
    let key = seeded_keypair(1);
    let url = format!("https://keys.pub/vault/{}?idx=0", key.identity());

    let req = new_request("GET", &url, Bytes::new(), "", clock.now_millis(), &key).unwrap();
    // Vault does not exist yet, but the request is authentic
    assert_eq!(service.handle(&req).await.status, 404);

    let replay = service.handle(&req).await;
    assert_eq!(replay.status, 403);
    assert_eq!(replay.text(), "verify failed");

    // Fresh nonce, same everything else
    let req = new_request("GET", &url, Bytes::new(), "", clock.now_millis(), &key).unwrap();
    assert_eq!(service.handle(&req).await.status, 404);
}

#[tokio::test]
async fn test_wrong_signer_rejected() {
    let (clock, service) = service();
    let owner = seeded_keypair(1);
    let other = seeded_keypair(2);
    let url = format!("https://keys.pub/vault/{}", owner.identity());

    let req = new_request("DELETE", &url, Bytes::new(), "", clock.now_millis(), &other).unwrap();
    let resp = service.handle(&req).await;
    assert_eq!(resp.status, 403);
    assert_eq!(resp.text(), "invalid kid");
}

#[tokio::test]
async fn test_tampering_rejected() {
    let (clock, service) = service();
    let key = seeded_keypair(1);
    let url = format!("https://keys.pub/vault/{}?idx=5&limit=10", key.identity());
    let nonce = Nonce::from_bytes([9; 32]);

    let mut req = new_request_with_nonce("GET", &url, Bytes::new(), "", clock.now_millis(), &nonce, &key)
        .unwrap();
    req.method = "DELETE".into();
    assert_eq!(service.handle(&req).await.status, 403);

    // Reordered query: limit before idx
    let mut req = new_request_with_nonce("GET", &url, Bytes::new(), "", clock.now_millis(), &nonce, &key)
        .unwrap();
    req.url = req.url.replace("idx=5&limit=10", "limit=10&idx=5");
    assert_eq!(service.handle(&req).await.status, 403);

    // Body swapped after signing
    let body = Bytes::from_static(b"\x80");
    let post_url = format!("https://keys.pub/vault/{}", key.identity());
    let mut req = new_request(
        "POST",
        &post_url,
        body.clone(),
        &content_digest(&body),
        clock.now_millis(),
        &key,
    )
    .unwrap();
    req.body = Bytes::from_static(b"\x81\x00");
    assert_eq!(service.handle(&req).await.status, 403);
}

#[tokio::test]
async fn test_stale_request_rejected() {
    let (clock, service) = service();
    let key = seeded_keypair(1);
    let url = format!("https://keys.pub/vault/{}", key.identity());

    let req = new_request("GET", &url, Bytes::new(), "", clock.now_millis(), &key).unwrap();
    clock.advance(Duration::from_secs(31 * 60));
    assert_eq!(service.handle(&req).await.status, 403);
}

#[tokio::test]
async fn test_unknown_route() {
    let (clock, service) = service();
    let key = seeded_keypair(1);

    let req = new_request("GET", "https://keys.pub/other", Bytes::new(), "", clock.now_millis(), &key)
        .unwrap();
    assert_eq!(service.handle(&req).await.status, 404);
}
