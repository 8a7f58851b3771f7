//! Replay guard: the record of nonces already accepted.
//!
//! The verifier consults the guard once per request, after the signature and
//! timestamp check out. Implementations must make check-and-set atomic so
//! two concurrent requests carrying the same nonce cannot both pass.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vaultsync_core::{Clock, SystemClock};

use crate::error::{AuthError, Result};

/// Shared store of consumed nonces.
#[async_trait]
pub trait ReplayGuard: Send + Sync {
    /// Record `nonce` under `scope` for `ttl`.
    ///
    /// Returns `true` if the nonce was already present (a replay), in which
    /// case nothing is written.
    async fn check_and_set(&self, scope: &str, nonce: &str, ttl: Duration) -> Result<bool>;
}

/// In-process replay guard with per-entry expiry.
#[derive(Debug)]
pub struct MemoryReplayGuard {
    entries: Mutex<HashMap<(String, String), i64>>,
    clock: Arc<dyn Clock>,
}

impl MemoryReplayGuard {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Guard that expires entries against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now_millis();
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|&&expires| expires > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryReplayGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplayGuard for MemoryReplayGuard {
    async fn check_and_set(&self, scope: &str, nonce: &str, ttl: Duration) -> Result<bool> {
        let now = self.clock.now_millis();
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| AuthError::ReplayGuard(format!("lock poisoned: {}", e)))?;

        entries.retain(|_, expires| *expires > now);

        let key = (scope.to_string(), nonce.to_string());
        if entries.contains_key(&key) {
            return Ok(true);
        }
        entries.insert(key, now.saturating_add(ttl.as_millis() as i64));
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultsync_core::TestClock;

    #[tokio::test]
    async fn test_check_and_set() {
        let guard = MemoryReplayGuard::with_clock(Arc::new(TestClock::new()));
        let ttl = Duration::from_secs(60);

        assert!(!guard.check_and_set("kid1", "n1", ttl).await.unwrap());
        assert!(guard.check_and_set("kid1", "n1", ttl).await.unwrap());

        // Scoped by signer
        assert!(!guard.check_and_set("kid2", "n1", ttl).await.unwrap());
        assert_eq!(guard.len(), 2);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let clock = Arc::new(TestClock::new());
        let guard = MemoryReplayGuard::with_clock(clock.clone());
        let ttl = Duration::from_secs(60);

        assert!(!guard.check_and_set("kid", "n", ttl).await.unwrap());
        clock.advance(Duration::from_secs(61));
        assert!(!guard.check_and_set("kid", "n", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_replays_admit_one() {
        let guard = Arc::new(MemoryReplayGuard::new());
        let ttl = Duration::from_secs(60);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let guard = guard.clone();
                tokio::spawn(async move { guard.check_and_set("kid", "same", ttl).await })
            })
            .collect();

        let mut fresh = 0;
        for handle in handles {
            if !handle.await.unwrap().unwrap() {
                fresh += 1;
            }
        }
        assert_eq!(fresh, 1);
    }
}
