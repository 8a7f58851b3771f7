//! Sync engine configuration.

use std::time::Duration;

/// Configuration for sync behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum events requested per pull page.
    pub pull_limit: usize,
    /// Upper bound on each remote call.
    pub request_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            pull_limit: 1000,
            request_timeout: Duration::from_secs(30),
        }
    }
}
