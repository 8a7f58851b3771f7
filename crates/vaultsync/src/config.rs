//! Vault configuration.

use vaultsync_sync::SyncConfig;

/// Configuration for a [`Vault`](crate::Vault).
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Remote base URL; vaults live at `{base_url}/vault/{vid}`.
    pub base_url: String,
    /// Remote call settings.
    pub sync: SyncConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            base_url: "https://keys.pub".to_string(),
            sync: SyncConfig::default(),
        }
    }
}

impl VaultConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}
