//! Verifier configuration.

use std::time::Duration;

use crate::error::{AuthError, Result};

/// Verifier settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Largest accepted difference between a request's `ts` and now.
    pub max_clock_skew: Duration,
    /// How long a seen nonce is remembered. Must cover the skew window.
    pub nonce_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_clock_skew: Duration::from_secs(30 * 60),
            nonce_ttl: Duration::from_secs(60 * 60),
        }
    }
}

impl AuthConfig {
    /// Check that a replayed request cannot outlive its nonce record.
    pub fn validate(&self) -> Result<()> {
        if self.nonce_ttl < self.max_clock_skew {
            return Err(AuthError::InvalidConfig(format!(
                "nonce_ttl {:?} is shorter than max_clock_skew {:?}",
                self.nonce_ttl, self.max_clock_skew
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        AuthConfig::default().validate().unwrap();
    }

    #[test]
    fn test_ttl_must_cover_skew() {
        let config = AuthConfig {
            max_clock_skew: Duration::from_secs(60),
            nonce_ttl: Duration::from_secs(30),
        };
        assert!(matches!(config.validate(), Err(AuthError::InvalidConfig(_))));
    }
}
