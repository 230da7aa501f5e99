//! Proofkit interactive layer.
//!
//! This crate orchestrates delivery for the core protocol in
//! `proofkit-lib`: it owns the local identity, tracks outstanding exchanges,
//! renders out-of-band codes, consumes local-network discovery events, races
//! speculative connections to every candidate address of a discovered peer,
//! authenticates each live channel with a signed handshake, and routes
//! inbound encrypted responses through the core accept path to whoever is
//! awaiting them.
//!
//! The real-time transport and the discovery protocol stay external: this
//! crate consumes them through the [`transport::LiveConnector`] and
//! [`discovery::DiscoveryEvent`] interfaces only.

use std::time::Duration;

use proofkit_lib::registry::DEFAULT_RESPONSE_GRACE;

pub mod discovery;
pub mod intent;
pub mod manager;
pub mod transport;

pub use discovery::DiscoveryEvent;
pub use intent::{DeliveryPath, IntentState};
pub use manager::ProofExchangeManager;
pub use transport::{
    AckOutcome, AuthPayload, HandshakeAuth, InboundDelivery, LiveConnection, LiveConnector,
    PeerAddress,
};

pub use proofkit_lib::{ProofkitError, Result};

/// Role tag presented during the live-channel handshake.
pub const HANDSHAKE_ROLE: &str = "SDK";

/// Configuration for a [`ProofExchangeManager`].
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Application identifier prefixed to scannable-code payloads.
    pub app_identifier: String,
    /// Display name (or origin) presented in the handshake auth payload.
    pub display_name: String,
    /// Deadline for one exchange; `None` waits until cancelled.
    pub proof_timeout: Option<Duration>,
    /// How long settled registry entries linger before eviction.
    pub response_grace: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            app_identifier: "proofkit".to_string(),
            display_name: "proofkit-sdk".to_string(),
            proof_timeout: None,
            response_grace: DEFAULT_RESPONSE_GRACE,
        }
    }
}

impl ManagerConfig {
    /// Fail fast on a malformed configuration, before any crypto or IO.
    pub fn validate(&self) -> Result<()> {
        if self.app_identifier.is_empty() {
            return Err(ProofkitError::validation("app identifier must not be empty"));
        }
        if self.display_name.is_empty() {
            return Err(ProofkitError::validation("display name must not be empty"));
        }
        if self.response_grace.is_zero() {
            return Err(ProofkitError::validation("response grace must be non-zero"));
        }
        if self.proof_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ProofkitError::validation("proof timeout must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ManagerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.response_grace, Duration::from_secs(900));
    }

    #[test]
    fn test_empty_fields_rejected() {
        let config = ManagerConfig {
            app_identifier: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ManagerConfig {
            proof_timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
