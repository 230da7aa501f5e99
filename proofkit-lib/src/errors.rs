//! Error types for proof exchanges.
//!
//! Cryptographic and wire-format failures are never silently recovered:
//! they fail the specific decode/decrypt/verify call that hit them and are
//! surfaced to its caller. Connection errors are the only recoverable class.

use thiserror::Error;

/// Comprehensive error type for proofkit operations.
#[derive(Clone, Debug, Error)]
pub enum ProofkitError {
    /// Malformed caller input, rejected before any crypto or IO.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Supplied key bytes have the wrong length or fail derivation checks,
    /// or an operation needs a private half the identity does not carry.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Signature verification failed.
    #[error("signature verification failed")]
    InvalidSignature,

    /// The peer's key-exchange key is unusable.
    #[error("invalid peer key: {0}")]
    InvalidPeerKey(String),

    /// Truncated or undecodable wire buffer.
    #[error("malformed wire data: {0}")]
    MalformedWireData(String),

    /// AEAD authentication failed. Treated as hostile or corrupt input and
    /// never retried.
    #[error("decryption failed")]
    DecryptionFailed,

    /// No private identity is registered for the requester key named in an
    /// inbound response: this device never issued that request.
    #[error("no private identity registered for {0}")]
    UnknownRecipient(String),

    /// The correlation id of an inbound response matches no issued request.
    #[error("no issued request with id {0}")]
    UnknownRequest(String),

    /// The request echoed inside a response differs from the request that
    /// was actually issued under that id.
    #[error("embedded request does not match the issued request")]
    RequestMismatch,

    /// Manual-transfer hex input has an odd number of digits.
    #[error("hex input has odd length")]
    OddLengthHex,

    /// A pending-result handle ran out its configured timeout.
    #[error("timed out waiting for a proof")]
    Timeout,

    /// A pending-result handle was cancelled before a proof arrived.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Transport-level failure. Recoverable; the orchestrator tears the
    /// affected connection down and other exchanges are untouched.
    #[error("connection error: {0}")]
    Connection(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ProofkitError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Returns true if this error is potentially recoverable by retrying.
    ///
    /// Crypto and correlation failures are final for the buffer that caused
    /// them; only transport errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<serde_json::Error> for ProofkitError {
    fn from(e: serde_json::Error) -> Self {
        ProofkitError::Serialization(e.to_string())
    }
}
