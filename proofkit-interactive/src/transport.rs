//! Live-channel transport interface.
//!
//! The real-time transport (its framing, reconnection and multiplexing) is
//! an external collaborator. The orchestrator consumes it through two
//! traits: a connector that opens one connection per candidate address, and
//! the connection itself, which must complete a signed handshake before it
//! delivers anything.
//!
//! The transport's "(bytes, ack callback)" event contract is converted to a
//! typed channel value: each [`InboundDelivery`] carries a oneshot sender
//! that must receive exactly one [`AckOutcome`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use proofkit_lib::{Identity, ProofkitError, Result};

use crate::HANDSHAKE_ROLE;

/// One candidate network address of a discovered peer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeerAddress {
    pub host: String,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse a `host:port` string.
    pub fn parse(text: &str) -> Result<Self> {
        let (host, port) = text
            .rsplit_once(':')
            .ok_or_else(|| ProofkitError::validation(format!("address {text:?} has no port")))?;
        if host.is_empty() {
            return Err(ProofkitError::validation(format!(
                "address {text:?} has no host"
            )));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| ProofkitError::validation(format!("invalid port in {text:?}")))?;
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The fields covered by the handshake signature.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthPayload {
    /// Signing time, milliseconds.
    pub timestamp: u64,
    /// The peer this channel was opened to.
    pub peer: String,
    /// Caller display name or origin.
    pub origin: String,
}

/// The signed handshake presented before a connection is trusted.
#[derive(Clone, Debug)]
pub struct HandshakeAuth {
    /// Role tag; always [`HANDSHAKE_ROLE`] for this side.
    pub role: String,
    /// Lowercase hex of the presenting identity's signing public key.
    pub public_identity: String,
    /// Serialized [`AuthPayload`] the signature covers.
    pub payload: Vec<u8>,
    /// Detached signature over `payload`.
    pub signature: Vec<u8>,
}

impl HandshakeAuth {
    /// Sign a fresh handshake for `peer` with the local identity.
    pub fn sign(identity: &Identity, peer: &str, origin: &str) -> Result<Self> {
        let payload = serde_json::to_vec(&AuthPayload {
            timestamp: proofkit_lib::now_millis(),
            peer: peer.to_string(),
            origin: origin.to_string(),
        })?;
        let signature = identity.sign(&payload)?;
        Ok(Self {
            role: HANDSHAKE_ROLE.to_string(),
            public_identity: identity.public_key_hex(),
            payload,
            signature: signature.to_vec(),
        })
    }

    /// Verify the signature against the presented public identity.
    pub fn verify(&self) -> Result<()> {
        let key = hex::decode(&self.public_identity)
            .map_err(|e| ProofkitError::validation(format!("invalid identity hex: {e}")))?;
        let identity = Identity::from_public_bytes(&key)?;
        identity.verify(&self.signature, &self.payload)
    }

    /// The decoded payload fields.
    pub fn payload_fields(&self) -> Result<AuthPayload> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Result of processing one inbound delivery, reported back to the
/// transport in place of its acknowledgement callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AckOutcome {
    /// The response decrypted, authenticated and resolved its exchange.
    Accepted,
    /// The delivery was rejected; the reason travels back to the sender.
    Failed(String),
}

/// One encrypted response pushed over a live connection.
pub struct InboundDelivery {
    /// The encrypted response buffer.
    pub payload: Vec<u8>,
    /// Must receive exactly one outcome; dropping it reads as failure.
    pub ack: oneshot::Sender<AckOutcome>,
}

impl InboundDelivery {
    /// A delivery plus the receiver its outcome will arrive on.
    pub fn new(payload: Vec<u8>) -> (Self, oneshot::Receiver<AckOutcome>) {
        let (ack, outcome) = oneshot::channel();
        (Self { payload, ack }, outcome)
    }
}

impl fmt::Debug for InboundDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundDelivery")
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Opens live connections, one per candidate address.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Open a transport connection to one candidate address of `peer`.
    async fn connect(&self, peer: &str, address: &PeerAddress) -> Result<Box<dyn LiveConnection>>;
}

/// One live connection to a peer.
#[async_trait]
pub trait LiveConnection: Send {
    /// Present the signed handshake. The connection must not deliver
    /// events until this has succeeded.
    async fn authenticate(&mut self, auth: HandshakeAuth) -> Result<()>;

    /// The next inbound delivery; `None` once the peer closes the channel.
    async fn next_delivery(&mut self) -> Result<Option<InboundDelivery>>;

    /// Tear the connection down.
    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_address_parse() {
        let address = PeerAddress::parse("192.168.1.20:4533").unwrap();
        assert_eq!(address.host, "192.168.1.20");
        assert_eq!(address.port, 4533);
        assert_eq!(address.to_string(), "192.168.1.20:4533");

        assert!(PeerAddress::parse("nohost").is_err());
        assert!(PeerAddress::parse(":80").is_err());
        assert!(PeerAddress::parse("host:notaport").is_err());
    }

    #[test]
    fn test_handshake_signs_and_verifies() {
        let identity = Identity::generate();
        let auth = HandshakeAuth::sign(&identity, "holder-device", "example.org").unwrap();

        assert_eq!(auth.role, HANDSHAKE_ROLE);
        auth.verify().unwrap();

        let fields = auth.payload_fields().unwrap();
        assert_eq!(fields.peer, "holder-device");
        assert_eq!(fields.origin, "example.org");
    }

    #[test]
    fn test_tampered_handshake_fails() {
        let identity = Identity::generate();
        let mut auth = HandshakeAuth::sign(&identity, "peer", "origin").unwrap();
        auth.payload[0] ^= 0x01;
        assert!(auth.verify().is_err());

        // Presenting someone else's key fails too.
        let mut auth = HandshakeAuth::sign(&identity, "peer", "origin").unwrap();
        auth.public_identity = Identity::generate().public_key_hex();
        assert!(auth.verify().is_err());
    }
}
