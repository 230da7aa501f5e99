//! Identity and key derivation.
//!
//! An identity is an Ed25519 signing keypair plus an X25519 key-exchange
//! keypair derived deterministically from it: the exchange secret is the
//! clamped Ed25519 scalar, the exchange public key is the montgomery form of
//! the verifying key. Both halves therefore agree on every shared secret
//! without any extra key distribution, and a public-only identity (rebuilt
//! from 32 public key bytes on the wire) can still be encrypted to.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{PublicKey as ExchangePublic, StaticSecret};

use crate::errors::ProofkitError;
use crate::Result;

/// Length of a raw public or secret key, in bytes.
pub const KEY_LENGTH: usize = 32;

/// Length of a detached Ed25519 signature, in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Domain label mixed into every derived shared secret.
const SHARED_SECRET_INFO: &[u8] = b"proofkit-shared-secret-v1";

/// One participant's keys.
///
/// A private identity carries both keypairs and can sign and decrypt; a
/// public-only identity carries just the public halves and can verify and
/// be encrypted to.
#[derive(Clone)]
pub struct Identity {
    signing: Option<SigningKey>,
    verifying: VerifyingKey,
    exchange_secret: Option<StaticSecret>,
    exchange_public: ExchangePublic,
}

impl Identity {
    /// Generate a new random private identity.
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(signing)
            .expect("a freshly generated signing key always derives consistently")
    }

    /// Rebuild a private identity from a 32-byte signing secret key.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let seed: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| {
            ProofkitError::InvalidKeyMaterial(format!(
                "signing key must be {KEY_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        Self::from_signing_key(SigningKey::from_bytes(&seed))
    }

    /// Build a public-only identity from a 32-byte signing public key.
    pub fn from_public_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| {
            ProofkitError::InvalidKeyMaterial(format!(
                "public key must be {KEY_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        let verifying = VerifyingKey::from_bytes(&raw).map_err(|_| {
            ProofkitError::InvalidKeyMaterial("public key is not a valid curve point".into())
        })?;
        let exchange_public = ExchangePublic::from(verifying.to_montgomery().to_bytes());
        Ok(Self {
            signing: None,
            verifying,
            exchange_secret: None,
            exchange_public,
        })
    }

    fn from_signing_key(signing: SigningKey) -> Result<Self> {
        let verifying = signing.verifying_key();
        let exchange_secret = StaticSecret::from(signing.to_scalar_bytes());
        let exchange_public = ExchangePublic::from(&exchange_secret);
        // Both halves must agree: the exchange public key recomputed from
        // the secret has to equal the montgomery form of the verifying key.
        if exchange_public.as_bytes() != &verifying.to_montgomery().to_bytes() {
            return Err(ProofkitError::InvalidKeyMaterial(
                "key-exchange derivation round-trip mismatch".into(),
            ));
        }
        Ok(Self {
            signing: Some(signing),
            verifying,
            exchange_secret: Some(exchange_secret),
            exchange_public,
        })
    }

    /// Whether this identity carries its private halves.
    pub fn is_private(&self) -> bool {
        self.signing.is_some()
    }

    /// The public halves only. A no-op clone for an already-public identity.
    pub fn to_public(&self) -> Identity {
        Identity {
            signing: None,
            verifying: self.verifying,
            exchange_secret: None,
            exchange_public: self.exchange_public,
        }
    }

    /// Raw signing public key bytes.
    pub fn public_key_bytes(&self) -> [u8; KEY_LENGTH] {
        self.verifying.to_bytes()
    }

    /// Lowercase hex of the signing public key; the own-key registry key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    /// Raw key-exchange public key bytes.
    pub fn exchange_public_bytes(&self) -> [u8; KEY_LENGTH] {
        *self.exchange_public.as_bytes()
    }

    /// Sign a message with the private signing key.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; SIGNATURE_LENGTH]> {
        let signing = self.signing.as_ref().ok_or_else(|| {
            ProofkitError::InvalidKeyMaterial("a public-only identity cannot sign".into())
        })?;
        Ok(signing.sign(message).to_bytes())
    }

    /// Verify a detached signature over a message.
    pub fn verify(&self, signature: &[u8], message: &[u8]) -> Result<()> {
        let raw: [u8; SIGNATURE_LENGTH] = signature
            .try_into()
            .map_err(|_| ProofkitError::InvalidSignature)?;
        self.verifying
            .verify(message, &Signature::from_bytes(&raw))
            .map_err(|_| ProofkitError::InvalidSignature)
    }

    /// Derive the 32-byte shared secret for this identity and a peer.
    ///
    /// Deterministic for a given pair and symmetric: A's secret with B's
    /// public key equals B's secret with A's public key.
    pub fn derive_shared_secret(&self, peer: &Identity) -> Result<[u8; KEY_LENGTH]> {
        self.shared_secret_from_raw(peer.exchange_public.as_bytes())
    }

    /// Like [`derive_shared_secret`](Self::derive_shared_secret) but from a
    /// raw 32-byte key-exchange public key.
    pub fn shared_secret_from_raw(&self, peer_exchange_key: &[u8]) -> Result<[u8; KEY_LENGTH]> {
        let secret = self.exchange_secret.as_ref().ok_or_else(|| {
            ProofkitError::InvalidKeyMaterial(
                "a public-only identity cannot derive shared secrets".into(),
            )
        })?;
        let raw: [u8; KEY_LENGTH] = peer_exchange_key.try_into().map_err(|_| {
            ProofkitError::InvalidPeerKey(format!(
                "peer key must be {KEY_LENGTH} bytes, got {}",
                peer_exchange_key.len()
            ))
        })?;
        let dh = secret.diffie_hellman(&ExchangePublic::from(raw));
        if !dh.was_contributory() {
            return Err(ProofkitError::InvalidPeerKey("low-order peer key".into()));
        }
        let hk = Hkdf::<Sha256>::new(None, dh.as_bytes());
        let mut out = [0u8; KEY_LENGTH];
        hk.expand(SHARED_SECRET_INFO, &mut out)
            .map_err(|e| ProofkitError::InvalidPeerKey(e.to_string()))?;
        Ok(out)
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.verifying == other.verifying
    }
}

impl Eq for Identity {}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("public_key", &self.public_key_hex())
            .field("private", &self.is_private())
            .finish()
    }
}
