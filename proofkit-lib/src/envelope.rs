//! Signed request buffers and encrypted response buffers.
//!
//! Signed request: `signature (64) || request bytes`.
//! Encrypted response: `responder public key (32) || requester public key
//! (32) || nonce (24) || ciphertext+tag`. Both public keys ride in front so
//! the recipient can locate its own private key and recompute the shared
//! secret with no prior context.
//!
//! A response is accepted iff it decrypts under the pair-unique shared
//! secret AND echoes back, byte for byte, the exact request that was issued.
//! The AEAD tag alone is not enough: a responder holding a valid secret
//! could otherwise substitute a different query under the same id.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::errors::ProofkitError;
use crate::identity::{Identity, KEY_LENGTH, SIGNATURE_LENGTH};
use crate::registry::Registries;
use crate::request::Request;
use crate::response::Response;
use crate::wire;
use crate::Result;

/// AEAD nonce width, in bytes.
pub const NONCE_LENGTH: usize = 24;

const ENVELOPE_HEADER_LENGTH: usize = 2 * KEY_LENGTH;
const TAG_LENGTH: usize = 16;

/// Sign a request into its out-of-band buffer.
pub fn sign_request(identity: &Identity, request: &Request) -> Result<Vec<u8>> {
    let encoded = wire::encode_request(request)?;
    let signature = identity.sign(&encoded)?;

    let mut out = Vec::with_capacity(SIGNATURE_LENGTH + encoded.len());
    out.extend_from_slice(&signature);
    out.extend_from_slice(&encoded);
    Ok(out)
}

/// Verify and decode a signed request buffer.
pub fn open_signed_request(bytes: &[u8]) -> Result<Request> {
    if bytes.len() <= SIGNATURE_LENGTH {
        return Err(ProofkitError::MalformedWireData(format!(
            "signed request too short: {} bytes",
            bytes.len()
        )));
    }
    let (signature, encoded) = bytes.split_at(SIGNATURE_LENGTH);
    let request = wire::decode_request(encoded)?;
    // Self-certifying: the id embeds the requester key the signature is
    // checked against.
    request.identity.verify(signature, encoded)?;
    Ok(request)
}

/// Encrypt a response to the requester embedded in it.
pub fn encrypt_response(responder: &Identity, response: &Response) -> Result<Vec<u8>> {
    let secret = responder.derive_shared_secret(&response.request.identity)?;
    let cipher = XChaCha20Poly1305::new_from_slice(&secret)
        .map_err(|e| ProofkitError::InvalidKeyMaterial(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce);

    let plaintext = wire::encode_response(response)?;
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext.as_ref())
        .map_err(|e| ProofkitError::Serialization(format!("encryption failed: {e}")))?;

    let mut out =
        Vec::with_capacity(ENVELOPE_HEADER_LENGTH + NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&responder.public_key_bytes());
    out.extend_from_slice(&response.request.identity.public_key_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt an encrypted response buffer and authenticate the exchange.
///
/// Fails with [`ProofkitError::UnknownRecipient`] when this process never
/// issued a request under the named requester key, with
/// [`ProofkitError::DecryptionFailed`] on an AEAD tag mismatch, with
/// [`ProofkitError::UnknownRequest`] when the embedded id matches no issued
/// request, and with [`ProofkitError::RequestMismatch`] when the echoed
/// request differs from the issued one in any byte.
pub fn decrypt_response(bytes: &[u8], registries: &Registries) -> Result<Response> {
    if bytes.len() < ENVELOPE_HEADER_LENGTH + NONCE_LENGTH + TAG_LENGTH {
        return Err(ProofkitError::MalformedWireData(format!(
            "encrypted response too short: {} bytes",
            bytes.len()
        )));
    }
    let responder_key = &bytes[..KEY_LENGTH];
    let requester_key = &bytes[KEY_LENGTH..ENVELOPE_HEADER_LENGTH];

    let own = registries
        .keys()
        .lookup(&hex::encode(requester_key))
        .ok_or_else(|| ProofkitError::UnknownRecipient(hex::encode(requester_key)))?;
    let responder = Identity::from_public_bytes(responder_key).map_err(|_| {
        ProofkitError::MalformedWireData("responder public key is not a curve point".into())
    })?;

    let secret = own.derive_shared_secret(&responder)?;
    let cipher = XChaCha20Poly1305::new_from_slice(&secret)
        .map_err(|e| ProofkitError::InvalidKeyMaterial(e.to_string()))?;
    let nonce = &bytes[ENVELOPE_HEADER_LENGTH..ENVELOPE_HEADER_LENGTH + NONCE_LENGTH];
    let plaintext = cipher
        .decrypt(
            XNonce::from_slice(nonce),
            &bytes[ENVELOPE_HEADER_LENGTH + NONCE_LENGTH..],
        )
        .map_err(|_| ProofkitError::DecryptionFailed)?;

    let response = wire::decode_response(&plaintext)?;

    // Authenticate the exchange: the echoed request must be the issued one,
    // byte for byte.
    let issued = registries
        .requests()
        .lookup_bytes(&response.id())
        .ok_or_else(|| ProofkitError::UnknownRequest(response.id().to_hex()))?;
    let echoed = wire::encode_request(&response.request)?;
    if echoed != issued {
        return Err(ProofkitError::RequestMismatch);
    }

    Ok(response)
}

/// The single accept path: decrypt, authenticate, and register — resolving
/// any handle awaiting this id. Used by live-channel delivery and manual
/// import alike.
pub fn receive_response(
    bytes: &[u8],
    registries: &std::sync::Arc<Registries>,
) -> Result<Response> {
    let response = decrypt_response(bytes, registries)?;
    registries.register_response(response.clone());
    Ok(response)
}
