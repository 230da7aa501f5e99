//! Correlation identifiers.
//!
//! A request id is `requester signing public key (32 bytes) || creation
//! timestamp in milliseconds (6 bytes, big-endian)`, rendered as 76 hex
//! characters. It is globally unique with overwhelming probability and
//! self-describing: a response can locate the matching shared secret from
//! the embedded public key alone.

use std::fmt;

use crate::errors::ProofkitError;
use crate::identity::KEY_LENGTH;
use crate::wire::{decode_timestamp, encode_timestamp, TIMESTAMP_LENGTH};
use crate::Result;

/// Length of a request id in bytes.
pub const REQUEST_ID_LENGTH: usize = KEY_LENGTH + TIMESTAMP_LENGTH;

/// The identifier correlating one request with its eventual response.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId([u8; REQUEST_ID_LENGTH]);

impl RequestId {
    /// Derive an id from a requester public key and a creation timestamp.
    pub fn mint(public_key: &[u8; KEY_LENGTH], timestamp_millis: u64) -> Result<Self> {
        let ts = encode_timestamp(timestamp_millis)?;
        let mut bytes = [0u8; REQUEST_ID_LENGTH];
        bytes[..KEY_LENGTH].copy_from_slice(public_key);
        bytes[KEY_LENGTH..].copy_from_slice(&ts);
        Ok(Self(bytes))
    }

    /// Parse an id from its raw 38-byte form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; REQUEST_ID_LENGTH] = bytes.try_into().map_err(|_| {
            ProofkitError::MalformedWireData(format!(
                "request id must be {REQUEST_ID_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(raw))
    }

    /// Parse an id from its 76-character hex rendering.
    pub fn from_hex(text: &str) -> Result<Self> {
        let bytes = hex::decode(text)
            .map_err(|e| ProofkitError::MalformedWireData(format!("invalid id hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// The raw 38-byte form.
    pub fn as_bytes(&self) -> &[u8; REQUEST_ID_LENGTH] {
        &self.0
    }

    /// The requester's signing public key embedded in the id.
    pub fn public_key_bytes(&self) -> [u8; KEY_LENGTH] {
        let mut out = [0u8; KEY_LENGTH];
        out.copy_from_slice(&self.0[..KEY_LENGTH]);
        out
    }

    /// The creation timestamp embedded in the id.
    pub fn timestamp_millis(&self) -> u64 {
        let mut ts = [0u8; TIMESTAMP_LENGTH];
        ts.copy_from_slice(&self.0[KEY_LENGTH..]);
        decode_timestamp(&ts)
    }

    /// The 76-character hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.to_hex())
    }
}
