//! Compact binary wire formats.
//!
//! Request buffer: `request id (38) || query`.
//! Response buffer: `responder public key (32) || timestamp (6) ||
//! (data bytes, request bytes)` with the embedded request encoded by the
//! request codec, recursively.
//!
//! Variable-size payloads go through the generic binary object serializer
//! (`bincode`); fixed-width fields are laid out by hand so the split points
//! stay stable across serializer versions.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::ProofkitError;
use crate::identity::{Identity, KEY_LENGTH};
use crate::query::Query;
use crate::request::Request;
use crate::request_id::{RequestId, REQUEST_ID_LENGTH};
use crate::response::{Response, ResponseData};
use crate::Result;

/// Width of an encoded timestamp, in bytes.
pub const TIMESTAMP_LENGTH: usize = 6;

/// Largest encodable timestamp (48-bit unsigned milliseconds).
pub const MAX_TIMESTAMP: u64 = (1 << 48) - 1;

const RESPONSE_HEADER_LENGTH: usize = KEY_LENGTH + TIMESTAMP_LENGTH;

/// Encode a millisecond timestamp as a fixed-width 6-byte big-endian value.
///
/// Values that do not fit 48 bits are a caller error.
pub fn encode_timestamp(millis: u64) -> Result<[u8; TIMESTAMP_LENGTH]> {
    if millis > MAX_TIMESTAMP {
        return Err(ProofkitError::Validation(format!(
            "timestamp {millis} exceeds 48 bits"
        )));
    }
    let be = millis.to_be_bytes();
    let mut out = [0u8; TIMESTAMP_LENGTH];
    out.copy_from_slice(&be[2..]);
    Ok(out)
}

/// Decode a fixed-width 6-byte big-endian timestamp.
pub fn decode_timestamp(bytes: &[u8; TIMESTAMP_LENGTH]) -> u64 {
    let mut be = [0u8; 8];
    be[2..].copy_from_slice(bytes);
    u64::from_be_bytes(be)
}

fn generic_encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| ProofkitError::Serialization(e.to_string()))
}

fn generic_decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T> {
    bincode::deserialize(bytes)
        .map_err(|e| ProofkitError::MalformedWireData(format!("undecodable {what}: {e}")))
}

/// Encode a request as `id bytes || query`.
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    let query = generic_encode(&request.query)?;
    let mut out = Vec::with_capacity(REQUEST_ID_LENGTH + query.len());
    out.extend_from_slice(request.id().as_bytes());
    out.extend_from_slice(&query);
    Ok(out)
}

/// Decode a request buffer, rebuilding the public identity and timestamp
/// from the embedded id.
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    if bytes.len() < REQUEST_ID_LENGTH {
        return Err(ProofkitError::MalformedWireData(format!(
            "request buffer too short: {} bytes",
            bytes.len()
        )));
    }
    let id = RequestId::from_bytes(&bytes[..REQUEST_ID_LENGTH])?;
    // The id must survive recomputation from its own parts; an id is always
    // derived, never carried independently.
    let reminted = RequestId::mint(&id.public_key_bytes(), id.timestamp_millis())
        .map_err(|e| ProofkitError::MalformedWireData(e.to_string()))?;
    if reminted != id {
        return Err(ProofkitError::MalformedWireData(
            "request id fails recomputation".into(),
        ));
    }
    let query: Query = generic_decode(&bytes[REQUEST_ID_LENGTH..], "query")?;
    Request::from_wire(id, query)
}

/// Encode a response as `responder key || timestamp || (data, request)`.
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    let data = generic_encode(&response.data)?;
    let request = encode_request(&response.request)?;
    let body = generic_encode(&(data, request))?;

    let mut out = Vec::with_capacity(RESPONSE_HEADER_LENGTH + body.len());
    out.extend_from_slice(&response.identity.public_key_bytes());
    out.extend_from_slice(&encode_timestamp(response.timestamp_millis)?);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a response buffer, recursively decoding the embedded request.
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    if bytes.len() < RESPONSE_HEADER_LENGTH {
        return Err(ProofkitError::MalformedWireData(format!(
            "response buffer too short: {} bytes",
            bytes.len()
        )));
    }
    let identity = Identity::from_public_bytes(&bytes[..KEY_LENGTH]).map_err(|_| {
        ProofkitError::MalformedWireData("responder public key is not a curve point".into())
    })?;
    let mut ts = [0u8; TIMESTAMP_LENGTH];
    ts.copy_from_slice(&bytes[KEY_LENGTH..RESPONSE_HEADER_LENGTH]);
    let timestamp_millis = decode_timestamp(&ts);

    let (data, request): (Vec<u8>, Vec<u8>) =
        generic_decode(&bytes[RESPONSE_HEADER_LENGTH..], "response body")?;
    let request = decode_request(&request)?;
    let data: ResponseData = generic_decode(&data, "response data")?;

    Ok(Response::from_wire(identity, timestamp_millis, data, request))
}
