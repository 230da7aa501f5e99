//! Responses and the proof artifacts they carry.
//!
//! `ResponseData` mirrors the query tags variant for variant; the payloads
//! themselves stay opaque typed blobs — what a data group or a proof means
//! is the consuming application's business.

use serde::{Deserialize, Serialize};

use crate::errors::ProofkitError;
use crate::identity::Identity;
use crate::request::Request;
use crate::request_id::RequestId;
use crate::Result;

/// The concrete artifact answering one query variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseData {
    RawPassport(PassportBundle),
    ProofInputs(ProofInputsBundle),
    Proof(ProofArtifact),
    Dummy { text: String },
}

/// Raw passport data groups as read from the chip.
///
/// `dg1` (the MRZ) and `sod` (the document security object) are mandatory;
/// the biometric groups dg3 and dg4 are unsupported and have no fields here
/// ([`PassportBundleOptions`] rejects them outright).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassportBundle {
    pub dg1: Vec<u8>,
    pub sod: Vec<u8>,
    pub com: Option<Vec<u8>>,
    pub dg2: Option<Vec<u8>>,
    pub dg7: Option<Vec<u8>>,
    pub dg11: Option<Vec<u8>>,
    pub dg12: Option<Vec<u8>>,
    pub dg14: Option<Vec<u8>>,
    pub dg15: Option<Vec<u8>>,
}

/// Externally supplied data groups, before validation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PassportBundleOptions {
    #[serde(default)]
    pub dg1: Option<Vec<u8>>,
    #[serde(default)]
    pub sod: Option<Vec<u8>>,
    #[serde(default)]
    pub com: Option<Vec<u8>>,
    #[serde(default)]
    pub dg2: Option<Vec<u8>>,
    #[serde(default)]
    pub dg3: Option<Vec<u8>>,
    #[serde(default)]
    pub dg4: Option<Vec<u8>>,
    #[serde(default)]
    pub dg7: Option<Vec<u8>>,
    #[serde(default)]
    pub dg11: Option<Vec<u8>>,
    #[serde(default)]
    pub dg12: Option<Vec<u8>>,
    #[serde(default)]
    pub dg14: Option<Vec<u8>>,
    #[serde(default)]
    pub dg15: Option<Vec<u8>>,
}

impl PassportBundleOptions {
    /// Validate and build the bundle.
    pub fn build(self) -> Result<PassportBundle> {
        if self.dg3.is_some() || self.dg4.is_some() {
            return Err(ProofkitError::validation(
                "biometric data groups dg3 and dg4 are not supported",
            ));
        }
        let dg1 = self
            .dg1
            .ok_or_else(|| ProofkitError::validation("dg1 is mandatory"))?;
        let sod = self
            .sod
            .ok_or_else(|| ProofkitError::validation("sod is mandatory"))?;
        Ok(PassportBundle {
            dg1,
            sod,
            com: self.com,
            dg2: self.dg2,
            dg7: self.dg7,
            dg11: self.dg11,
            dg12: self.dg12,
            dg14: self.dg14,
            dg15: self.dg15,
        })
    }
}

/// Private circuit inputs, produced holder-side for requester-side proving.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofInputsBundle {
    pub inputs: Vec<u8>,
}

/// A finished proof and the public inputs it commits to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofArtifact {
    pub proof: Vec<u8>,
    pub public_inputs: Vec<u8>,
}

/// A holder's answer to one request.
///
/// A response is correlated by the request embedded in it; it carries no
/// independent id of its own.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    /// Public half of the responder's identity.
    pub identity: Identity,
    /// Creation time, milliseconds.
    pub timestamp_millis: u64,
    /// The proof artifact.
    pub data: ResponseData,
    /// The full request this response answers.
    pub request: Request,
}

impl Response {
    /// Build a response answering `request` with `data`.
    pub fn new(responder: &Identity, data: ResponseData, request: Request) -> Self {
        Self {
            identity: responder.to_public(),
            timestamp_millis: crate::now_millis(),
            data,
            request,
        }
    }

    pub(crate) fn from_wire(
        identity: Identity,
        timestamp_millis: u64,
        data: ResponseData,
        request: Request,
    ) -> Self {
        Self {
            identity,
            timestamp_millis,
            data,
            request,
        }
    }

    /// The correlation id: always the embedded request's id.
    pub fn id(&self) -> RequestId {
        self.request.id()
    }
}
