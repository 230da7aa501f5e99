//! Proofkit core library.
//!
//! This crate implements the protocol half of an out-of-band proof exchange:
//! a requester (typically a web origin) asks a holder device for a
//! cryptographically bound proof without any pre-existing network
//! relationship. The request travels as a scannable code; the signed and
//! encrypted answer comes back either through the same out-of-band channel
//! (file or clipboard) or over an ad-hoc live connection managed by
//! `proofkit-interactive`.
//!
//! # What lives here
//!
//! - [`identity`]: Ed25519 signing identities with a derived X25519
//!   key-exchange pair.
//! - [`wire`]: the compact binary request/response buffers.
//! - [`envelope`]: signed request buffers and encrypted response buffers,
//!   including the double-authenticated accept path.
//! - [`registry`] and [`handle`]: correlation registries keyed by request id
//!   with awaitable pending-result handles.
//! - [`codes`]: scannable-code payloads and the manual hex transfer form.
//!
//! The crate stays transport-agnostic: discovery and live channels are the
//! interactive crate's concern.

pub mod codes;
pub mod envelope;
pub mod errors;
pub mod handle;
pub mod identity;
pub mod query;
pub mod registry;
pub mod request;
pub mod request_id;
pub mod response;
pub mod wire;

pub use codes::{RasterImage, RenderConfig, ScannableCode, ScannedPayload};
pub use errors::ProofkitError;
pub use handle::ProofHandle;
pub use identity::Identity;
pub use query::{Query, QueryConstraints, QueryOptions};
pub use registry::Registries;
pub use request::Request;
pub use request_id::RequestId;
pub use response::{
    PassportBundle, PassportBundleOptions, ProofArtifact, ProofInputsBundle, Response,
    ResponseData,
};

/// Common result alias for proofkit operations.
pub type Result<T> = std::result::Result<T, ProofkitError>;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
