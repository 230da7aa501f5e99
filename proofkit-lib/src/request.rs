//! Requests for proofs.

use crate::errors::ProofkitError;
use crate::identity::Identity;
use crate::query::Query;
use crate::registry::Registries;
use crate::request_id::RequestId;
use crate::Result;

/// One request for a proof.
///
/// A request is either newly originated — the signing identity is available
/// and the request is registered in the issued-request registry — or rebuilt
/// from the wire with a public identity only. The id is always derived from
/// the requester key and creation time, never supplied by a caller.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    /// Public half of the requester's identity.
    pub identity: Identity,
    /// Creation time, milliseconds.
    pub timestamp_millis: u64,
    /// What is being asked for.
    pub query: Query,
    id: RequestId,
}

impl Request {
    /// Originate a new request with a private identity.
    ///
    /// Registers the identity in the own-key registry (so the eventual
    /// encrypted response can find its private key) and the request — with
    /// its exact encoded bytes — in the issued-request registry.
    pub fn originate(
        registries: &Registries,
        identity: &Identity,
        query: Query,
    ) -> Result<Request> {
        if !identity.is_private() {
            return Err(ProofkitError::InvalidKeyMaterial(
                "originating a request needs a private identity".into(),
            ));
        }
        query.validate()?;

        let timestamp_millis = crate::now_millis();
        let id = RequestId::mint(&identity.public_key_bytes(), timestamp_millis)?;
        let request = Request {
            identity: identity.to_public(),
            timestamp_millis,
            query,
            id,
        };

        registries.keys().adopt(identity.clone());
        registries.requests().register(&request)?;
        Ok(request)
    }

    /// Rebuild a wire-side request from its id and query. The public
    /// identity and timestamp come out of the id itself.
    pub(crate) fn from_wire(id: RequestId, query: Query) -> Result<Self> {
        let identity = Identity::from_public_bytes(&id.public_key_bytes()).map_err(|_| {
            ProofkitError::MalformedWireData("embedded public key is not a curve point".into())
        })?;
        Ok(Self {
            identity,
            timestamp_millis: id.timestamp_millis(),
            query,
            id,
        })
    }

    /// The correlation id.
    pub fn id(&self) -> RequestId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_originate_registers_everything() {
        let registries = Registries::new(Duration::from_secs(900));
        let identity = Identity::generate();

        let request = Request::originate(
            &registries,
            &identity,
            Query::Dummy {
                marker: "abc".into(),
            },
        )
        .unwrap();

        assert_eq!(request.id().public_key_bytes(), identity.public_key_bytes());
        assert!(registries.keys().lookup(&identity.public_key_hex()).is_some());
        assert!(registries.requests().lookup(&request.id()).is_some());
        assert!(!request.identity.is_private());
    }

    #[test]
    fn test_public_identity_cannot_originate() {
        let registries = Registries::new(Duration::from_secs(900));
        let public = Identity::generate().to_public();
        let result = Request::originate(&registries, &public, Query::RawPassport);
        assert!(matches!(result, Err(ProofkitError::InvalidKeyMaterial(_))));
    }

    #[test]
    fn test_invalid_query_rejected_before_registration() {
        let registries = Registries::new(Duration::from_secs(900));
        let identity = Identity::generate();
        let query = Query::Proof(crate::query::QueryConstraints {
            nationality: Some("TOOLONG".into()),
            ..Default::default()
        });

        assert!(matches!(
            Request::originate(&registries, &identity, query),
            Err(ProofkitError::Validation(_))
        ));
        assert!(registries.keys().lookup(&identity.public_key_hex()).is_none());
    }
}
