//! Local-network discovery interface.
//!
//! Discovery itself is an external collaborator; the orchestrator only
//! consumes its callbacks, converted here to a plain event type. A peer may
//! surface several candidate addresses at once — typically one per
//! interface — and only one of them will usually answer.

use crate::transport::PeerAddress;

/// One discovery callback, as an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A peer appeared with its candidate addresses.
    PeerFound {
        name: String,
        addresses: Vec<PeerAddress>,
    },
    /// A previously found peer went away.
    PeerLost { name: String },
}
