//! Connections: labeled edges between two locations.
//!
//! A connection instantiates one declared argument of the `from` location's
//! object. It is registered in the `from` side's outgoing multimap and the
//! `to` side's incoming multimap under the same label; unlinking removes it
//! from both atomically (see [`Patch::disconnect`](crate::patch::Patch::disconnect)).

use serde::{Deserialize, Serialize};

use crate::types::{ConnectionId, LocationId};

/// Whether traversal through pointer-like objects continues past this edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerBehavior {
    /// Keep following pointer indirection at the target.
    #[default]
    FollowPointers,
    /// Stop at the target location itself.
    ///
    /// Chosen automatically when the argument requires a concrete type and
    /// the target already satisfies it; a local override, not a policy.
    TerminateHere,
}

/// A labeled edge between two locations, jointly owned by both endpoints.
#[derive(Debug)]
pub struct Connection {
    pub(crate) id: ConnectionId,
    /// Name of the argument this connection instantiates.
    pub(crate) label: String,
    pub(crate) from: LocationId,
    pub(crate) to: LocationId,
    pub(crate) pointer_behavior: PointerBehavior,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn from(&self) -> LocationId {
        self.from
    }

    pub fn to(&self) -> LocationId {
        self.to
    }

    pub fn pointer_behavior(&self) -> PointerBehavior {
        self.pointer_behavior
    }

    /// Whether this connection touches `loc` on either side.
    pub fn involves(&self, loc: LocationId) -> bool {
        self.from == loc || self.to == loc
    }
}
