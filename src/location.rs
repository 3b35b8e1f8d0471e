//! Locations: the nodes of the object graph.
//!
//! A location owns at most one [`Object`] and all of the structural metadata
//! around it: a name, a canvas position, a weak parent handle, the connection
//! multimaps, and the observer sets used for update/error propagation.
//! Locations live in the [`Patch`](crate::patch::Patch) arena; everything
//! that relates two locations (connecting, observing, error propagation) is
//! an arena operation, while this type exposes the per-node state.

use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;

use crate::errors::Fault;
use crate::object::Object;
use crate::types::{ConnectionId, LocationId, Vec2};

/// A graph node: object + structural metadata.
pub struct Location {
    id: LocationId,
    pub(crate) name: String,
    pub(crate) position: Vec2,
    pub(crate) parent: Option<LocationId>,
    pub(crate) object: Option<Box<dyn Object>>,

    // Connection multimaps, keyed by argument label. A connection id appears
    // in exactly one outgoing and one incoming map: those of its endpoints.
    pub(crate) outgoing: FxHashMap<String, Vec<ConnectionId>>,
    pub(crate) incoming: FxHashMap<String, Vec<ConnectionId>>,

    // Symmetric who-watches-whom relations. Back-references only, never
    // ownership; removal of either side cleans both.
    pub(crate) update_observers: FxHashSet<LocationId>,
    pub(crate) observing_updates: FxHashSet<LocationId>,
    pub(crate) error_observers: FxHashSet<LocationId>,
    pub(crate) observing_errors: FxHashSet<LocationId>,

    /// First fault caught by this location; kept until cleared.
    pub(crate) fault: Option<Fault>,
}

impl Location {
    pub(crate) fn new(id: LocationId, name: impl Into<String>, parent: Option<LocationId>) -> Self {
        Self {
            id,
            name: name.into(),
            position: Vec2::ZERO,
            parent,
            object: None,
            outgoing: FxHashMap::default(),
            incoming: FxHashMap::default(),
            update_observers: FxHashSet::default(),
            observing_updates: FxHashSet::default(),
            error_observers: FxHashSet::default(),
            observing_errors: FxHashSet::default(),
            fault: None,
        }
    }

    pub fn id(&self) -> LocationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    /// Weak back-reference to the location holding the owning machine.
    pub fn parent(&self) -> Option<LocationId> {
        self.parent
    }

    pub fn object(&self) -> Option<&dyn Object> {
        self.object.as_deref()
    }

    pub fn object_mut(&mut self) -> Option<&mut (dyn Object + 'static)> {
        self.object.as_deref_mut()
    }

    /// Fault currently attached to this location, if any.
    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Outgoing connections registered under `label` (possibly several).
    pub fn connections_out(&self, label: &str) -> &[ConnectionId] {
        self.outgoing.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Incoming connections registered under `label`.
    pub fn connections_in(&self, label: &str) -> &[ConnectionId] {
        self.incoming.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All outgoing connection ids, label order unspecified.
    pub fn all_connections_out(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.outgoing.values().flatten().copied()
    }

    /// All incoming connection ids, label order unspecified.
    pub fn all_connections_in(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.incoming.values().flatten().copied()
    }

    pub fn update_observers(&self) -> impl Iterator<Item = LocationId> + '_ {
        self.update_observers.iter().copied()
    }

    pub fn error_observers(&self) -> impl Iterator<Item = LocationId> + '_ {
        self.error_observers.iter().copied()
    }

    /// Loggable one-liner: object kind plus the location name when set.
    pub fn describe(&self) -> String {
        let kind = self.object.as_ref().map_or("<empty>", |o| o.kind());
        if self.name.is_empty() {
            kind.to_string()
        } else {
            format!("{kind} \"{}\"", self.name)
        }
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Location")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("object", &self.object.as_ref().map(|o| o.kind()))
            .field("parent", &self.parent)
            .field("fault", &self.fault)
            .finish_non_exhaustive()
    }
}
