//! The [`Object`] trait: interactive pieces of data & behavior.
//!
//! Every location of a [`Patch`](crate::patch::Patch) holds at most one
//! boxed `Object`. The trait is the full contract between the core and the
//! catalog of concrete behaviors (numbers, timers, input simulators, ...)
//! which live outside this crate: the core only ever clones, runs, queries,
//! and notifies objects through it.
//!
//! # Capability queries
//!
//! Instead of downcasting, objects answer *what they can do*:
//!
//! - [`Object::as_pointer`]: the object forwards follow/put/take to another
//!   location (aliasing).
//! - [`Object::as_machine`]: the object is a [`Machine`] containing a
//!   sub-graph of its own.
//!
//! Both return `None` by default; concrete types opt in.

use crate::argument::Argument;
use crate::machine::Machine;
use crate::scheduler::Context;
use crate::types::{ConnectionId, LocationId};

/// A polymorphic behavior/data unit held by a location.
///
/// All hook methods default to no-ops so simple value-like objects only
/// implement [`kind`](Object::kind), [`clone_object`](Object::clone_object)
/// and whatever protocol they speak (text, run, args).
///
/// # Hooks and re-entrancy
///
/// While a hook runs, the object is temporarily detached from its location,
/// so `ctx.patch` never aliases `self`. A hook may freely mutate the rest of
/// the graph and schedule further tasks; if it replaces the object at its own
/// location, the detached instance is dropped when the hook returns.
pub trait Object: Send {
    /// Short type label, used in logs and descriptions.
    fn kind(&self) -> &'static str;

    /// Create an independent copy of this object.
    ///
    /// The copy must not share mutable state with the original; prototypes
    /// are cloned this way every time a location is created from them.
    /// Machines clone shallow; their children belong to the arena and are
    /// copied by [`Patch::duplicate`](crate::patch::Patch::duplicate).
    fn clone_object(&self) -> Box<dyn Object>;

    /// The object has been placed into (or moved to) a new location.
    fn relocate(&mut self, _here: LocationId) {}

    /// Execute this object's behavior.
    fn run(&mut self, _here: LocationId, _ctx: &mut Context<'_>) {}

    /// Enumerate the arguments this object declares.
    fn args(&self, _visit: &mut dyn FnMut(&Argument)) {}

    /// Plain-text rendering of the object's value.
    fn get_text(&self) -> String {
        String::new()
    }

    /// Update the object's value from text.
    ///
    /// `here` is the location to attach conversion faults to.
    fn set_text(&mut self, _here: LocationId, _ctx: &mut Context<'_>, _text: &str) {}

    /// Pointer capability: objects that alias another location return a view.
    fn as_pointer(&self) -> Option<&dyn Pointer> {
        None
    }

    /// Mutable pointer capability.
    fn as_pointer_mut(&mut self) -> Option<&mut dyn Pointer> {
        None
    }

    /// Machine capability: objects that contain a sub-graph return a view.
    fn as_machine(&self) -> Option<&Machine> {
        None
    }

    /// Mutable machine capability.
    fn as_machine_mut(&mut self) -> Option<&mut Machine> {
        None
    }

    /// A connection was just registered on this object's location.
    fn connection_added(
        &mut self,
        _here: LocationId,
        _label: &str,
        _connection: ConnectionId,
        _ctx: &mut Context<'_>,
    ) {
    }

    /// An observed location announced a value change.
    fn updated(&mut self, _here: LocationId, _updated: LocationId, _ctx: &mut Context<'_>) {}

    /// An observed location (or a child, for machines) recorded a fault.
    fn errored(&mut self, _here: LocationId, _errored: LocationId, _ctx: &mut Context<'_>) {}

    /// Dump the object's value for persistence. The format of the value is a
    /// collaborator concern; `Null` means "nothing to save".
    fn serialize_state(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Restore the object's value from a previous
    /// [`serialize_state`](Object::serialize_state) dump.
    fn deserialize_state(&mut self, _here: LocationId, _state: serde_json::Value) {}
}

/// View of a pointer-like object.
///
/// A pointer-capable object makes its location behave as an alias: follow,
/// put, take and text access are forwarded to the pointee (see
/// [`Patch::follow`](crate::patch::Patch::follow)).
pub trait Pointer {
    /// The location this pointer currently refers to, if any.
    fn pointee(&self) -> Option<LocationId>;

    /// Redirect the pointer.
    fn set_pointee(&mut self, target: Option<LocationId>);
}
