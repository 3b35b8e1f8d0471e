//! The patch: an arena of locations and connections forming the live graph.
//!
//! All locations are owned here and addressed by stable [`LocationId`]
//! handles; parent pointers, observer sets, and machine child lists are
//! handle sets, so nothing in the graph can dangle; a stale handle just
//! fails lookup. The patch is a single logical resource: only the model
//! thread may hold `&mut Patch` (see [`crate::engine`]), which is why none
//! of these operations need locks.
//!
//! Operations that fire object hooks or schedule tasks live on
//! [`Context`](crate::scheduler::Context); the patch itself covers
//! structure: creating, placing, wiring, observing, error bookkeeping,
//! removal, and structural duplication.

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::connection::{Connection, PointerBehavior};
use crate::errors::{Fault, PatchError};
use crate::location::Location;
use crate::machine::Machine;
use crate::object::Object;
use crate::types::{ConnectionId, LocationId, Vec2};

/// The object graph arena.
///
/// A fresh patch contains a root location holding a root [`Machine`]; every
/// other location is created inside some machine with
/// [`create_in`](Patch::create_in) or [`add_in`](Patch::add_in).
pub struct Patch {
    locations: FxHashMap<LocationId, Location>,
    connections: FxHashMap<ConnectionId, Connection>,
    root: LocationId,
    next_location: u64,
    next_connection: u64,
}

impl Patch {
    /// Create a patch with a root location holding a root machine.
    #[must_use]
    pub fn new() -> Self {
        let mut patch = Self {
            locations: FxHashMap::default(),
            connections: FxHashMap::default(),
            root: LocationId(0),
            next_location: 0,
            next_connection: 0,
        };
        let root = patch.alloc_location("root", None);
        patch.root = root;
        let mut machine: Box<dyn Object> = Box::new(Machine::new("root"));
        machine.relocate(root);
        if let Some(l) = patch.locations.get_mut(&root) {
            l.object = Some(machine);
        }
        patch
    }

    /// The root location (holds the root machine).
    pub fn root(&self) -> LocationId {
        self.root
    }

    fn alloc_location(&mut self, name: impl Into<String>, parent: Option<LocationId>) -> LocationId {
        let id = LocationId(self.next_location);
        self.next_location += 1;
        self.locations.insert(id, Location::new(id, name, parent));
        id
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn contains(&self, id: LocationId) -> bool {
        self.locations.contains_key(&id)
    }

    pub fn location(&self, id: LocationId) -> Result<&Location, PatchError> {
        self.locations.get(&id).ok_or(PatchError::MissingLocation(id))
    }

    pub fn location_mut(&mut self, id: LocationId) -> Result<&mut Location, PatchError> {
        self.locations
            .get_mut(&id)
            .ok_or(PatchError::MissingLocation(id))
    }

    pub fn connection(&self, id: ConnectionId) -> Result<&Connection, PatchError> {
        self.connections
            .get(&id)
            .ok_or(PatchError::MissingConnection(id))
    }

    /// Number of live locations (including the root).
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    fn machine_mut(&mut self, loc: LocationId) -> Result<&mut Machine, PatchError> {
        let location = self.location_mut(loc)?;
        let object = location
            .object
            .as_deref_mut()
            .ok_or(PatchError::EmptyLocation(loc))?;
        object.as_machine_mut().ok_or(PatchError::NotAMachine(loc))
    }

    /// Machine view of the object at `loc`.
    pub fn machine(&self, loc: LocationId) -> Result<&Machine, PatchError> {
        let location = self.location(loc)?;
        let object = location
            .object
            .as_deref()
            .ok_or(PatchError::EmptyLocation(loc))?;
        object.as_machine().ok_or(PatchError::NotAMachine(loc))
    }

    // ------------------------------------------------------------------
    // Creation & object placement
    // ------------------------------------------------------------------

    /// Add an empty location inside the machine at `machine_loc`.
    pub fn add_in(
        &mut self,
        machine_loc: LocationId,
        name: impl Into<String>,
    ) -> Result<LocationId, PatchError> {
        self.machine_mut(machine_loc)?;
        let id = self.alloc_location(name, Some(machine_loc));
        self.machine_mut(machine_loc)?.locations.push(id);
        trace!(machine = %machine_loc, location = %id, "location added");
        Ok(id)
    }

    /// Clone `prototype` into a fresh location inside the machine at
    /// `machine_loc`. This is how graphs are built programmatically.
    pub fn create_in(
        &mut self,
        machine_loc: LocationId,
        prototype: &dyn Object,
        name: impl Into<String>,
    ) -> Result<LocationId, PatchError> {
        let id = self.add_in(machine_loc, name)?;
        self.place(id, prototype.clone_object())?;
        Ok(id)
    }

    /// Put `object` directly into `loc`, returning whatever was displaced.
    ///
    /// Fires the object's `relocate` hook and, for machines, re-parents all
    /// children to `loc` atomically.
    pub fn place(
        &mut self,
        loc: LocationId,
        mut object: Box<dyn Object>,
    ) -> Result<Option<Box<dyn Object>>, PatchError> {
        object.relocate(loc);
        let slot = &mut self.location_mut(loc)?.object;
        let displaced = slot.replace(object);
        self.rehandle(loc);
        Ok(displaced)
    }

    /// Re-point the children of a machine object at its current location.
    fn rehandle(&mut self, here: LocationId) {
        let children: Vec<LocationId> = self
            .locations
            .get(&here)
            .and_then(|l| l.object.as_deref())
            .and_then(Object::as_machine)
            .map(|m| m.locations.clone())
            .unwrap_or_default();
        for child in children {
            if let Some(l) = self.locations.get_mut(&child) {
                l.parent = Some(here);
            }
        }
    }

    /// Pointer-aware insertion: place into `loc`, or into the location its
    /// pointer chain ends at when `loc` already holds a pointer-like object.
    pub fn put(&mut self, loc: LocationId, object: Box<dyn Object>) -> Result<(), PatchError> {
        let terminal = if self.location(loc)?.object.is_none() {
            loc
        } else {
            self.follow(loc)
        };
        self.place(terminal, object)?;
        Ok(())
    }

    /// Pointer-aware removal: take the object out of `loc`, or out of the
    /// location its pointer chain ends at.
    pub fn take(&mut self, loc: LocationId) -> Result<Option<Box<dyn Object>>, PatchError> {
        self.location(loc)?;
        let terminal = self.follow(loc);
        Ok(self.location_mut(terminal)?.object.take())
    }

    /// Remove the object held directly by `loc`, without following pointers.
    /// The location itself stays in the graph.
    pub fn clear_object(&mut self, loc: LocationId) -> Result<Option<Box<dyn Object>>, PatchError> {
        Ok(self.location_mut(loc)?.object.take())
    }

    /// Resolve pointer indirection starting at `loc`.
    ///
    /// Follows pointer-capable objects until a non-pointer (or empty, or
    /// unset) location is reached. Cycles terminate at the first revisited
    /// location instead of spinning.
    pub fn follow(&self, loc: LocationId) -> LocationId {
        let mut current = loc;
        let mut seen = rustc_hash::FxHashSet::default();
        loop {
            if !seen.insert(current) {
                return current;
            }
            let next = self
                .locations
                .get(&current)
                .and_then(|l| l.object.as_deref())
                .and_then(Object::as_pointer)
                .and_then(|p| p.pointee());
            match next {
                Some(next) => current = next,
                None => return current,
            }
        }
    }

    // Raw object juggling used by Context to run hooks without aliasing the
    // object it is dispatching to.

    pub(crate) fn take_object(&mut self, loc: LocationId) -> Option<Box<dyn Object>> {
        self.locations.get_mut(&loc).and_then(|l| l.object.take())
    }

    pub(crate) fn restore_object(&mut self, loc: LocationId, object: Box<dyn Object>) {
        match self.locations.get_mut(&loc) {
            Some(l) if l.object.is_none() => l.object = Some(object),
            Some(_) => debug!(location = %loc, "object replaced itself during a hook; dropping the detached instance"),
            None => debug!(location = %loc, "location removed during a hook; dropping its object"),
        }
    }

    // ------------------------------------------------------------------
    // Text protocol
    // ------------------------------------------------------------------

    /// Text rendering of the object the pointer chain of `loc` ends at.
    pub fn get_text(&self, loc: LocationId) -> String {
        let terminal = self.follow(loc);
        self.locations
            .get(&terminal)
            .and_then(|l| l.object.as_deref())
            .map(|o| o.get_text())
            .unwrap_or_default()
    }

    /// [`get_text`](Patch::get_text) parsed as a number.
    pub fn number(&self, loc: LocationId) -> Option<f64> {
        self.get_text(loc).trim().parse().ok()
    }

    // ------------------------------------------------------------------
    // Naming & geometry
    // ------------------------------------------------------------------

    pub fn rename(&mut self, loc: LocationId, name: impl Into<String>) -> Result<(), PatchError> {
        self.location_mut(loc)?.name = name.into();
        Ok(())
    }

    pub fn set_position(&mut self, loc: LocationId, position: Vec2) -> Result<(), PatchError> {
        self.location_mut(loc)?.position = position;
        Ok(())
    }

    /// Loggable one-liner for a location (object kind + name).
    pub fn describe(&self, loc: LocationId) -> String {
        self.locations
            .get(&loc)
            .map_or_else(|| format!("<dead {loc}>"), Location::describe)
    }

    /// Visit siblings of `loc` (including `loc` itself) inside its parent
    /// machine; the first `Some` returned by the callback wins.
    pub fn nearby<R>(
        &self,
        loc: LocationId,
        mut visit: impl FnMut(&Location) -> Option<R>,
    ) -> Option<R> {
        let parent = self.locations.get(&loc)?.parent?;
        let machine = self
            .locations
            .get(&parent)
            .and_then(|l| l.object.as_deref())
            .and_then(Object::as_machine)?;
        for sibling in &machine.locations {
            if let Some(l) = self.locations.get(sibling) {
                if let Some(found) = visit(l) {
                    return Some(found);
                }
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Insert a connection into both endpoints' multimaps.
    ///
    /// This is the raw edge constructor; argument validation and the
    /// `connection_added` hook happen in
    /// [`Context::connect`](crate::scheduler::Context::connect).
    pub(crate) fn link(
        &mut self,
        from: LocationId,
        to: LocationId,
        label: &str,
        pointer_behavior: PointerBehavior,
    ) -> ConnectionId {
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.connections.insert(
            id,
            Connection {
                id,
                label: label.to_string(),
                from,
                to,
                pointer_behavior,
            },
        );
        if let Some(l) = self.locations.get_mut(&from) {
            l.outgoing.entry(label.to_string()).or_default().push(id);
        }
        if let Some(l) = self.locations.get_mut(&to) {
            l.incoming.entry(label.to_string()).or_default().push(id);
        }
        trace!(connection = %id, %from, %to, label, "linked");
        id
    }

    /// Remove a connection from both endpoints atomically.
    pub fn disconnect(&mut self, id: ConnectionId) -> Result<(), PatchError> {
        let conn = self
            .connections
            .remove(&id)
            .ok_or(PatchError::MissingConnection(id))?;
        if let Some(l) = self.locations.get_mut(&conn.from) {
            if let Some(v) = l.outgoing.get_mut(&conn.label) {
                v.retain(|&c| c != id);
                if v.is_empty() {
                    l.outgoing.remove(&conn.label);
                }
            }
        }
        if let Some(l) = self.locations.get_mut(&conn.to) {
            if let Some(v) = l.incoming.get_mut(&conn.label) {
                v.retain(|&c| c != id);
                if v.is_empty() {
                    l.incoming.remove(&conn.label);
                }
            }
        }
        trace!(connection = %id, "disconnected");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Make `observer` watch value updates of `observed`. Symmetric record;
    /// explicit; connections do not imply observation.
    pub fn observe_updates(
        &mut self,
        observer: LocationId,
        observed: LocationId,
    ) -> Result<(), PatchError> {
        self.location(observer)?;
        self.location_mut(observed)?.update_observers.insert(observer);
        self.location_mut(observer)?.observing_updates.insert(observed);
        Ok(())
    }

    pub fn stop_observing_updates(&mut self, observer: LocationId, observed: LocationId) {
        if let Some(l) = self.locations.get_mut(&observed) {
            l.update_observers.remove(&observer);
        }
        if let Some(l) = self.locations.get_mut(&observer) {
            l.observing_updates.remove(&observed);
        }
    }

    /// Make `observer` watch faults recorded on `observed`.
    pub fn observe_errors(
        &mut self,
        observer: LocationId,
        observed: LocationId,
    ) -> Result<(), PatchError> {
        self.location(observer)?;
        self.location_mut(observed)?.error_observers.insert(observer);
        self.location_mut(observer)?.observing_errors.insert(observed);
        Ok(())
    }

    pub fn stop_observing_errors(&mut self, observer: LocationId, observed: LocationId) {
        if let Some(l) = self.locations.get_mut(&observed) {
            l.error_observers.remove(&observer);
        }
        if let Some(l) = self.locations.get_mut(&observer) {
            l.observing_errors.remove(&observed);
        }
    }

    // Stable fan-out order for scheduling; observer sets are hash sets.

    pub(crate) fn update_observers_sorted(&self, loc: LocationId) -> Vec<LocationId> {
        let mut observers: Vec<LocationId> = self
            .locations
            .get(&loc)
            .map(|l| l.update_observers.iter().copied().collect())
            .unwrap_or_default();
        observers.sort_unstable();
        observers
    }

    pub(crate) fn error_observers_sorted(&self, loc: LocationId) -> Vec<LocationId> {
        let mut observers: Vec<LocationId> = self
            .locations
            .get(&loc)
            .map(|l| l.error_observers.iter().copied().collect())
            .unwrap_or_default();
        observers.sort_unstable();
        observers
    }

    // ------------------------------------------------------------------
    // Faults & aggregation
    // ------------------------------------------------------------------

    /// Record `fault` on `loc` unless one is already attached (first error
    /// wins). Returns whether the fault was recorded.
    pub(crate) fn record_fault(&mut self, loc: LocationId, fault: Fault) -> bool {
        match self.locations.get_mut(&loc) {
            Some(l) if l.fault.is_none() => {
                l.fault = Some(fault);
                true
            }
            _ => false,
        }
    }

    /// Fault attached directly to `loc`.
    pub fn fault(&self, loc: LocationId) -> Option<&Fault> {
        self.locations.get(&loc).and_then(|l| l.fault.as_ref())
    }

    /// Whether `loc` carries a fault itself or, when it holds a machine,
    /// aggregates one from its subtree.
    pub fn has_error(&self, loc: LocationId) -> bool {
        let Some(l) = self.locations.get(&loc) else {
            return false;
        };
        if l.fault.is_some() {
            return true;
        }
        l.object
            .as_deref()
            .and_then(Object::as_machine)
            .is_some_and(Machine::has_aggregated_errors)
    }

    /// First fault in `loc`'s subtree: its own, or (for machines) the fault
    /// of the lowest-numbered erroring child, recursively.
    pub fn find_error(&self, loc: LocationId) -> Option<&Fault> {
        let l = self.locations.get(&loc)?;
        if let Some(fault) = &l.fault {
            return Some(fault);
        }
        let machine = l.object.as_deref().and_then(Object::as_machine)?;
        let first = machine.children_with_errors.iter().next().copied()?;
        self.find_error(first)
    }

    /// Drop the fault on `loc` and reverse the aggregation walk: ancestors
    /// stop counting this subtree while it is error-free.
    pub fn clear_error(&mut self, loc: LocationId) {
        let Some(l) = self.locations.get_mut(&loc) else {
            return;
        };
        if l.fault.take().is_none() {
            return;
        }
        debug!(location = %self.describe(loc), "fault cleared");
        if self.has_error(loc) {
            // A machine may still aggregate child errors; ancestors keep it.
            return;
        }
        if let Some(parent) = self.locations.get(&loc).and_then(|l| l.parent) {
            self.clear_child_error(parent, loc);
        }
    }

    /// Remove `child` from the aggregate set of the machine at
    /// `machine_loc`; continue up the chain while subtrees become clean.
    fn clear_child_error(&mut self, machine_loc: LocationId, child: LocationId) {
        let Ok(machine) = self.machine_mut(machine_loc) else {
            return;
        };
        machine.clear_child_error(child);
        if self.has_error(machine_loc) {
            return;
        }
        if let Some(grand) = self.locations.get(&machine_loc).and_then(|l| l.parent) {
            self.clear_child_error(grand, machine_loc);
        }
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Destroy `loc`: its object, its connections (unlinking peers), its
    /// observer records, its error contribution, and, when it holds a
    /// machine, its whole subtree.
    ///
    /// The root location cannot be removed.
    pub fn remove_location(&mut self, loc: LocationId) -> Result<(), PatchError> {
        let parent = self
            .location(loc)?
            .parent
            .ok_or(PatchError::Detached(loc))?;

        // Subtree first: children list shrinks as each child detaches.
        let children: Vec<LocationId> = self
            .locations
            .get(&loc)
            .and_then(|l| l.object.as_deref())
            .and_then(Object::as_machine)
            .map(|m| m.locations.clone())
            .unwrap_or_default();
        for child in children {
            let _ = self.remove_location(child);
        }

        // Unlink every connection touching this location.
        let connections: Vec<ConnectionId> = {
            let l = self.location(loc)?;
            l.all_connections_out().chain(l.all_connections_in()).collect()
        };
        for id in connections {
            let _ = self.disconnect(id);
        }

        // Clear this location out of every observer relation it is part of.
        let l = self.location(loc)?;
        let watched_updates: Vec<LocationId> = l.observing_updates.iter().copied().collect();
        let update_watchers: Vec<LocationId> = l.update_observers.iter().copied().collect();
        let watched_errors: Vec<LocationId> = l.observing_errors.iter().copied().collect();
        let error_watchers: Vec<LocationId> = l.error_observers.iter().copied().collect();
        for other in watched_updates {
            self.stop_observing_updates(loc, other);
        }
        for other in update_watchers {
            self.stop_observing_updates(other, loc);
        }
        for other in watched_errors {
            self.stop_observing_errors(loc, other);
        }
        for other in error_watchers {
            self.stop_observing_errors(other, loc);
        }

        // Detach from the parent machine and reverse any error contribution.
        if let Ok(machine) = self.machine_mut(parent) {
            machine.locations.retain(|&l| l != loc);
        }
        self.clear_child_error(parent, loc);

        let removed = self.locations.remove(&loc);
        debug!(location = %loc, removed = removed.is_some(), "location removed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Structural duplication
    // ------------------------------------------------------------------

    /// Deep-copy `src` (and, for machines, its whole subtree) into the same
    /// parent machine, replaying every connection whose endpoints both lie
    /// inside the copied subtree.
    ///
    /// Observer relations and faults are runtime wiring and are not copied.
    pub fn duplicate(&mut self, src: LocationId) -> Result<LocationId, PatchError> {
        let parent = self
            .location(src)?
            .parent
            .ok_or(PatchError::Detached(src))?;
        let mut map: FxHashMap<LocationId, LocationId> = FxHashMap::default();
        let copy = self.copy_subtree(parent, src, &mut map)?;

        // Second pass: replay intra-subtree edges. Sorted for stable ids.
        let mut pairs: Vec<(LocationId, LocationId)> =
            map.iter().map(|(&old, &new)| (old, new)).collect();
        pairs.sort_unstable();
        for (old, new) in pairs {
            let edges: Vec<(String, LocationId, PointerBehavior)> = {
                let l = self.location(old)?;
                l.all_connections_out()
                    .filter_map(|cid| self.connections.get(&cid))
                    .map(|c| (c.label.clone(), c.to, c.pointer_behavior))
                    .collect()
            };
            for (label, to, behavior) in edges {
                if let Some(&new_to) = map.get(&to) {
                    self.link(new, new_to, &label, behavior);
                }
            }
        }
        debug!(source = %src, copy = %copy, locations = map.len(), "subtree duplicated");
        Ok(copy)
    }

    fn copy_subtree(
        &mut self,
        parent_machine: LocationId,
        src: LocationId,
        map: &mut FxHashMap<LocationId, LocationId>,
    ) -> Result<LocationId, PatchError> {
        let (name, position, object) = {
            let l = self.location(src)?;
            (
                l.name.clone(),
                l.position,
                l.object.as_deref().map(Object::clone_object),
            )
        };
        let id = self.add_in(parent_machine, name)?;
        self.location_mut(id)?.position = position;
        if let Some(object) = object {
            self.place(id, object)?;
        }
        let children: Vec<LocationId> = self
            .locations
            .get(&src)
            .and_then(|l| l.object.as_deref())
            .and_then(Object::as_machine)
            .map(|m| m.locations.clone())
            .unwrap_or_default();
        for child in children {
            self.copy_subtree(id, child, map)?;
        }
        map.insert(src, id);
        Ok(id)
    }
}

impl Default for Patch {
    fn default() -> Self {
        Self::new()
    }
}
