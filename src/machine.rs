//! Machines: composite objects that contain a sub-graph of locations.
//!
//! A machine is an ordinary [`Object`] with the machine capability: it owns
//! an ordered list of child location handles and aggregates their faults so
//! that "does this subtree currently contain an unresolved error" is a cheap,
//! incrementally maintained question at every nesting level.

use std::collections::BTreeSet;

use tracing::error;

use crate::object::Object;
use crate::scheduler::Context;
use crate::types::LocationId;

/// A container object: a named sub-graph of child locations.
pub struct Machine {
    pub name: String,
    /// Children in insertion order; order is not semantic but iteration is
    /// stable.
    pub(crate) locations: Vec<LocationId>,
    /// Children (direct) currently contributing an unresolved error.
    pub(crate) children_with_errors: BTreeSet<LocationId>,
}

impl Machine {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locations: Vec::new(),
            children_with_errors: BTreeSet::new(),
        }
    }

    /// Child locations, in insertion order.
    pub fn locations(&self) -> &[LocationId] {
        &self.locations
    }

    /// Direct children currently carrying (or aggregating) an error.
    pub fn children_with_errors(&self) -> impl Iterator<Item = LocationId> + '_ {
        self.children_with_errors.iter().copied()
    }

    /// Whether any direct child is contributing an error.
    pub fn has_aggregated_errors(&self) -> bool {
        !self.children_with_errors.is_empty()
    }

    pub(crate) fn clear_child_error(&mut self, child: LocationId) {
        self.children_with_errors.remove(&child);
    }
}

impl Object for Machine {
    fn kind(&self) -> &'static str {
        "Machine"
    }

    /// Shallow clone: children belong to the arena and are duplicated by
    /// [`Patch::duplicate`](crate::patch::Patch::duplicate).
    fn clone_object(&self) -> Box<dyn Object> {
        Box::new(Machine::new(self.name.clone()))
    }

    fn get_text(&self) -> String {
        self.name.clone()
    }

    fn as_machine(&self) -> Option<&Machine> {
        Some(self)
    }

    fn as_machine_mut(&mut self) -> Option<&mut Machine> {
        Some(self)
    }

    /// Error aggregation: a child (or nested machine) reported a fault.
    ///
    /// The child joins the aggregate set, this machine's own error observers
    /// are notified, and the report chains to the parent. A parentless
    /// machine is the end of the chain: the error is surfaced in the log.
    fn errored(&mut self, here: LocationId, errored: LocationId, ctx: &mut Context<'_>) {
        self.children_with_errors.insert(errored);
        let surfaced = ctx.relay_error(here);
        if surfaced {
            let description = ctx
                .patch
                .find_error(errored)
                .map_or_else(|| "unknown error".to_string(), ToString::to_string);
            error!(
                machine = %self.name,
                child = %errored,
                "unhandled error reached the root: {description}"
            );
        }
    }
}
