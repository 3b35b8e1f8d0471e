//! Arguments: the named, typed slots an object declares it wants filled.
//!
//! An argument is both a schema entry (shown by
//! [`Object::args`](crate::object::Object::args)) and a resolver: at run
//! time the object asks the argument to find the partner location, first
//! through connections carrying the argument's name, then by looking for a
//! nearby sibling with a matching name.

use crate::connection::PointerBehavior;
use crate::object::Object;
use crate::patch::Patch;
use crate::scheduler::Context;
use crate::types::LocationId;

/// How strictly an argument's target must match before it is usable.
///
/// The variants are ordered from weakest to strongest; comparing with `>=`
/// asks "does this argument demand at least that much".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precondition {
    /// The argument may be left unfilled.
    Optional,
    /// A target location must exist.
    RequiresLocation,
    /// The target location must hold an object.
    RequiresObject,
    /// The target's object must satisfy the argument's requirement predicate.
    RequiresConcreteType,
}

/// A named predicate over candidate target objects.
#[derive(Clone, Copy)]
pub struct Requirement {
    /// Human-readable description of what is expected ("a numeric object").
    pub label: &'static str,
    /// The actual check.
    pub check: fn(&dyn Object) -> bool,
}

/// A declared, named slot of an object.
pub struct Argument {
    pub name: &'static str,
    pub precondition: Precondition,
    requirement: Option<Requirement>,
}

impl Argument {
    #[must_use]
    pub const fn new(name: &'static str, precondition: Precondition) -> Self {
        Self {
            name,
            precondition,
            requirement: None,
        }
    }

    /// Attach a requirement predicate, checked when the precondition is
    /// [`Precondition::RequiresConcreteType`].
    #[must_use]
    pub fn require(mut self, label: &'static str, check: fn(&dyn Object) -> bool) -> Self {
        self.requirement = Some(Requirement { label, check });
        self
    }

    pub fn requirement(&self) -> Option<&Requirement> {
        self.requirement.as_ref()
    }

    /// Check whether `target` satisfies this argument, to the degree the
    /// precondition demands. `Err` carries a user-facing explanation.
    pub fn check_requirements(
        &self,
        patch: &Patch,
        target: Option<LocationId>,
    ) -> Result<(), String> {
        if self.precondition < Precondition::RequiresLocation {
            return Ok(());
        }
        let Some(target) = target else {
            return Err(format!("argument \"{}\" requires a target location", self.name));
        };
        if self.precondition < Precondition::RequiresObject {
            return Ok(());
        }
        let object = patch
            .location(target)
            .ok()
            .and_then(|l| l.object());
        let Some(object) = object else {
            return Err(format!(
                "argument \"{}\" requires an object at the target location",
                self.name
            ));
        };
        if self.precondition < Precondition::RequiresConcreteType {
            return Ok(());
        }
        if let Some(req) = &self.requirement {
            if !(req.check)(object) {
                return Err(format!("argument \"{}\" requires {}", self.name, req.label));
            }
        }
        Ok(())
    }

    /// Find the location this argument refers to, without reporting.
    ///
    /// Connections win over name lookup: the first outgoing connection under
    /// the argument's name is taken, following pointer indirection unless the
    /// edge terminates it. With no connection, a sibling in the parent
    /// machine whose location name equals the argument name is used.
    pub fn resolve(&self, patch: &Patch, here: LocationId) -> Option<LocationId> {
        let location = patch.location(here).ok()?;
        for &cid in location.connections_out(self.name) {
            let Ok(conn) = patch.connection(cid) else { continue };
            return Some(match conn.pointer_behavior {
                PointerBehavior::FollowPointers => patch.follow(conn.to),
                PointerBehavior::TerminateHere => conn.to,
            });
        }
        patch.nearby(here, |sibling| {
            (sibling.id() != here && sibling.name() == self.name).then(|| sibling.id())
        })
    }

    /// Resolve, and record a missing-dependency fault on `here` when a
    /// required argument cannot be found or does not qualify.
    pub fn resolve_or_report(&self, ctx: &mut Context<'_>, here: LocationId) -> Option<LocationId> {
        let found = self.resolve(ctx.patch, here);
        match self.check_requirements(ctx.patch, found) {
            Ok(()) => found,
            Err(message) => {
                if found.is_none() {
                    ctx.report_missing(here, self.name);
                } else {
                    ctx.report_error(here, message);
                }
                None
            }
        }
    }
}
