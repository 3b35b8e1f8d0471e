//! Tasks: units of deferred, single-threaded work targeting one location.
//!
//! Tasks are plain values owned by the [`Scheduler`](crate::scheduler::Scheduler)
//! while queued and consumed on execution. The keyed variants (run, update,
//! errored) collapse while pending: scheduling the same logical task twice
//! before it executes yields exactly one execution.

use std::fmt;

use crate::scheduler::Context;
use crate::types::LocationId;

/// A unit of deferred work.
pub enum Task {
    /// Invoke the target object's `run`.
    Run { target: LocationId },
    /// Tell the target object that `updated` changed value.
    Update {
        target: LocationId,
        updated: LocationId,
    },
    /// Tell the target object that `errored` recorded a fault.
    Errored {
        target: LocationId,
        errored: LocationId,
    },
    /// Run an arbitrary closure on the model thread (thread hops).
    Function {
        target: LocationId,
        f: Box<dyn FnOnce(&mut Context<'_>) + Send>,
    },
}

/// Identity of a keyed task while pending, used for idempotent scheduling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum TaskKey {
    Run(LocationId),
    Update(LocationId, LocationId),
    Errored(LocationId, LocationId),
}

impl Task {
    pub fn run(target: LocationId) -> Self {
        Task::Run { target }
    }

    pub fn update(target: LocationId, updated: LocationId) -> Self {
        Task::Update { target, updated }
    }

    pub fn errored(target: LocationId, errored: LocationId) -> Self {
        Task::Errored { target, errored }
    }

    pub fn function(
        target: LocationId,
        f: impl FnOnce(&mut Context<'_>) + Send + 'static,
    ) -> Self {
        Task::Function {
            target,
            f: Box::new(f),
        }
    }

    /// The location whose behavior this task exercises.
    pub fn target(&self) -> LocationId {
        match *self {
            Task::Run { target }
            | Task::Update { target, .. }
            | Task::Errored { target, .. }
            | Task::Function { target, .. } => target,
        }
    }

    /// Pending-identity of keyed tasks; function tasks always enqueue.
    pub(crate) fn key(&self) -> Option<TaskKey> {
        match *self {
            Task::Run { target } => Some(TaskKey::Run(target)),
            Task::Update { target, updated } => Some(TaskKey::Update(target, updated)),
            Task::Errored { target, errored } => Some(TaskKey::Errored(target, errored)),
            Task::Function { .. } => None,
        }
    }

    pub(crate) fn execute(self, ctx: &mut Context<'_>) {
        match self {
            Task::Run { target } => ctx.run(target),
            Task::Update { target, updated } => ctx.notify_updated(target, updated),
            Task::Errored { target, errored } => ctx.notify_errored(target, errored),
            Task::Function { f, .. } => f(ctx),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Run { target } => write!(f, "Run({target})"),
            Task::Update { target, updated } => write!(f, "Update({target}, updated: {updated})"),
            Task::Errored { target, errored } => write!(f, "Errored({target}, errored: {errored})"),
            Task::Function { target, .. } => write!(f, "Function({target})"),
        }
    }
}
