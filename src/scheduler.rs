//! The scheduler: a FIFO task queue, and the execution context tasks run in.
//!
//! Exactly one [`Scheduler`] serves a [`Patch`]; together they form the
//! model-thread state (see [`crate::engine`]). All graph-visible effects
//! (running objects, update fan-out, error fan-out) happen inside
//! [`Task::execute`], which receives a [`Context`] borrowing both halves.
//!
//! Ordering guarantees:
//!
//! - Tasks execute in strict FIFO submission order.
//! - A keyed task scheduled while an identical one is pending collapses into
//!   it (one execution, original queue slot, no queue jumping).
//! - The pending mark is cleared *before* execution, so a task may reschedule
//!   itself while it runs.
//! - Tasks scheduled during execution join the same queue and run within the
//!   same [`run_loop`](Scheduler::run_loop) pass.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::connection::PointerBehavior;
use crate::errors::{Fault, Origin, PatchError};
use crate::patch::Patch;
use crate::task::{Task, TaskKey};
use crate::types::{ConnectionId, LocationId};

/// FIFO run queue with idempotent scheduling of keyed tasks.
///
/// The scheduler owns queued tasks and drops them after execution.
#[derive(Default)]
pub struct Scheduler {
    queue: VecDeque<Task>,
    pending: FxHashSet<TaskKey>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `task` to the queue unless an identical keyed task is already
    /// pending. Returns whether the task was enqueued.
    pub fn schedule(&mut self, task: Task) -> bool {
        if let Some(key) = task.key() {
            if !self.pending.insert(key) {
                trace!(?task, "schedule collapsed into pending task");
                return false;
            }
        }
        trace!(?task, depth = self.queue.len() + 1, "scheduled");
        self.queue.push_back(task);
        true
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drain the queue, executing tasks in FIFO order until it is empty.
    /// Returns the number of tasks executed.
    pub fn run_loop(&mut self, patch: &mut Patch) -> usize {
        self.run_loop_bounded(patch, usize::MAX)
    }

    /// Like [`run_loop`](Scheduler::run_loop), but stop after at most
    /// `max_iterations` tasks even if more are queued.
    pub fn run_loop_bounded(&mut self, patch: &mut Patch, max_iterations: usize) -> usize {
        let mut executed = 0;
        while executed < max_iterations {
            let Some(task) = self.queue.pop_front() else {
                break;
            };
            if let Some(key) = task.key() {
                // Cleared before execution: the task may reschedule itself.
                self.pending.remove(&key);
            }
            trace!(?task, "executing");
            let mut ctx = Context {
                patch: &mut *patch,
                scheduler: &mut *self,
            };
            task.execute(&mut ctx);
            executed += 1;
        }
        if executed > 0 {
            trace!(executed, remaining = self.queue.len(), "run loop pass done");
        }
        executed
    }
}

/// Execution surface handed to tasks and object hooks.
///
/// Borrows the patch and the scheduler together so that running code can
/// both mutate the graph and schedule follow-up work. Only the model thread
/// ever holds one.
pub struct Context<'a> {
    pub patch: &'a mut Patch,
    pub scheduler: &'a mut Scheduler,
}

impl<'a> Context<'a> {
    pub fn new(patch: &'a mut Patch, scheduler: &'a mut Scheduler) -> Self {
        Self { patch, scheduler }
    }

    // ------------------------------------------------------------------
    // Immediate dispatch
    // ------------------------------------------------------------------

    /// Execute the object at `target` right now.
    ///
    /// The object is detached from its location for the duration of the call
    /// so the hook can freely mutate the rest of the graph.
    pub fn run(&mut self, target: LocationId) {
        let Some(mut object) = self.patch.take_object(target) else {
            trace!(%target, "run skipped: no live object");
            return;
        };
        object.run(target, self);
        self.patch.restore_object(target, object);
    }

    /// Deliver an `updated` notification to `target` right now.
    pub fn notify_updated(&mut self, target: LocationId, updated: LocationId) {
        let Some(mut object) = self.patch.take_object(target) else {
            trace!(%target, "update skipped: no live object");
            return;
        };
        object.updated(target, updated, self);
        self.patch.restore_object(target, object);
    }

    /// Deliver an `errored` notification to `target` right now.
    pub fn notify_errored(&mut self, target: LocationId, errored: LocationId) {
        let Some(mut object) = self.patch.take_object(target) else {
            trace!(%target, "errored skipped: no live object");
            return;
        };
        object.errored(target, errored, self);
        self.patch.restore_object(target, object);
    }

    // ------------------------------------------------------------------
    // Deferred dispatch
    // ------------------------------------------------------------------

    /// Queue a run of the object at `target`.
    pub fn schedule_run(&mut self, target: LocationId) -> bool {
        self.scheduler.schedule(Task::run(target))
    }

    /// Announce that `updated` changed value: every registered update
    /// observer gets an update task naming it.
    pub fn schedule_update(&mut self, updated: LocationId) {
        for observer in self.patch.update_observers_sorted(updated) {
            self.scheduler.schedule(Task::update(observer, updated));
        }
    }

    /// Queue a single `updated` notification for `target`.
    pub fn schedule_local_update(&mut self, target: LocationId, updated: LocationId) -> bool {
        self.scheduler.schedule(Task::update(target, updated))
    }

    /// Queue an `errored` notification for `target`.
    pub fn schedule_errored(&mut self, target: LocationId, errored: LocationId) -> bool {
        self.scheduler.schedule(Task::errored(target, errored))
    }

    /// Queue an arbitrary closure; it runs after everything already queued.
    pub fn defer(&mut self, f: impl FnOnce(&mut Context<'_>) + Send + 'static) {
        let root = self.patch.root();
        self.scheduler.schedule(Task::function(root, f));
    }

    // ------------------------------------------------------------------
    // Faults
    // ------------------------------------------------------------------

    /// Record a fault on `loc` and fan it out.
    ///
    /// First error wins: a location already carrying a fault keeps it and no
    /// notifications are sent. Observers and the parent machine are notified
    /// through the task queue, so error visibility is consistent with
    /// execution order.
    #[track_caller]
    pub fn report_error(&mut self, loc: LocationId, message: impl Into<String>) {
        let origin = Origin::from_caller(std::panic::Location::caller());
        self.report_error_at(loc, message.into(), origin);
    }

    /// Record that a required named dependency was not found.
    #[track_caller]
    pub fn report_missing(&mut self, loc: LocationId, property: &str) {
        let origin = Origin::from_caller(std::panic::Location::caller());
        let message = format!(
            "Couldn't find \"{property}\". You can create a connection or rename \
             one of the nearby objects to fix this."
        );
        self.report_error_at(loc, message, origin);
    }

    fn report_error_at(&mut self, loc: LocationId, message: String, origin: Origin) {
        let fault = Fault::new(message, loc, origin);
        if !self.patch.record_fault(loc, fault) {
            return;
        }
        debug!(location = %self.patch.describe(loc), "fault recorded");
        let surfaced_at_root = self.relay_error(loc);
        if surfaced_at_root {
            if let Some(fault) = self.patch.fault(loc) {
                tracing::error!(location = %self.patch.describe(loc), "unobserved error: {fault}");
            }
        }
    }

    /// Fan an error at `here` out to its error observers and its parent.
    ///
    /// Returns `true` when `here` has no parent, i.e. the error reached the
    /// top of the aggregation chain.
    pub fn relay_error(&mut self, here: LocationId) -> bool {
        for observer in self.patch.error_observers_sorted(here) {
            self.schedule_errored(observer, here);
        }
        match self.patch.location(here).ok().and_then(|l| l.parent()) {
            Some(parent) => {
                self.schedule_errored(parent, here);
                false
            }
            None => true,
        }
    }

    // ------------------------------------------------------------------
    // Graph operations that fire hooks
    // ------------------------------------------------------------------

    /// Wire `from` to `to` under `label`.
    ///
    /// The label is matched against the arguments declared by `from`'s
    /// object; when the matching argument requires a concrete type and `to`
    /// already satisfies it, the edge terminates pointer traversal at `to`
    /// (a local override of the requested behavior). Multiple connections
    /// with the same label between the same pair are permitted.
    pub fn connect(
        &mut self,
        from: LocationId,
        to: LocationId,
        label: &str,
        behavior: PointerBehavior,
    ) -> Result<ConnectionId, PatchError> {
        use crate::argument::{Argument, Precondition};

        self.patch.location(to)?;
        let satisfied = {
            let patch = &*self.patch;
            let location = patch.location(from)?;
            let object = location
                .object()
                .ok_or(PatchError::EmptyLocation(from))?;
            let mut hit = None;
            object.args(&mut |arg: &Argument| {
                if hit.is_none()
                    && arg.name == label
                    && arg.precondition >= Precondition::RequiresConcreteType
                {
                    hit = Some(arg.check_requirements(patch, Some(to)).is_ok());
                }
            });
            hit.unwrap_or(false)
        };
        let behavior = if satisfied {
            PointerBehavior::TerminateHere
        } else {
            behavior
        };

        let id = self.patch.link(from, to, label, behavior);
        if let Some(mut object) = self.patch.take_object(from) {
            object.connection_added(from, label, id, self);
            self.patch.restore_object(from, object);
        }
        Ok(id)
    }

    /// Set the text of the object `loc`'s pointer chain ends at, then
    /// announce the change to `loc`'s update observers. No-op when the text
    /// is unchanged.
    pub fn set_text(&mut self, loc: LocationId, text: &str) {
        if self.patch.get_text(loc) == text {
            return;
        }
        let target = self.patch.follow(loc);
        if let Some(mut object) = self.patch.take_object(target) {
            object.set_text(target, self, text);
            self.patch.restore_object(target, object);
        }
        self.schedule_update(loc);
    }

    /// [`set_text`](Context::set_text) with a numeric value.
    pub fn set_number(&mut self, loc: LocationId, value: f64) {
        self.set_text(loc, &value.to_string());
    }
}
