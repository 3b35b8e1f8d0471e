//! Error taxonomy for the patchbay core.
//!
//! Two distinct families live here and must not be conflated:
//!
//! - [`Fault`] is a *domain* error: a recorded failure attached to one
//!   location of the graph (an object that could not run, a missing
//!   connection). Faults never unwind; they are stored on the location and
//!   fanned out to observers through the task queue.
//! - [`PatchError`] / [`EngineError`] are *API* errors: a caller handed us a
//!   stale handle, dispatched from the wrong thread, and so on. These are
//!   ordinary `Result` errors with diagnostic codes.

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

use crate::types::{ConnectionId, LocationId};

/// Call-site provenance of a recorded fault.
///
/// Captured automatically via `#[track_caller]` when
/// [`report_error`](crate::scheduler::Context::report_error) runs; the Rust
/// analogue of a source-location argument.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Origin {
    pub(crate) fn from_caller(caller: &'static std::panic::Location<'static>) -> Self {
        Self {
            file: caller.file().to_string(),
            line: caller.line(),
            column: caller.column(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A runtime error recorded on a single location.
///
/// At most one fault is attached to a location at a time; the first one wins
/// until [`clear_error`](crate::patch::Patch::clear_error) removes it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    /// Human-readable description of what went wrong.
    pub message: String,
    /// The location the fault is attached to.
    pub source: LocationId,
    /// Where in the code the fault was reported from.
    pub origin: Origin,
    /// When the fault was recorded.
    pub when: DateTime<Utc>,
}

impl Fault {
    pub(crate) fn new(message: impl Into<String>, source: LocationId, origin: Origin) -> Self {
        Self {
            message: message.into(),
            source,
            origin,
            when: Utc::now(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {}, from {})", self.message, self.source, self.origin)
    }
}

impl std::error::Error for Fault {}

/// Errors returned by graph (arena) operations.
#[derive(Debug, ThisError, Diagnostic)]
pub enum PatchError {
    /// The handle does not resolve to a live location.
    #[error("no such location: {0}")]
    #[diagnostic(
        code(patchbay::patch::missing_location),
        help("The location was removed, or the handle belongs to another patch.")
    )]
    MissingLocation(LocationId),

    /// The handle does not resolve to a live connection.
    #[error("no such connection: {0}")]
    #[diagnostic(code(patchbay::patch::missing_connection))]
    MissingConnection(ConnectionId),

    /// An operation needed an object, but the location holds none.
    #[error("location {0} holds no object")]
    #[diagnostic(
        code(patchbay::patch::empty_location),
        help("Put an object into the location first (see Patch::put).")
    )]
    EmptyLocation(LocationId),

    /// An operation needed a machine, but the location's object is not one.
    #[error("object at {0} is not a machine")]
    #[diagnostic(code(patchbay::patch::not_a_machine))]
    NotAMachine(LocationId),

    /// The operation needs a parent machine, but the location is a root.
    #[error("location {0} has no parent machine")]
    #[diagnostic(
        code(patchbay::patch::detached),
        help("Root locations cannot be duplicated or re-homed.")
    )]
    Detached(LocationId),
}

/// Errors returned by cross-thread dispatch through the engine handle.
#[derive(Debug, ThisError, Diagnostic)]
pub enum EngineError {
    /// The model thread could not be spawned.
    #[error("failed to spawn the model thread")]
    #[diagnostic(code(patchbay::engine::spawn))]
    Spawn(#[source] std::io::Error),

    /// The model thread is gone (engine stopped or panicked).
    #[error("engine is disconnected")]
    #[diagnostic(
        code(patchbay::engine::disconnected),
        help("The engine was stopped, or the model thread panicked during a task.")
    )]
    Disconnected,

    /// A blocking call was attempted from the model thread itself.
    #[error("blocking dispatch from the model thread would deadlock")]
    #[diagnostic(
        code(patchbay::engine::would_deadlock),
        help("Code running on the model thread already holds a Context; call it directly.")
    )]
    WouldDeadlock,
}
