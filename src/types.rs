//! Core identifier and geometry types for the patchbay object graph.
//!
//! Locations and connections live in an arena owned by [`crate::patch::Patch`]
//! and are addressed by stable numeric handles. Handles are allocated from a
//! monotonic counter and never reused, so a stale handle held by an observer
//! set or a queued task simply fails lookup instead of dangling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle of a [`Location`](crate::location::Location) in the arena.
///
/// Holding a `LocationId` implies no ownership; the arena may have dropped
/// the location since the handle was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationId(pub(crate) u64);

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loc#{}", self.0)
    }
}

/// Stable handle of a [`Connection`](crate::connection::Connection).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub(crate) u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// 2D canvas position of a location.
///
/// Purely structural metadata; the core never interprets it beyond storing
/// and copying it (presentation layers do the rest).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
