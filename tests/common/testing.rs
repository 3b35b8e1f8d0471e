//! Shared test objects: a numeric holder, an incrementing action, a probe
//! recording every hook it receives, and a pointer-like alias.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use patchbay::argument::{Argument, Precondition};
use patchbay::object::{Object, Pointer};
use patchbay::patch::Patch;
use patchbay::scheduler::{Context, Scheduler};
use patchbay::types::LocationId;

/// Hook invocations observed by [`Probe`] objects, in global order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Ran(LocationId),
    Updated {
        here: LocationId,
        updated: LocationId,
    },
    Errored {
        here: LocationId,
        errored: LocationId,
    },
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn new_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn fixture() -> (Patch, Scheduler) {
    (Patch::new(), Scheduler::new())
}

/// A numeric value holder speaking the text protocol.
pub struct Number {
    pub value: f64,
}

impl Number {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl Object for Number {
    fn kind(&self) -> &'static str {
        "Number"
    }

    fn clone_object(&self) -> Box<dyn Object> {
        Box::new(Number { value: self.value })
    }

    fn get_text(&self) -> String {
        self.value.to_string()
    }

    fn set_text(&mut self, here: LocationId, ctx: &mut Context<'_>, text: &str) {
        match text.trim().parse() {
            Ok(value) => self.value = value,
            Err(_) => ctx.report_error(here, format!("not a number: {text:?}")),
        }
    }

    fn serialize_state(&self) -> serde_json::Value {
        json!(self.value)
    }

    fn deserialize_state(&mut self, _here: LocationId, state: serde_json::Value) {
        if let Some(value) = state.as_f64() {
            self.value = value;
        }
    }
}

fn is_numeric(object: &dyn Object) -> bool {
    object.get_text().trim().parse::<f64>().is_ok()
}

fn target_arg() -> Argument {
    Argument::new("target", Precondition::RequiresConcreteType).require("a numeric object", is_numeric)
}

/// An action: adds one to the numeric object its "target" argument names.
pub struct Increment;

impl Object for Increment {
    fn kind(&self) -> &'static str {
        "Increment"
    }

    fn clone_object(&self) -> Box<dyn Object> {
        Box::new(Increment)
    }

    fn args(&self, visit: &mut dyn FnMut(&Argument)) {
        visit(&target_arg());
    }

    fn run(&mut self, here: LocationId, ctx: &mut Context<'_>) {
        let Some(target) = target_arg().resolve_or_report(ctx, here) else {
            return;
        };
        let value = ctx.patch.number(target).unwrap_or(0.0);
        ctx.set_number(target, value + 1.0);
    }
}

/// Records every hook invocation into a shared log.
///
/// Clones share the log on purpose: the log is the measurement instrument,
/// not object state.
pub struct Probe {
    pub log: EventLog,
}

impl Probe {
    pub fn new(log: &EventLog) -> Self {
        Self { log: log.clone() }
    }
}

impl Object for Probe {
    fn kind(&self) -> &'static str {
        "Probe"
    }

    fn clone_object(&self) -> Box<dyn Object> {
        Box::new(Probe {
            log: self.log.clone(),
        })
    }

    fn run(&mut self, here: LocationId, _ctx: &mut Context<'_>) {
        self.log.lock().push(Event::Ran(here));
    }

    fn updated(&mut self, here: LocationId, updated: LocationId, _ctx: &mut Context<'_>) {
        self.log.lock().push(Event::Updated { here, updated });
    }

    fn errored(&mut self, here: LocationId, errored: LocationId, _ctx: &mut Context<'_>) {
        self.log.lock().push(Event::Errored { here, errored });
    }
}

/// A pointer-like object: makes its location an alias of another.
pub struct Alias {
    pub target: Option<LocationId>,
}

impl Alias {
    pub fn to(target: LocationId) -> Self {
        Self {
            target: Some(target),
        }
    }
}

impl Pointer for Alias {
    fn pointee(&self) -> Option<LocationId> {
        self.target
    }

    fn set_pointee(&mut self, target: Option<LocationId>) {
        self.target = target;
    }
}

impl Object for Alias {
    fn kind(&self) -> &'static str {
        "Alias"
    }

    fn clone_object(&self) -> Box<dyn Object> {
        Box::new(Alias {
            target: self.target,
        })
    }

    fn as_pointer(&self) -> Option<&dyn Pointer> {
        Some(self)
    }

    fn as_pointer_mut(&mut self) -> Option<&mut dyn Pointer> {
        Some(self)
    }
}
