//! # Patchbay: a reactive node-graph automation core
//!
//! Patchbay is the engine room of a visual automation tool: a live, mutable,
//! possibly cyclic graph of interactive objects, and the single-threaded,
//! queue-based execution model that keeps it consistent while UI threads
//! poke at it.
//!
//! ## Core Concepts
//!
//! - **Locations**: graph nodes holding at most one object plus structural
//!   metadata (name, position, connections, observers)
//! - **Objects**: polymorphic behavior/data units implementing [`object::Object`]
//! - **Connections**: labeled edges instantiating an object's declared
//!   [`argument::Argument`]s
//! - **Machines**: composite objects containing a sub-graph, aggregating
//!   child errors
//! - **Scheduler**: a FIFO task queue; all graph mutation happens inside
//!   task execution on one model thread
//! - **Engine**: owns the model thread and bridges calls from foreign
//!   threads through a channel
//!
//! ## Quick Start
//!
//! ```
//! use patchbay::object::Object;
//! use patchbay::patch::Patch;
//! use patchbay::scheduler::{Context, Scheduler};
//! use patchbay::types::LocationId;
//!
//! // A minimal object: holds text, announces changes when run.
//! struct Echo {
//!     text: String,
//! }
//!
//! impl Object for Echo {
//!     fn kind(&self) -> &'static str {
//!         "Echo"
//!     }
//!
//!     fn clone_object(&self) -> Box<dyn Object> {
//!         Box::new(Echo { text: self.text.clone() })
//!     }
//!
//!     fn get_text(&self) -> String {
//!         self.text.clone()
//!     }
//!
//!     fn run(&mut self, here: LocationId, ctx: &mut Context<'_>) {
//!         ctx.schedule_update(here);
//!     }
//! }
//!
//! let mut patch = Patch::new();
//! let mut scheduler = Scheduler::new();
//!
//! let echo = patch
//!     .create_in(patch.root(), &Echo { text: "hi".into() }, "echo")
//!     .unwrap();
//!
//! let mut ctx = Context::new(&mut patch, &mut scheduler);
//! ctx.schedule_run(echo);
//! scheduler.run_loop(&mut patch);
//!
//! assert_eq!(patch.get_text(echo), "hi");
//! ```
//!
//! ## Threading model
//!
//! The whole graph is one logical resource guarded by discipline rather than
//! locks: only the model thread holds `&mut Patch`. Foreign threads go
//! through [`engine::Handle`]:
//!
//! ```no_run
//! use patchbay::engine::Engine;
//! use patchbay::patch::Patch;
//!
//! let engine = Engine::start(Patch::new()).unwrap();
//! let handle = engine.handle();
//!
//! // Fire-and-forget from any thread:
//! handle.post(|ctx| {
//!     let root = ctx.patch.root();
//!     ctx.schedule_run(root);
//! }).unwrap();
//!
//! // Blocking round-trip:
//! let count = handle.call(|ctx| ctx.patch.len()).unwrap();
//! assert!(count >= 1);
//!
//! let _patch = engine.stop();
//! ```
//!
//! ## Module Guide
//!
//! - [`types`] - Arena handles and geometry
//! - [`object`] - The `Object` trait and pointer capability
//! - [`argument`] - Declared slots, preconditions, resolution
//! - [`connection`] - Labeled edges and pointer behavior
//! - [`location`] - Graph nodes
//! - [`machine`] - Composite objects and error aggregation
//! - [`patch`] - The arena: structure, wiring, observation, faults
//! - [`task`] - Deferred work units
//! - [`scheduler`] - FIFO queue and execution context
//! - [`engine`] - Model thread and cross-thread dispatch
//! - [`errors`] - Fault records and API error taxonomy
//! - [`telemetry`] - Tracing bootstrap

pub mod argument;
pub mod connection;
pub mod engine;
pub mod errors;
pub mod location;
pub mod machine;
pub mod object;
pub mod patch;
pub mod scheduler;
pub mod task;
pub mod telemetry;
pub mod types;
