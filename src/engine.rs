//! The engine: a dedicated model thread owning the patch and its scheduler.
//!
//! Exactly one thread, the model thread, ever mutates the graph, runs
//! tasks, or invokes object hooks. Everything else talks to it through a
//! cloneable [`Handle`]: [`Handle::post`] for fire-and-forget closures,
//! [`Handle::call`] for blocking round-trips. Both travel the same flume
//! channel as function tasks, so cross-thread work is serialized with, and
//! ordered after, all locally queued tasks.
//!
//! The model thread's loop ([`run_thread`]) drains the local queue, then
//! blocks receiving one directive from the channel; that receive is the only
//! place the model thread ever blocks. A panic inside a task unwinds the
//! model thread; handles observe it as [`EngineError::Disconnected`]. There
//! is no retry: task panics are engine-fatal by design of the task
//! contract (object failures are supposed to become faults instead).

use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::errors::EngineError;
use crate::patch::Patch;
use crate::scheduler::{Context, Scheduler};
use crate::task::Task;
use crate::types::LocationId;

/// Engine tuning, resolved from the environment where unset.
///
/// `PATCHBAY_MAX_ITERATIONS` bounds how many tasks a single run-loop pass
/// may execute before the engine re-checks the channel; unset means drain
/// fully.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Name given to the model thread.
    pub thread_name: String,
    /// Upper bound on tasks per run-loop pass; `None` drains the queue.
    pub max_iterations_per_pass: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thread_name: "patchbay-model".to_string(),
            max_iterations_per_pass: None,
        }
    }
}

impl EngineConfig {
    /// Resolve configuration from `.env` / process environment.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let max_iterations_per_pass = std::env::var("PATCHBAY_MAX_ITERATIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n: &usize| n > 0);
        Self {
            max_iterations_per_pass,
            ..Self::default()
        }
    }
}

enum Directive {
    Task(Task),
    Shutdown,
}

/// Owner of the model thread.
///
/// [`Engine::stop`] (or drop) shuts the thread down; `stop` additionally
/// hands the patch back for inspection or persistence.
pub struct Engine {
    handle: Handle,
    thread: Option<JoinHandle<Patch>>,
}

impl Engine {
    /// Spawn the model thread with default configuration.
    pub fn start(patch: Patch) -> Result<Engine, EngineError> {
        Self::start_with(patch, EngineConfig::default())
    }

    /// Spawn the model thread.
    pub fn start_with(patch: Patch, config: EngineConfig) -> Result<Engine, EngineError> {
        let root = patch.root();
        let (sender, receiver) = flume::unbounded();
        let (id_sender, id_receiver) = flume::bounded(1);
        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                let _ = id_sender.send(thread::current().id());
                run_thread(patch, &receiver, &config)
            })
            .map_err(EngineError::Spawn)?;
        let model_thread = id_receiver.recv().map_err(|_| EngineError::Disconnected)?;
        Ok(Engine {
            handle: Handle {
                sender,
                model_thread,
                root,
            },
            thread: Some(thread),
        })
    }

    /// A cloneable handle for posting work from any thread.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Shut the model thread down and return the patch.
    ///
    /// `None` means the model thread panicked and the patch is lost.
    pub fn stop(mut self) -> Option<Patch> {
        let _ = self.handle.sender.send(Directive::Shutdown);
        self.thread.take().and_then(|t| t.join().ok())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.handle.sender.send(Directive::Shutdown);
            let _ = thread.join();
        }
    }
}

/// Model-thread entry point: drain local work, then block for one directive.
fn run_thread(mut patch: Patch, receiver: &flume::Receiver<Directive>, config: &EngineConfig) -> Patch {
    let mut scheduler = Scheduler::new();
    debug!(thread = ?thread::current().name(), "model thread started");
    loop {
        match config.max_iterations_per_pass {
            // Bounded slices still drain fully before the channel is polled;
            // the bound only caps how much happens between trace records.
            Some(max) => while scheduler.run_loop_bounded(&mut patch, max) == max {},
            None => {
                scheduler.run_loop(&mut patch);
            }
        }
        match receiver.recv() {
            Ok(Directive::Task(task)) => {
                scheduler.schedule(task);
            }
            Ok(Directive::Shutdown) | Err(_) => break,
        }
    }
    debug!("model thread stopped");
    patch
}

/// Cloneable entry point for foreign threads.
#[derive(Clone)]
pub struct Handle {
    sender: flume::Sender<Directive>,
    model_thread: ThreadId,
    root: LocationId,
}

impl Handle {
    /// Whether the calling thread is the model thread.
    #[must_use]
    pub fn is_model_thread(&self) -> bool {
        thread::current().id() == self.model_thread
    }

    /// Root location of the patch the engine runs.
    pub fn root(&self) -> LocationId {
        self.root
    }

    /// Fire-and-forget: run `f` on the model thread, after all currently
    /// queued work.
    ///
    /// Posting from the model thread itself is legal and simply defers `f`
    /// to the next channel poll; code already running on the model thread
    /// holds a [`Context`] and should call directly instead of hopping.
    pub fn post(
        &self,
        f: impl FnOnce(&mut Context<'_>) + Send + 'static,
    ) -> Result<(), EngineError> {
        self.sender
            .send(Directive::Task(Task::function(self.root, f)))
            .map_err(|_| EngineError::Disconnected)
    }

    /// Run `f` on the model thread and block until its result is back.
    ///
    /// The only synchronous cross-thread call; the caller stalls for up to a
    /// full scheduler turn, so use it sparingly. Calling from the model
    /// thread returns [`EngineError::WouldDeadlock`] instead of hanging, and
    /// an engine shutdown racing the call cancels it cleanly.
    pub fn call<R, F>(&self, f: F) -> Result<R, EngineError>
    where
        R: Send + 'static,
        F: FnOnce(&mut Context<'_>) -> R + Send + 'static,
    {
        if self.is_model_thread() {
            return Err(EngineError::WouldDeadlock);
        }
        let slot = Arc::new(CallSlot {
            state: Mutex::new(CallState::Pending),
            done: Condvar::new(),
        });
        let guard = CallGuard { slot: slot.clone() };
        self.post(move |ctx| {
            let value = f(ctx);
            guard.complete(value);
        })?;

        let mut state = slot.state.lock();
        loop {
            match std::mem::replace(&mut *state, CallState::Pending) {
                CallState::Done(value) => return Ok(value),
                CallState::Cancelled => return Err(EngineError::Disconnected),
                CallState::Pending => slot.done.wait(&mut state),
            }
        }
    }
}

enum CallState<R> {
    Pending,
    Done(R),
    Cancelled,
}

struct CallSlot<R> {
    state: Mutex<CallState<R>>,
    done: Condvar,
}

/// Travels inside the posted closure; completing fills the slot, dropping
/// unexecuted (engine shut down first) cancels it. Either way the caller
/// wakes up.
struct CallGuard<R> {
    slot: Arc<CallSlot<R>>,
}

impl<R> CallGuard<R> {
    fn complete(&self, value: R) {
        *self.slot.state.lock() = CallState::Done(value);
        self.slot.done.notify_all();
    }
}

impl<R> Drop for CallGuard<R> {
    fn drop(&mut self) {
        let mut state = self.slot.state.lock();
        if matches!(*state, CallState::Pending) {
            *state = CallState::Cancelled;
        }
        drop(state);
        self.slot.done.notify_all();
    }
}
