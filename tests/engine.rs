mod common;

use std::sync::Arc;

use parking_lot::Mutex;

use common::testing::{Increment, Number};
use patchbay::connection::PointerBehavior;
use patchbay::engine::{Engine, EngineConfig};
use patchbay::errors::EngineError;
use patchbay::patch::Patch;

#[test]
fn stop_hands_the_patch_back() {
    let engine = Engine::start(Patch::new()).unwrap();
    let patch = engine.stop().expect("clean shutdown returns the patch");
    assert!(patch.contains(patch.root()));
}

#[test]
fn post_is_visible_to_a_later_call() {
    let engine = Engine::start(Patch::new()).unwrap();
    let handle = engine.handle();

    handle
        .post(|ctx| {
            let root = ctx.patch.root();
            ctx.patch.create_in(root, &Number::new(42.0), "x").unwrap();
        })
        .unwrap();

    // Channel sends are FIFO: the read observes the earlier mutation.
    let value = handle
        .call(|ctx| {
            let root = ctx.patch.root();
            let x = ctx.patch.machine(root).unwrap().locations()[0];
            ctx.patch.number(x)
        })
        .unwrap();
    assert_eq!(value, Some(42.0));
}

#[test]
fn call_blocks_until_the_mutation_is_applied() {
    let engine = Engine::start(Patch::new()).unwrap();
    let handle = engine.handle();

    let len = handle
        .call(|ctx| {
            let root = ctx.patch.root();
            ctx.patch.create_in(root, &Number::new(1.0), "a").unwrap();
            ctx.patch.create_in(root, &Number::new(2.0), "b").unwrap();
            ctx.patch.len()
        })
        .unwrap();
    // Root + the two just created, observed synchronously.
    assert_eq!(len, 3);
}

#[test]
fn blocking_call_from_the_model_thread_is_refused() {
    let engine = Engine::start(Patch::new()).unwrap();
    let handle = engine.handle();

    let inner = handle.clone();
    let refused = handle
        .call(move |_ctx| matches!(inner.call(|_| ()), Err(EngineError::WouldDeadlock)))
        .unwrap();
    assert!(refused);
}

#[test]
fn posting_from_the_model_thread_defers_instead_of_deadlocking() {
    let engine = Engine::start(Patch::new()).unwrap();
    let handle = engine.handle();

    let inner = handle.clone();
    let marker: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let posted = marker.clone();
    handle
        .post(move |_ctx| {
            posted.lock().push("first");
            let posted = posted.clone();
            inner
                .post(move |_ctx| posted.lock().push("second"))
                .unwrap();
        })
        .unwrap();

    // A blocking round-trip drains the channel behind both posts.
    handle.call(|_| ()).unwrap();
    handle.call(|_| ()).unwrap();
    assert_eq!(*marker.lock(), vec!["first", "second"]);
}

#[test]
fn handle_reports_disconnection_after_stop() {
    let engine = Engine::start(Patch::new()).unwrap();
    let handle = engine.handle();
    engine.stop();

    assert!(matches!(
        handle.post(|_| ()),
        Err(EngineError::Disconnected)
    ));
    assert!(matches!(
        handle.call(|_| ()),
        Err(EngineError::Disconnected)
    ));
}

#[test]
fn increment_scenario_through_the_engine() {
    let engine = Engine::start_with(Patch::new(), EngineConfig::default()).unwrap();
    let handle = engine.handle();

    handle
        .post(|ctx| {
            let root = ctx.patch.root();
            let x = ctx.patch.create_in(root, &Number::new(0.0), "x").unwrap();
            let inc = ctx.patch.create_in(root, &Increment, "inc").unwrap();
            ctx.connect(inc, x, "target", PointerBehavior::FollowPointers)
                .unwrap();
            ctx.schedule_run(inc);
        })
        .unwrap();

    let value = handle
        .call(|ctx| {
            let root = ctx.patch.root();
            let x = ctx.patch.machine(root).unwrap().locations()[0];
            ctx.patch.number(x)
        })
        .unwrap();
    assert_eq!(value, Some(1.0));

    let patch = engine.stop().unwrap();
    assert_eq!(patch.len(), 3);
}

#[test]
fn posts_from_one_thread_apply_in_order() {
    let engine = Engine::start(Patch::new()).unwrap();
    let handle = engine.handle();
    let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));

    for i in 0..10 {
        let seen = seen.clone();
        handle.post(move |_| seen.lock().push(i)).unwrap();
    }
    handle.call(|_| ()).unwrap();
    assert_eq!(*seen.lock(), (0..10).collect::<Vec<_>>());
}

#[test]
fn foreign_thread_round_trip() {
    let engine = Engine::start(Patch::new()).unwrap();
    let handle = engine.handle();

    let worker = std::thread::spawn(move || {
        handle
            .call(|ctx| {
                let root = ctx.patch.root();
                ctx.patch
                    .create_in(root, &Number::new(5.0), "from-worker")
                    .unwrap();
                ctx.patch.len()
            })
            .unwrap()
    });
    assert_eq!(worker.join().unwrap(), 2);

    let patch = engine.stop().unwrap();
    assert_eq!(patch.len(), 2);
}

#[test]
fn task_panic_is_engine_fatal() {
    let engine = Engine::start(Patch::new()).unwrap();
    let handle = engine.handle();

    handle.post(|_| panic!("task blew up")).unwrap();
    // The model thread unwound; the patch is lost.
    assert!(engine.stop().is_none());
}
