mod common;

use common::testing::{fixture, new_log, Alias, Increment, Number, Probe};
use patchbay::connection::PointerBehavior;
use patchbay::errors::PatchError;
use patchbay::machine::Machine;
use patchbay::scheduler::Context;
use patchbay::types::Vec2;

#[test]
fn connect_registers_the_edge_on_both_sides() {
    let (mut patch, mut scheduler) = fixture();
    let root = patch.root();
    let a = patch.create_in(root, &Number::new(0.0), "a").unwrap();
    let b = patch.create_in(root, &Number::new(0.0), "b").unwrap();

    let mut ctx = Context::new(&mut patch, &mut scheduler);
    let id = ctx.connect(a, b, "out", PointerBehavior::FollowPointers).unwrap();

    assert_eq!(patch.location(a).unwrap().connections_out("out"), &[id]);
    assert_eq!(patch.location(b).unwrap().connections_in("out"), &[id]);
    let conn = patch.connection(id).unwrap();
    assert_eq!(conn.from(), a);
    assert_eq!(conn.to(), b);
    assert_eq!(conn.label(), "out");
}

#[test]
fn disconnect_removes_the_edge_from_both_sides() {
    let (mut patch, mut scheduler) = fixture();
    let root = patch.root();
    let a = patch.create_in(root, &Number::new(0.0), "a").unwrap();
    let b = patch.create_in(root, &Number::new(0.0), "b").unwrap();

    let mut ctx = Context::new(&mut patch, &mut scheduler);
    let id = ctx.connect(a, b, "out", PointerBehavior::FollowPointers).unwrap();

    patch.disconnect(id).unwrap();
    assert!(patch.location(a).unwrap().connections_out("out").is_empty());
    assert!(patch.location(b).unwrap().connections_in("out").is_empty());
    assert!(matches!(
        patch.connection(id),
        Err(PatchError::MissingConnection(_))
    ));
}

#[test]
fn parallel_edges_under_one_label_are_permitted() {
    let (mut patch, mut scheduler) = fixture();
    let root = patch.root();
    let a = patch.create_in(root, &Number::new(0.0), "a").unwrap();
    let b = patch.create_in(root, &Number::new(0.0), "b").unwrap();

    let mut ctx = Context::new(&mut patch, &mut scheduler);
    let first = ctx.connect(a, b, "out", PointerBehavior::FollowPointers).unwrap();
    let second = ctx.connect(a, b, "out", PointerBehavior::FollowPointers).unwrap();

    assert_ne!(first, second);
    assert_eq!(patch.location(a).unwrap().connections_out("out").len(), 2);
}

#[test]
fn connecting_from_an_empty_location_fails() {
    let (mut patch, mut scheduler) = fixture();
    let root = patch.root();
    let empty = patch.add_in(root, "empty").unwrap();
    let b = patch.create_in(root, &Number::new(0.0), "b").unwrap();

    let mut ctx = Context::new(&mut patch, &mut scheduler);
    assert!(matches!(
        ctx.connect(empty, b, "out", PointerBehavior::FollowPointers),
        Err(PatchError::EmptyLocation(_))
    ));
}

#[test]
fn satisfied_concrete_argument_terminates_pointer_traversal() {
    let (mut patch, mut scheduler) = fixture();
    let root = patch.root();
    let inc = patch.create_in(root, &Increment, "inc").unwrap();
    let x = patch.create_in(root, &Number::new(0.0), "x").unwrap();

    let mut ctx = Context::new(&mut patch, &mut scheduler);
    let id = ctx
        .connect(inc, x, "target", PointerBehavior::FollowPointers)
        .unwrap();
    assert_eq!(
        patch.connection(id).unwrap().pointer_behavior(),
        PointerBehavior::TerminateHere
    );
}

#[test]
fn unsatisfied_concrete_argument_keeps_requested_behavior() {
    let (mut patch, mut scheduler) = fixture();
    let log = new_log();
    let root = patch.root();
    let inc = patch.create_in(root, &Increment, "inc").unwrap();
    // A probe renders no text, so it does not qualify as numeric.
    let probe = patch.create_in(root, &Probe::new(&log), "probe").unwrap();

    let mut ctx = Context::new(&mut patch, &mut scheduler);
    let id = ctx
        .connect(inc, probe, "target", PointerBehavior::FollowPointers)
        .unwrap();
    assert_eq!(
        patch.connection(id).unwrap().pointer_behavior(),
        PointerBehavior::FollowPointers
    );
}

#[test]
fn alias_forwards_follow_text_put_and_take() {
    let (mut patch, _scheduler) = fixture();
    let root = patch.root();
    let x = patch.create_in(root, &Number::new(7.0), "x").unwrap();
    let a = patch.add_in(root, "a").unwrap();
    patch.place(a, Box::new(Alias::to(x))).unwrap();

    assert_eq!(patch.follow(a), x);
    assert_eq!(patch.get_text(a), "7");

    patch.put(a, Box::new(Number::new(9.0))).unwrap();
    assert_eq!(patch.number(x), Some(9.0));

    let taken = patch.take(a).unwrap().unwrap();
    assert_eq!(taken.get_text(), "9");
    assert!(patch.location(x).unwrap().object().is_none());
}

#[test]
fn put_into_an_empty_location_does_not_follow() {
    let (mut patch, _scheduler) = fixture();
    let root = patch.root();
    let a = patch.add_in(root, "a").unwrap();

    patch.put(a, Box::new(Number::new(1.0))).unwrap();
    assert_eq!(patch.number(a), Some(1.0));
}

#[test]
fn pointer_cycles_terminate() {
    let (mut patch, _scheduler) = fixture();
    let root = patch.root();
    let a = patch.add_in(root, "a").unwrap();
    let b = patch.add_in(root, "b").unwrap();
    patch.place(a, Box::new(Alias::to(b))).unwrap();
    patch.place(b, Box::new(Alias::to(a))).unwrap();

    // The chase stops at the first revisited location.
    assert_eq!(patch.follow(a), a);
    assert_eq!(patch.follow(b), b);
}

#[test]
fn nearby_visits_all_siblings_including_self() {
    let (mut patch, _scheduler) = fixture();
    let root = patch.root();
    let a = patch.create_in(root, &Number::new(0.0), "a").unwrap();
    patch.create_in(root, &Number::new(0.0), "b").unwrap();
    patch.create_in(root, &Number::new(0.0), "c").unwrap();

    let mut names = Vec::new();
    let found: Option<()> = patch.nearby(a, |sibling| {
        names.push(sibling.name().to_string());
        None
    });
    assert!(found.is_none());
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn argument_resolution_falls_back_to_sibling_names() {
    let (mut patch, mut scheduler) = fixture();
    let root = patch.root();
    let inc = patch.create_in(root, &Increment, "inc").unwrap();
    // No connection; a sibling named like the argument is found instead.
    let x = patch.create_in(root, &Number::new(0.0), "target").unwrap();

    let mut ctx = Context::new(&mut patch, &mut scheduler);
    ctx.schedule_run(inc);
    scheduler.run_loop(&mut patch);

    assert_eq!(patch.number(x), Some(1.0));
    assert!(patch.fault(inc).is_none());
}

#[test]
fn remove_location_unlinks_connections_and_observers() {
    let (mut patch, mut scheduler) = fixture();
    let root = patch.root();
    let a = patch.create_in(root, &Number::new(0.0), "a").unwrap();
    let b = patch.create_in(root, &Number::new(0.0), "b").unwrap();

    let mut ctx = Context::new(&mut patch, &mut scheduler);
    let out = ctx.connect(a, b, "out", PointerBehavior::FollowPointers).unwrap();
    let back = ctx.connect(b, a, "back", PointerBehavior::FollowPointers).unwrap();
    patch.observe_updates(a, b).unwrap();
    patch.observe_errors(b, a).unwrap();

    patch.remove_location(a).unwrap();

    assert!(!patch.contains(a));
    assert!(patch.connection(out).is_err());
    assert!(patch.connection(back).is_err());
    let b_loc = patch.location(b).unwrap();
    assert!(b_loc.connections_in("out").is_empty());
    assert!(b_loc.connections_out("back").is_empty());
    assert_eq!(b_loc.update_observers().count(), 0);
    assert_eq!(patch.machine(root).unwrap().locations(), &[b]);
}

#[test]
fn removing_a_machine_removes_its_subtree() {
    let (mut patch, _scheduler) = fixture();
    let root = patch.root();
    let m = patch.create_in(root, &Machine::new("m"), "m").unwrap();
    let inner = patch.create_in(m, &Machine::new("inner"), "inner").unwrap();
    let leaf = patch.create_in(inner, &Number::new(0.0), "leaf").unwrap();

    patch.remove_location(m).unwrap();

    assert!(!patch.contains(m));
    assert!(!patch.contains(inner));
    assert!(!patch.contains(leaf));
    assert!(patch.machine(root).unwrap().locations().is_empty());
}

#[test]
fn duplicate_copies_subtree_and_replays_connections() {
    let (mut patch, mut scheduler) = fixture();
    let root = patch.root();
    let m = patch.create_in(root, &Machine::new("m"), "m").unwrap();
    let x = patch.create_in(m, &Number::new(3.0), "x").unwrap();
    let y = patch.create_in(m, &Number::new(4.0), "y").unwrap();
    patch.set_position(x, Vec2::new(1.0, 2.0)).unwrap();

    let mut ctx = Context::new(&mut patch, &mut scheduler);
    ctx.connect(x, y, "out", PointerBehavior::FollowPointers).unwrap();

    let copy = patch.duplicate(m).unwrap();
    assert_ne!(copy, m);

    let children = patch.machine(copy).unwrap().locations().to_vec();
    assert_eq!(children.len(), 2);
    let copy_x = children[0];
    let copy_y = children[1];
    assert_eq!(patch.location(copy_x).unwrap().name(), "x");
    assert_eq!(patch.number(copy_x), Some(3.0));
    assert_eq!(patch.location(copy_x).unwrap().position(), Vec2::new(1.0, 2.0));

    // The internal edge is replayed between the copies, not the originals.
    let edges = patch.location(copy_x).unwrap().connections_out("out").to_vec();
    assert_eq!(edges.len(), 1);
    assert_eq!(patch.connection(edges[0]).unwrap().to(), copy_y);
    assert_eq!(patch.location(x).unwrap().connections_out("out").len(), 1);

    // Copies are independent.
    let mut ctx = Context::new(&mut patch, &mut scheduler);
    ctx.set_number(copy_x, 30.0);
    assert_eq!(patch.number(x), Some(3.0));
}

#[test]
fn duplicating_the_root_is_rejected() {
    let (mut patch, _scheduler) = fixture();
    let root = patch.root();
    assert!(matches!(
        patch.duplicate(root),
        Err(PatchError::Detached(_))
    ));
}

#[test]
fn rename_and_describe() {
    let (mut patch, _scheduler) = fixture();
    let root = patch.root();
    let x = patch.create_in(root, &Number::new(0.0), "x").unwrap();

    assert_eq!(patch.describe(x), "Number \"x\"");
    patch.rename(x, "counter").unwrap();
    assert_eq!(patch.describe(x), "Number \"counter\"");
    assert_eq!(patch.location(x).unwrap().name(), "counter");
}
