//! Designator resolution properties, exercised through the public API of
//! the designator, machine and states crates together.
//!
//! Covers: one resolution per upstream node per `resolve()` call, variable
//! write/read visibility, projection success and failure, forward-only
//! iteration inside a running machine, and construction-time rejection of
//! incompatible compositions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Map, Value};

use skillflow_core::{ConstructionDefect, Outcome, Selector, ValueType};
use skillflow_designator::{
    Advance, CollaboratorError, Designator, FailureKind, QueryCollaborator, ResolutionFailure,
    SelectionPolicy, SequenceCursor, TransformRegistry, VariableDesignator,
};
use skillflow_machine::{StateMachineBuilder, Transitions, Userdata};
use skillflow_states::{CallbackState, IterateState};

/// Answers every query with the same candidates and counts the calls.
struct CountingWorld {
    candidates: Vec<Value>,
    calls: AtomicUsize,
}

impl CountingWorld {
    fn new(candidates: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            candidates,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl QueryCollaborator for CountingWorld {
    fn name(&self) -> &str {
        "counting_world"
    }

    fn query(&self, _params: &Map<String, Value>) -> Result<Vec<Value>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.candidates.clone())
    }
}

// ── Shared upstreams ─────────────────────────────────────────────────

#[test]
fn diamond_resolves_shared_upstream_once_per_call() {
    let world = CountingWorld::new(vec![json!({"room": "kitchen", "shelf": 2})]);
    let located = Designator::query(world.clone(), ValueType::Any)
        .select(SelectionPolicy::First)
        .named("located")
        .build()
        .unwrap();
    let room = located.field("room").unwrap();
    let shelf = located.field("shelf").unwrap();

    let echo = CountingWorld::new(vec![json!("ok")]);
    let root = Designator::query(echo.clone(), ValueType::String)
        .param_from("room", &room)
        .param_from("shelf", &shelf)
        .select(SelectionPolicy::Unique)
        .build()
        .unwrap();

    assert_eq!(root.resolve().unwrap(), json!("ok"));
    assert_eq!(world.calls(), 1);
    assert_eq!(echo.calls(), 1);

    // No caching across calls.
    root.resolve().unwrap();
    assert_eq!(world.calls(), 2);
}

// ── Variables ────────────────────────────────────────────────────────

#[test]
fn variable_is_unset_until_written() {
    let order = VariableDesignator::new(ValueType::String).named("order");
    let err = order.resolve().unwrap_err();
    assert_eq!(err.kind(), FailureKind::Unset);
    assert_eq!(err.designator(), "order");

    let writer = order.writeable().unwrap();
    writer.write(json!("cola")).unwrap();
    for _ in 0..3 {
        assert_eq!(order.resolve().unwrap(), json!("cola"));
    }
    writer.write(json!("water")).unwrap();
    assert_eq!(order.resolve().unwrap(), json!("water"));
}

#[test]
fn only_one_writer_per_variable() {
    let order = VariableDesignator::new(ValueType::String);
    let _writer = order.writeable().unwrap();
    assert!(matches!(
        order.writeable(),
        Err(ConstructionDefect::WriterAlreadyIssued { .. })
    ));
}

#[test]
fn write_in_one_state_is_visible_to_the_next() {
    let order = VariableDesignator::new(ValueType::String);
    let writer = order.writeable().unwrap();
    let reader = order.designator().clone();
    let seen = Arc::new(parking_lot::Mutex::new(None));
    let seen_by_state = seen.clone();

    let mut machine = StateMachineBuilder::new("TAKE_ORDER", ["done"])
        .add(
            "HEAR",
            CallbackState::new(["heard"], move |_| {
                writer.write(json!("lemonade")).ok();
                Ok(Outcome::from_static("heard"))
            })
            .unwrap(),
            Transitions::new().on("heard", "REPEAT"),
        )
        .add(
            "REPEAT",
            CallbackState::new(["said"], move |_| {
                *seen_by_state.lock() = reader.resolve().ok();
                Ok(Outcome::from_static("said"))
            })
            .unwrap(),
            Transitions::new().on("said", "done"),
        )
        .build()
        .unwrap();

    machine.run(&mut Userdata::new()).unwrap();
    assert_eq!(*seen.lock(), Some(json!("lemonade")));
}

// ── Projection ───────────────────────────────────────────────────────

#[test]
fn projection_selects_field_or_fails() {
    let pair = Designator::constant(json!({"a": 1, "b": 2}));
    assert_eq!(pair.field("b").unwrap().resolve().unwrap(), json!(2));

    let missing = pair.field("c").unwrap();
    let err = missing.resolve().unwrap_err();
    assert!(matches!(err, ResolutionFailure::FieldNotFound { .. }));
}

#[test]
fn projection_of_failing_upstream_reports_the_chain() {
    let person = VariableDesignator::new(ValueType::record([("name", ValueType::String)]))
        .named("person");
    let name = person.field("name").unwrap().named("person_name");
    let err = name.resolve().unwrap_err();
    assert_eq!(err.kind(), FailureKind::UpstreamFailure);
    assert_eq!(err.root_cause().kind(), FailureKind::Unset);
    assert_eq!(err.root_cause().designator(), "person");
}

#[test]
fn incompatible_compositions_fail_at_construction() {
    let count = Designator::constant(json!(3));
    assert!(count.field("x").is_err());
    assert!(count.project(Selector::Index(0)).is_err());

    let registry = TransformRegistry::with_builtins();
    let upper = registry.get("uppercase").unwrap();
    assert!(count.transform(upper).is_err());
}

// ── Iteration ────────────────────────────────────────────────────────

#[test]
fn iteration_inside_a_machine_visits_each_element_once() {
    let guests = Designator::constant(json!(["x", "y", "z"]));
    let guest = VariableDesignator::new(ValueType::String);
    let iterate = IterateState::new(&guests, guest.writeable().unwrap()).unwrap();
    let cursor = iterate.cursor().clone();

    let visited = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let log = visited.clone();
    let reader = guest.designator().clone();

    let mut machine = StateMachineBuilder::new("GREET_ALL", ["done"])
        .add(
            "NEXT_GUEST",
            iterate,
            Transitions::new()
                .on("next", "GREET")
                .on("stop_iteration", "done"),
        )
        .add(
            "GREET",
            CallbackState::new(["greeted"], move |_| {
                if let Ok(value) = reader.resolve() {
                    log.lock().push(value);
                }
                Ok(Outcome::from_static("greeted"))
            })
            .unwrap(),
            Transitions::new().on("greeted", "NEXT_GUEST"),
        )
        .build()
        .unwrap();

    assert_eq!(machine.run(&mut Userdata::new()).unwrap(), "done");
    assert_eq!(*visited.lock(), vec![json!("x"), json!("y"), json!("z")]);

    // Running again without a reset: the cursor stays exhausted.
    assert_eq!(machine.run(&mut Userdata::new()).unwrap(), "done");
    assert_eq!(visited.lock().len(), 3);
    assert!(cursor.is_exhausted());
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z ]{0,12}".prop_map(Value::from),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    prop_oneof![
        scalar(),
        proptest::collection::vec(scalar(), 0..4).prop_map(Value::from),
        proptest::collection::btree_map("[a-z]{1,4}", scalar(), 0..4)
            .prop_map(|m| Value::Object(m.into_iter().collect())),
    ]
}

proptest! {
    #[test]
    fn written_value_is_returned_until_overwritten(first in value(), second in value(), reads in 1usize..5) {
        let slot = VariableDesignator::new(ValueType::Any);
        let writer = slot.writeable().unwrap();

        writer.write(first.clone()).unwrap();
        for _ in 0..reads {
            prop_assert_eq!(slot.resolve().unwrap(), first.clone());
        }
        writer.write(second.clone()).unwrap();
        prop_assert_eq!(slot.resolve().unwrap(), second);
    }

    #[test]
    fn projection_finds_present_keys_only(
        object in proptest::collection::btree_map("[a-z]{1,4}", any::<i64>(), 0..6),
        key in "[a-z]{1,4}",
    ) {
        let record = VariableDesignator::new(ValueType::Any);
        record.writeable().unwrap().write(json!(&object)).unwrap();
        let projected = record.field(key.as_str()).unwrap().resolve();

        match object.get(&key) {
            Some(expected) => prop_assert_eq!(projected.unwrap(), json!(expected)),
            None => prop_assert_eq!(projected.unwrap_err().kind(), FailureKind::FieldNotFound),
        }
    }

    #[test]
    fn cursor_yields_collection_in_order(items in proptest::collection::vec(any::<i32>(), 0..16)) {
        let cursor = SequenceCursor::new(&Designator::constant(json!(&items))).unwrap();

        let mut seen = Vec::new();
        while let Advance::Next(value) = cursor.advance().unwrap() {
            seen.push(value);
        }
        let expected: Vec<Value> = items.iter().map(|i| json!(i)).collect();
        prop_assert_eq!(seen, expected);
        prop_assert!(cursor.is_exhausted());
        prop_assert_eq!(cursor.advance().unwrap(), Advance::StopIteration);
    }
}
