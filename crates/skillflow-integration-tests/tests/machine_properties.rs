//! Executor properties across crate boundaries: construction rejects bad
//! wiring before anything runs, linear machines execute each state once,
//! preemption stops at state boundaries, and nested machines are opaque to
//! their parents.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use skillflow_core::{ConstructionDefect, Outcome};
use skillflow_machine::{
    ExecutionError, MachineStatus, Remapping, StateMachine, StateMachineBuilder,
    Transitions, Userdata,
};
use skillflow_states::{CallbackState, FixedOutcome};

/// A state returning `outcome` and counting its executions.
fn counted(outcomes: &[&str], outcome: &'static str, count: &Arc<AtomicUsize>) -> CallbackState {
    let count = count.clone();
    CallbackState::new(outcomes.iter().copied(), move |_| {
        count.fetch_add(1, Ordering::SeqCst);
        Ok(Outcome::from_static(outcome))
    })
    .unwrap()
}

fn counters<const N: usize>() -> [Arc<AtomicUsize>; N] {
    std::array::from_fn(|_| Arc::new(AtomicUsize::new(0)))
}

fn runs(count: &Arc<AtomicUsize>) -> usize {
    count.load(Ordering::SeqCst)
}

// ── Construction ─────────────────────────────────────────────────────

#[test]
fn transition_to_undeclared_state_fails_before_execution() {
    let [a] = counters();
    let result = StateMachineBuilder::new("M", ["done"])
        .add("A", counted(&["ok"], "ok", &a), Transitions::new().on("ok", "MISSING"))
        .build();
    let err = result.err().unwrap();
    assert!(err.has(|d| matches!(
        d,
        ConstructionDefect::UnknownTarget { target, .. } if target == "MISSING"
    )));
    assert_eq!(runs(&a), 0);
}

#[test]
fn unreachable_outcome_and_missing_transition_are_defects() {
    let err = StateMachineBuilder::new("M", ["done", "failed"])
        .add("A", FixedOutcome::new("ok").unwrap(), Transitions::new().on("ok", "done"))
        .add(
            "B",
            CallbackState::new(["x", "y"], |_| Ok(Outcome::from_static("x"))).unwrap(),
            Transitions::new().on("x", "failed"),
        )
        .build()
        .err()
        .unwrap();
    // B is unreachable, so its missing `y` transition is not reported and
    // `failed` can never be produced.
    assert!(err.has(|d| matches!(d, ConstructionDefect::UnreachableOutcome { outcome } if outcome == "failed")));
    assert!(!err.has(|d| matches!(d, ConstructionDefect::MissingTransition { .. })));
}

// ── Linear execution ─────────────────────────────────────────────────

#[test]
fn three_state_chain_runs_each_state_once() {
    let [a, b, c] = counters();
    let mut machine = StateMachineBuilder::new("CHAIN", ["done"])
        .add("A", counted(&["ok"], "ok", &a), Transitions::new().on("ok", "B"))
        .add("B", counted(&["ok"], "ok", &b), Transitions::new().on("ok", "C"))
        .add("C", counted(&["done"], "done", &c), Transitions::new().on("done", "done"))
        .build()
        .unwrap();

    assert_eq!(machine.status(), &MachineStatus::Constructed);
    assert_eq!(machine.run(&mut Userdata::new()).unwrap(), "done");
    assert_eq!((runs(&a), runs(&b), runs(&c)), (1, 1, 1));

    let path: Vec<String> = machine.history().iter().map(|r| r.to_string()).collect();
    assert_eq!(
        path,
        [
            "CHAIN: A --ok--> B",
            "CHAIN: B --ok--> C",
            "CHAIN: C --done==> done"
        ]
    );
    assert!(machine.status().is_terminal());
}

#[test]
fn undeclared_outcome_aborts_the_run() {
    let mut machine = StateMachineBuilder::new("M", ["done"])
        .add(
            "LIAR",
            CallbackState::new(["ok"], |_| Ok(Outcome::from_static("surprise"))).unwrap(),
            Transitions::new().on("ok", "done"),
        )
        .build()
        .unwrap();
    let err = machine.run(&mut Userdata::new()).unwrap_err();
    assert!(matches!(
        err,
        ExecutionError::OutcomeContractViolation { ref state, ref outcome, .. }
            if state == "LIAR" && outcome == "surprise"
    ));
    assert_eq!(machine.status(), &MachineStatus::Faulted);
}

// ── Preemption ───────────────────────────────────────────────────────

fn preempting_pair(declares_preempted: bool) -> (StateMachine, Arc<AtomicUsize>) {
    let [b] = counters();
    let outcomes: Vec<&str> = if declares_preempted {
        vec!["done", "preempted"]
    } else {
        vec!["done"]
    };
    let machine = StateMachineBuilder::new("PAIR", outcomes)
        .add(
            "A",
            CallbackState::new(["ok"], move |ctx| {
                ctx.preempt_signal().request();
                Ok(Outcome::from_static("ok"))
            })
            .unwrap(),
            Transitions::new().on("ok", "B"),
        )
        .add("B", counted(&["ok"], "ok", &b), Transitions::new().on("ok", "done"))
        .build()
        .unwrap();
    (machine, b)
}

#[test]
fn preemption_between_states_skips_the_next_state() {
    let (mut machine, b) = preempting_pair(true);
    assert_eq!(machine.run(&mut Userdata::new()).unwrap(), "preempted");
    assert_eq!(runs(&b), 0);
    assert_eq!(machine.status(), &MachineStatus::Preempted);
    // The signal is lowered once the run ends.
    assert!(!machine.preempt_signal().is_requested());
}

#[test]
fn preemption_without_declared_outcome_propagates() {
    let (mut machine, b) = preempting_pair(false);
    let err = machine.run(&mut Userdata::new()).unwrap_err();
    assert!(err.is_preemption());
    assert_eq!(runs(&b), 0);
}

#[test]
fn external_signal_raised_before_run_stops_immediately() {
    let [a] = counters();
    let mut machine = StateMachineBuilder::new("M", ["done", "preempted"])
        .add("A", counted(&["ok"], "ok", &a), Transitions::new().on("ok", "done"))
        .build()
        .unwrap();
    machine.preempt_signal().request();
    assert_eq!(machine.run(&mut Userdata::new()).unwrap(), "preempted");
    assert_eq!(runs(&a), 0);
}

// ── Nesting ──────────────────────────────────────────────────────────

fn grab_machine() -> StateMachine {
    StateMachineBuilder::new("GRAB", ["succeeded", "failed"])
        .add(
            "REACH",
            FixedOutcome::new("reached").unwrap(),
            Transitions::new().on("reached", "CLOSE_GRIPPER"),
        )
        .add(
            "CLOSE_GRIPPER",
            CallbackState::new(["closed", "slipped"], |_| Ok(Outcome::from_static("slipped")))
                .unwrap(),
            Transitions::new().on("closed", "succeeded").on("slipped", "failed"),
        )
        .build()
        .unwrap()
}

#[test]
fn parent_sees_only_the_nested_outcome() {
    let [recover] = counters();
    let mut parent = StateMachineBuilder::new("SERVE", ["done", "aborted"])
        .add(
            "GRAB",
            grab_machine(),
            Transitions::new().on("succeeded", "done").on("failed", "RECOVER"),
        )
        .add(
            "RECOVER",
            counted(&["recovered"], "recovered", &recover),
            Transitions::new().on("recovered", "aborted"),
        )
        .build()
        .unwrap();

    assert_eq!(parent.run(&mut Userdata::new()).unwrap(), "aborted");
    assert_eq!(runs(&recover), 1);

    let parent_path: Vec<(String, String)> = parent
        .history()
        .iter()
        .map(|r| (r.from.to_string(), r.outcome.to_string()))
        .collect();
    assert_eq!(
        parent_path,
        [
            ("GRAB".to_string(), "failed".to_string()),
            ("RECOVER".to_string(), "recovered".to_string())
        ]
    );
    assert!(parent.history().iter().all(|r| r.machine == "SERVE"));
}

#[test]
fn nested_scope_uses_remapped_keys() {
    let inner = StateMachineBuilder::new("LOOKUP", ["found"])
        .input_keys(["name"])
        .output_keys(["drink"])
        .add_with_remapping(
            "ASK",
            CallbackState::new(["found"], |ctx| {
                let guest = ctx.read("guest")?;
                let drink = if guest == "sam" { "tea" } else { "water" };
                ctx.write("drink", serde_json::json!(drink))?;
                Ok(Outcome::from_static("found"))
            })
            .unwrap()
            .with_keys(["guest"], ["drink"])
            .unwrap(),
            Transitions::new().on("found", "found"),
            Remapping::new().map("guest", "name"),
        )
        .build()
        .unwrap();

    let mut outer = StateMachineBuilder::new("HOST", ["done"])
        .input_keys(["person"])
        .output_keys(["order"])
        .add_with_remapping(
            "LOOKUP",
            inner,
            Transitions::new().on("found", "done"),
            Remapping::new().map("name", "person").map("drink", "order"),
        )
        .build()
        .unwrap();

    let mut userdata: Userdata = [(
        skillflow_core::KeyName::new("person").unwrap(),
        serde_json::json!("sam"),
    )]
    .into_iter()
    .collect();
    assert_eq!(outer.run(&mut userdata).unwrap(), "done");
    assert_eq!(userdata.get("order"), Some(&serde_json::json!("tea")));
    assert!(!userdata.contains_key("drink"));
}
