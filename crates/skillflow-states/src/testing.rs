//! Helpers for executing a single state outside a machine.

use skillflow_core::{Outcome, StateName};
use skillflow_machine::{ExecutionContext, ExecutionError, KeyAccess, PreemptSignal, State, Userdata};

/// Execute `state` once with an empty scope and a lowered signal.
pub(crate) fn execute_once(state: &mut dyn State) -> Result<Outcome, ExecutionError> {
    execute_with(state, &mut Userdata::new(), &PreemptSignal::new())
}

/// Execute `state` once over `store` with `signal`.
pub(crate) fn execute_with(
    state: &mut dyn State,
    store: &mut Userdata,
    signal: &PreemptSignal,
) -> Result<Outcome, ExecutionError> {
    let name = StateName::new("UNDER_TEST").unwrap();
    let access = KeyAccess::identity(&*state);
    let mut ctx = ExecutionContext::new(&name, store, &access, signal);
    state.execute(&mut ctx)
}
