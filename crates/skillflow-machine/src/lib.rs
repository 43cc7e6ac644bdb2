//! # skillflow-machine — Hierarchical State Machines
//!
//! Composes named [`State`]s into a directed transition graph and runs it.
//! A built [`StateMachine`] is itself a `State`, so machines nest with no
//! special casing: the parent sees only the child's exposed outcomes.
//!
//! ## Layers
//!
//! - **State contract** (`state.rs`): declared outcomes, declared userdata
//!   keys, `execute`.
//! - **Execution context** (`context.rs`): per-machine [`Userdata`] scope
//!   seen through declared, optionally remapped keys.
//! - **Transition tables** (`transition.rs`): per-state outcome routing and
//!   key remapping, plus the [`TransitionRecord`] history.
//! - **Builder** (`builder.rs`): validates the whole graph before anything
//!   runs and reports every [`skillflow_core::ConstructionDefect`] at once.
//! - **Executor** (`machine.rs`): runs states sequentially on the caller's
//!   thread, enforces the outcome contract, and honors [`PreemptSignal`]
//!   between states.
//!
//! ## Failure model
//!
//! The executor has no concept of an "error outcome". `failed`, `timeout`
//! and `not_understood` are ordinary labels routed through the table like
//! any other. [`ExecutionError`] is reserved for wiring bugs, contract
//! violations and preemption.

pub mod builder;
pub mod context;
pub mod error;
pub mod machine;
pub mod preempt;
pub mod state;
pub mod transition;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::StateMachineBuilder;
pub use context::{ExecutionContext, KeyAccess, Userdata};
pub use error::ExecutionError;
pub use machine::{MachineOutline, MachineStatus, StateMachine, StateOutline};
pub use preempt::PreemptSignal;
pub use state::State;
pub use transition::{Remapping, TransitionRecord, Transitions};
