//! # State Contract
//!
//! Every executable step implements [`State`]: a closed set of outcome
//! labels fixed at construction and an `execute` that returns exactly one
//! of them. A [`crate::StateMachine`] implements the same trait, which is
//! what makes machines nest.
//!
//! ## Rules for implementors
//!
//! - `outcomes()` must return the same set for the lifetime of the state.
//! - `execute()` must return a label from `outcomes()`. Anything else stops
//!   the enclosing run with `OutcomeContractViolation`.
//! - A failed designator resolution is an expected condition: map it to a
//!   declared outcome (usually `failed`). Propagating it with `?` turns it
//!   into the fatal `UnhandledResolution`.
//! - Internal counters and cursors persist across executions. Nothing is
//!   reset between two visits of the same state unless the state does it.

use skillflow_core::{KeyName, Outcome, OutcomeSet};

use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::machine::StateMachine;

/// One executable step of a machine.
pub trait State: Send {
    /// The closed set of labels `execute` may return.
    fn outcomes(&self) -> &OutcomeSet;

    /// Userdata keys this state reads.
    fn input_keys(&self) -> &[KeyName] {
        &[]
    }

    /// Userdata keys this state writes.
    fn output_keys(&self) -> &[KeyName] {
        &[]
    }

    /// Run the step once.
    fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecutionError>;

    /// Short description of the kind of state, shown in outlines.
    fn kind(&self) -> &str {
        "state"
    }

    /// The nested machine, when this state is one.
    fn as_machine(&self) -> Option<&StateMachine> {
        None
    }
}

impl<S: State + ?Sized> State for Box<S> {
    fn outcomes(&self) -> &OutcomeSet {
        (**self).outcomes()
    }

    fn input_keys(&self) -> &[KeyName] {
        (**self).input_keys()
    }

    fn output_keys(&self) -> &[KeyName] {
        (**self).output_keys()
    }

    fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecutionError> {
        (**self).execute(ctx)
    }

    fn kind(&self) -> &str {
        (**self).kind()
    }

    fn as_machine(&self) -> Option<&StateMachine> {
        (**self).as_machine()
    }
}
