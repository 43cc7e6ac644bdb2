//! # Execution Errors
//!
//! Fatal conditions that stop a run. None of these is a normal outcome:
//! expected failures (nothing found, timed out, not understood) are outcome
//! labels routed through the transition table. An `ExecutionError` means
//! the wiring or a state implementation is wrong, or a preemption is
//! travelling up to a machine that can report it.

use thiserror::Error;

use skillflow_designator::ResolutionFailure;

/// A run stopped without reaching one of the machine's outcomes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// A state returned a label outside its declared outcome set.
    #[error("machine {machine}: state {state} returned {outcome}, which is not one of its outcomes {declared}")]
    OutcomeContractViolation {
        /// The machine running the state.
        machine: String,
        /// The offending state.
        state: String,
        /// The undeclared label.
        outcome: String,
        /// The declared outcome set, rendered.
        declared: String,
    },

    /// No transition exists for a declared outcome.
    ///
    /// Builders reject this for every reachable state, so seeing it at run
    /// time means the transition table was bypassed.
    #[error("machine {machine}: no transition for state {state} outcome {outcome}")]
    MissingTransition {
        /// The machine running the state.
        machine: String,
        /// The state whose outcome is unmapped.
        state: String,
        /// The unmapped outcome.
        outcome: String,
    },

    /// The run was preempted and the machine does not declare a
    /// `preempted` outcome, so the request is passed to its parent.
    #[error("machine {machine} was preempted")]
    Preempted {
        /// The innermost machine that observed the request.
        machine: String,
    },

    /// A state read a key it did not declare as an input.
    #[error("state {state} read undeclared input key {key}")]
    UndeclaredRead {
        /// The reading state.
        state: String,
        /// The state-local key.
        key: String,
    },

    /// A state wrote a key it did not declare as an output.
    #[error("state {state} wrote undeclared output key {key}")]
    UndeclaredWrite {
        /// The writing state.
        state: String,
        /// The state-local key.
        key: String,
    },

    /// A declared input key holds no value.
    #[error("state {state} read key {key}, which holds no value")]
    MissingKey {
        /// The reading state.
        state: String,
        /// The machine-level key after remapping.
        key: String,
    },

    /// A state let a resolution failure escape instead of mapping it to one
    /// of its outcomes.
    #[error("unhandled resolution failure: {0}")]
    UnhandledResolution(#[from] ResolutionFailure),

    /// A state's own collaborator failed in a way the state could not map
    /// to an outcome.
    #[error("state {state} failed: {message}")]
    StateFailure {
        /// The failing state.
        state: String,
        /// What went wrong.
        message: String,
    },
}

impl ExecutionError {
    /// Whether this error is a preemption travelling upward rather than a
    /// defect.
    pub fn is_preemption(&self) -> bool {
        matches!(self, Self::Preempted { .. })
    }
}
