//! # Construction Defects
//!
//! Defines the errors that can be detected before anything executes. All
//! errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! - Label errors name the kind of label and the offending input.
//! - Construction defects name the state, outcome, key, or designator
//!   involved, so a wiring bug can be located from the message alone.
//! - A machine builder collects every defect it finds into one
//!   [`ConstructionError`] instead of stopping at the first.
//!
//! Run-time failures (resolution failures, contract violations during a
//! run) live with the crates that produce them.

use thiserror::Error;

/// A label or outcome set failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelError {
    /// The label is the empty string.
    #[error("{kind} must not be empty")]
    Empty {
        /// Which kind of label ("state name", "outcome", "key").
        kind: &'static str,
    },

    /// The label exceeds the maximum length.
    #[error("{kind} is {len} bytes long (maximum is {max})", max = crate::label::MAX_LABEL_LEN)]
    TooLong {
        /// Which kind of label.
        kind: &'static str,
        /// Actual length in bytes.
        len: usize,
    },

    /// The label contains a character outside `[A-Za-z0-9_-]`.
    #[error("{kind} {label:?} contains invalid character {ch:?}")]
    InvalidCharacter {
        /// Which kind of label.
        kind: &'static str,
        /// The rejected input.
        label: String,
        /// The first offending character.
        ch: char,
    },

    /// The same outcome label was declared twice.
    #[error("outcome {label:?} declared more than once")]
    Duplicate {
        /// The repeated label.
        label: String,
    },

    /// An outcome set with no labels.
    #[error("outcome set must declare at least one outcome")]
    EmptySet,
}

/// A wiring mistake detectable before execution.
///
/// These are bugs in the code that assembles machines and designators, not
/// run-time conditions. They are never recovered from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionDefect {
    /// A state name, outcome label, or key failed validation.
    #[error("invalid label in {context}: {source}")]
    InvalidLabel {
        /// Where the label was found.
        context: String,
        /// The validation failure.
        source: LabelError,
    },

    /// Two states were added under the same name.
    #[error("state {state} added more than once")]
    DuplicateState {
        /// The repeated name.
        state: String,
    },

    /// A machine was built without any states.
    #[error("machine has no states")]
    NoStates,

    /// The declared initial state does not exist.
    #[error("initial state {state} is not a state of this machine")]
    UnknownInitialState {
        /// The missing initial state.
        state: String,
    },

    /// A transition was declared for an outcome the state cannot return.
    #[error("state {state} has a transition for {outcome}, which is not one of its outcomes {declared}")]
    UndeclaredOutcome {
        /// The state the transition belongs to.
        state: String,
        /// The undeclared outcome.
        outcome: String,
        /// The state's declared outcome set, rendered.
        declared: String,
    },

    /// A reachable state has a declared outcome with no transition.
    #[error("state {state} has no transition for its outcome {outcome}")]
    MissingTransition {
        /// The state lacking the transition.
        state: String,
        /// The unmapped outcome.
        outcome: String,
    },

    /// The same outcome of one state was given two transitions.
    #[error("state {state} has more than one transition for {outcome}")]
    DuplicateTransition {
        /// The state the transitions belong to.
        state: String,
        /// The repeated outcome.
        outcome: String,
    },

    /// A transition targets neither a state nor an exposed outcome.
    #[error("transition {state} --{outcome}--> {target}: {target} is neither a state nor an outcome of this machine")]
    UnknownTarget {
        /// Source state.
        state: String,
        /// Outcome that triggers the transition.
        outcome: String,
        /// The unresolvable target.
        target: String,
    },

    /// A transition target names both a state and an exposed outcome.
    #[error("transition {state} --{outcome}--> {target}: {target} is both a state and an outcome of this machine")]
    AmbiguousTarget {
        /// Source state.
        state: String,
        /// Outcome that triggers the transition.
        outcome: String,
        /// The ambiguous target.
        target: String,
    },

    /// An exposed outcome of the machine can never be produced.
    #[error("machine outcome {outcome} is not reachable from the initial state")]
    UnreachableOutcome {
        /// The unreachable outcome.
        outcome: String,
    },

    /// A remapping entry names a key the state does not declare.
    #[error("state {state} remaps {key}, which is neither an input nor an output key of the state")]
    UnknownRemapKey {
        /// The state being added.
        state: String,
        /// The undeclared key.
        key: String,
    },

    /// A child reads a key nobody provides.
    #[error("state {state} reads key {key}, which is neither a machine input key nor written by any state")]
    UnsatisfiedInputKey {
        /// The reading state.
        state: String,
        /// The machine-level key after remapping.
        key: String,
    },

    /// A machine promises an output key no child writes.
    #[error("machine output key {key} is not written by any state")]
    UnproducedOutputKey {
        /// The missing key.
        key: String,
    },

    /// Two designators were composed in a way that can never resolve.
    #[error("designator {designator}: {detail}")]
    IncompatibleComposition {
        /// Name of the designator being built.
        designator: String,
        /// What is incompatible.
        detail: String,
    },

    /// A value does not match the declared type of its designator.
    #[error("designator {designator} declares {expected} but was given {found}")]
    TypeMismatch {
        /// Name of the designator.
        designator: String,
        /// The declared type, rendered.
        expected: String,
        /// The offending value or type, rendered.
        found: String,
    },

    /// A second write capability was requested for a variable.
    #[error("designator {designator} already issued its write handle")]
    WriterAlreadyIssued {
        /// Name of the variable.
        designator: String,
    },

    /// A transform name is not in the registry.
    #[error("no transform named {name} is registered")]
    UnknownTransform {
        /// The requested name.
        name: String,
    },

    /// A transform name was registered twice.
    #[error("transform {name} is already registered")]
    DuplicateTransform {
        /// The repeated name.
        name: String,
    },

    /// An external query was built without an explicit selection policy.
    #[error("query designator {designator} has no selection policy")]
    MissingSelectionPolicy {
        /// Name of the query designator.
        designator: String,
    },

    /// A state rejected one of its construction parameters.
    #[error("state {state}: {detail}")]
    InvalidParameter {
        /// The state (or state kind) being constructed.
        state: String,
        /// What is wrong with the parameter.
        detail: String,
    },
}

impl ConstructionDefect {
    /// Wrap a label error with the place it was found.
    pub fn label(context: impl Into<String>, source: LabelError) -> Self {
        Self::InvalidLabel {
            context: context.into(),
            source,
        }
    }
}

/// Every defect found while building one machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("machine {machine} has {count} construction defect(s): {rendered}", count = .defects.len(), rendered = render(.defects))]
pub struct ConstructionError {
    /// Name of the machine being built.
    pub machine: String,
    /// All defects, in the order they were detected.
    pub defects: Vec<ConstructionDefect>,
}

impl ConstructionError {
    /// An error carrying a single defect.
    pub fn single(machine: impl Into<String>, defect: ConstructionDefect) -> Self {
        Self {
            machine: machine.into(),
            defects: vec![defect],
        }
    }

    /// Whether any collected defect matches `predicate`.
    pub fn has(&self, predicate: impl Fn(&ConstructionDefect) -> bool) -> bool {
        self.defects.iter().any(predicate)
    }
}

fn render(defects: &[ConstructionDefect]) -> String {
    defects
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
