//! # skillflow-core — Foundational Types for skillflow
//!
//! This crate is the leaf of the skillflow crate DAG. It defines the
//! vocabulary every other crate speaks: the names of states, the labels
//! of outcomes, the keys of the execution context, and the structural type
//! model designators declare their results with.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for labels.** `StateName`, `Outcome` and `KeyName`
//!    are distinct types with validated constructors. You cannot pass a
//!    state name where an outcome label is expected.
//!
//! 2. **Closed outcome sets.** [`OutcomeSet`] is fixed at construction and
//!    rejects duplicates, so "the declared outcomes of a state" is always a
//!    finite, enumerable set.
//!
//! 3. **Structural value types.** [`ValueType`] describes the shape of a
//!    designator's result. Compositions (projection, transformation,
//!    iteration) are checked against it when they are built, not when they
//!    are resolved.
//!
//! 4. **One defect taxonomy.** Every wiring mistake detectable before a run
//!    is a [`ConstructionDefect`]. Builders report all of them at once via
//!    [`ConstructionError`].
//!
//! ## Crate Policy
//!
//! - No dependencies on other `skillflow-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod label;
pub mod outcome;
pub mod value;

pub use error::{ConstructionDefect, ConstructionError, LabelError};
pub use label::{KeyName, Outcome, StateName, MAX_LABEL_LEN};
pub use outcome::{OutcomeSet, PREEMPTED};
pub use value::{Selector, ValueType};
