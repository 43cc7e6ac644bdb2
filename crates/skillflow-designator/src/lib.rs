//! # skillflow-designator — Deferred Values
//!
//! A designator is a typed description of *where a value will come from*,
//! created while a behavior is assembled and resolved only when a state
//! executes. Designators let one state produce a value (e.g. the drink a
//! person asked for) and another state consume it (the grasp target)
//! without either state knowing about the other.
//!
//! ## Contents
//!
//! - [`Designator`]: the shared handle, with constant, projection and
//!   transformation constructors and [`Designator::resolve`].
//! - [`VariableDesignator`] / [`WriteHandle`]: the only mutable variant and
//!   its single write capability.
//! - [`TransformRegistry`]: named functions available to transformations.
//! - [`QueryBuilder`]: candidates from a [`QueryCollaborator`], filtered by
//!   [`Criterion`]s and chosen by an explicit [`SelectionPolicy`].
//! - [`SequenceCursor`]: forward-only walk over a list designator.
//! - [`ResolutionFailure`]: why a resolution produced no value.
//!
//! ## Thread Safety
//!
//! Designators are `Send + Sync`. Variable slots and cursor positions are
//! guarded by `parking_lot` locks, which are never held across a call into
//! another designator or a collaborator.

pub mod cursor;
pub mod designator;
pub mod failure;
pub mod query;
pub mod transform;
pub mod variable;

pub use cursor::{Advance, SequenceCursor};
pub use designator::{Designator, DesignatorId, Mutability, Variant};
pub use failure::{FailureKind, ResolutionFailure, WriteError};
pub use query::{CollaboratorError, Criterion, QueryBuilder, QueryCollaborator, SelectionPolicy};
pub use transform::{Transform, TransformOutput, TransformRegistry};
pub use variable::{VariableDesignator, WriteHandle};
