//! # skillflow-states — Reusable States
//!
//! Generic building blocks every behavior needs, independent of any
//! particular robot:
//!
//! - [`CallbackState`]: wrap a closure as a state.
//! - [`IterateState`] / [`ResetCursor`]: walk a collection designator,
//!   writing each element to a variable.
//! - [`WriteDesignator`], [`CheckBool`], [`ToggleBool`], [`FixedOutcome`]:
//!   small states over designators.
//! - [`CheckTries`] / [`ResetTries`]: bounded retry loops around a shared
//!   [`TryCounter`].
//! - [`WaitTime`]: sleep while polling for preemption.
//! - [`CapabilityState`]: invoke an operation on an external
//!   [`Capability`] and map whatever it signals onto declared outcomes.
//! - [`mock`]: scripted collaborators for building and exercising
//!   machines without hardware.
//!
//! Every state maps designator resolution failures onto one of its own
//! declared outcomes; none lets a `ResolutionFailure` escape.

pub mod callback;
pub mod capability;
pub mod designators;
pub mod iterate;
pub mod mock;
pub mod tries;
pub mod wait;

#[cfg(test)]
pub(crate) mod testing;

pub use callback::CallbackState;
pub use capability::{
    Capability, CapabilityCall, CapabilityError, CapabilityResponse, CapabilityState,
    CapabilityStateBuilder,
};
pub use designators::{CheckBool, FixedOutcome, ToggleBool, WriteDesignator};
pub use iterate::{IterateState, ResetCursor};
pub use tries::{CheckTries, CheckTriesParams, ResetTries, TryCounter};
pub use wait::{WaitTime, WaitTimeParams};
