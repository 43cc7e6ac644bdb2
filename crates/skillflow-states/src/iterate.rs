//! # Iteration States
//!
//! [`IterateState`] drives a [`SequenceCursor`]: each execution advances
//! the cursor and either writes the element to a variable (`next`) or
//! reports that the collection is used up (`stop_iteration`). Wiring `next`
//! into a loop body that transitions back to the iterating state walks the
//! whole collection once.
//!
//! The cursor is not rewound when the state is re-entered. A behavior that
//! wants to walk the collection again routes through [`ResetCursor`].

use skillflow_core::{ConstructionDefect, Outcome, OutcomeSet};
use skillflow_designator::{Advance, Designator, SequenceCursor, WriteHandle};
use skillflow_machine::{ExecutionContext, ExecutionError, State};
use tracing::{debug, warn};

const NEXT: &str = "next";
const STOP_ITERATION: &str = "stop_iteration";

/// Walks a collection designator one element per execution.
pub struct IterateState {
    cursor: SequenceCursor,
    element: WriteHandle,
    outcomes: OutcomeSet,
}

impl IterateState {
    /// Iterate over `collection`, writing each element through `element`.
    ///
    /// The collection must be a list (or `any`) whose item type is
    /// assignable to the variable behind `element`.
    pub fn new(collection: &Designator, element: WriteHandle) -> Result<Self, ConstructionDefect> {
        Self::from_cursor(SequenceCursor::new(collection)?, element)
    }

    /// Iterate with an existing cursor, e.g. one shared with a
    /// [`ResetCursor`].
    pub fn from_cursor(cursor: SequenceCursor, element: WriteHandle) -> Result<Self, ConstructionDefect> {
        if !cursor.item_type().is_assignable_to(element.value_type()) {
            return Err(ConstructionDefect::TypeMismatch {
                designator: element.name().to_string(),
                expected: element.value_type().to_string(),
                found: format!("elements of {} ({})", cursor.collection().name(), cursor.item_type()),
            });
        }
        Ok(Self {
            cursor,
            element,
            outcomes: OutcomeSet::fixed(&[NEXT, STOP_ITERATION]),
        })
    }

    /// The underlying cursor.
    pub fn cursor(&self) -> &SequenceCursor {
        &self.cursor
    }
}

impl State for IterateState {
    fn outcomes(&self) -> &OutcomeSet {
        &self.outcomes
    }

    fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecutionError> {
        match self.cursor.advance() {
            Ok(Advance::Next(item)) => {
                self.element
                    .write(item)
                    .map_err(|e| ExecutionError::StateFailure {
                        state: ctx.state_name().to_string(),
                        message: e.to_string(),
                    })?;
                debug!(
                    state = %ctx.state_name(),
                    position = self.cursor.position(),
                    "iteration advanced"
                );
                Ok(Outcome::from_static(NEXT))
            }
            Ok(Advance::StopIteration) => {
                self.element.clear();
                Ok(Outcome::from_static(STOP_ITERATION))
            }
            Err(failure) => {
                warn!(
                    state = %ctx.state_name(),
                    error = %failure,
                    "collection could not be resolved; stopping iteration"
                );
                Ok(Outcome::from_static(STOP_ITERATION))
            }
        }
    }

    fn kind(&self) -> &str {
        "iterate"
    }
}

/// Rewinds a cursor so the collection can be walked again.
pub struct ResetCursor {
    cursor: SequenceCursor,
    outcomes: OutcomeSet,
}

impl ResetCursor {
    pub fn new(cursor: SequenceCursor) -> Self {
        Self {
            cursor,
            outcomes: OutcomeSet::fixed(&["done"]),
        }
    }
}

impl State for ResetCursor {
    fn outcomes(&self) -> &OutcomeSet {
        &self.outcomes
    }

    fn execute(&mut self, _ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecutionError> {
        self.cursor.reset();
        Ok(Outcome::from_static("done"))
    }

    fn kind(&self) -> &str {
        "reset_cursor"
    }
}
