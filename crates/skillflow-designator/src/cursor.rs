//! # Sequence Cursors
//!
//! A cursor walks a collection designator one element at a time. It is the
//! state behind the iteration pattern: an iterate state advances the cursor
//! and reports `next` while elements remain and `stop_iteration` once the
//! sequence is exhausted.
//!
//! The collection is re-resolved on every advance, so a collection that
//! grows or shrinks while being walked is seen with its current contents at
//! the current position. Once exhausted, a cursor stays exhausted until
//! [`SequenceCursor::reset`].
//!
//! Each cursor also exposes an element designator that resolves to the
//! element the cursor last advanced to.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use skillflow_core::{ConstructionDefect, ValueType};

use crate::designator::{Designator, Kind};
use crate::failure::ResolutionFailure;

/// Position and current element of one cursor.
#[derive(Debug, Default)]
pub(crate) struct CursorState {
    position: usize,
    exhausted: bool,
    current: Option<Value>,
}

impl CursorState {
    pub(crate) fn current(&self) -> Option<Value> {
        self.current.clone()
    }
}

/// Result of [`SequenceCursor::advance`].
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// The next element.
    Next(Value),
    /// No more elements.
    StopIteration,
}

/// A resettable position in a collection designator.
#[derive(Clone)]
pub struct SequenceCursor {
    collection: Designator,
    item_type: ValueType,
    state: Arc<Mutex<CursorState>>,
    element: Designator,
}

impl SequenceCursor {
    /// A cursor over `collection`, which must be declared as a list.
    pub fn new(collection: &Designator) -> Result<Self, ConstructionDefect> {
        let item_type = collection.value_type().item_type().ok_or_else(|| {
            ConstructionDefect::IncompatibleComposition {
                designator: collection.name().to_string(),
                detail: format!(
                    "cannot iterate over {} of type {}",
                    collection.name(),
                    collection.value_type()
                ),
            }
        })?;
        let state = Arc::new(Mutex::new(CursorState::default()));
        let element = Designator::from_parts(
            format!("{}.current", collection.name()),
            item_type.clone(),
            Kind::Iteration(Arc::clone(&state)),
        );
        Ok(Self {
            collection: collection.clone(),
            item_type,
            state,
            element,
        })
    }

    /// Move to the next element.
    ///
    /// A failure to resolve the collection is returned as-is and leaves the
    /// cursor where it was.
    pub fn advance(&self) -> Result<Advance, ResolutionFailure> {
        if self.state.lock().exhausted {
            return Ok(Advance::StopIteration);
        }
        let value = self.collection.resolve().map_err(|e| {
            ResolutionFailure::upstream(self.element.name(), self.collection.name(), e)
        })?;
        let items = value
            .as_array()
            .ok_or_else(|| ResolutionFailure::TypeMismatch {
                designator: self.collection.name().to_string(),
                expected: ValueType::list(self.item_type.clone()).to_string(),
                found: value.to_string(),
            })?;

        let mut state = self.state.lock();
        match items.get(state.position) {
            Some(item) => {
                state.position += 1;
                state.current = Some(item.clone());
                tracing::trace!(
                    collection = %self.collection.name(),
                    position = state.position,
                    "cursor advanced"
                );
                Ok(Advance::Next(item.clone()))
            }
            None => {
                state.exhausted = true;
                state.current = None;
                Ok(Advance::StopIteration)
            }
        }
    }

    /// Rewind to before the first element.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = CursorState::default();
    }

    /// How many elements have been yielded since the last reset.
    pub fn position(&self) -> usize {
        self.state.lock().position
    }

    /// Whether the cursor has run past the end.
    pub fn is_exhausted(&self) -> bool {
        self.state.lock().exhausted
    }

    /// Designator of the current element. Unset before the first advance
    /// and after exhaustion.
    pub fn element(&self) -> &Designator {
        &self.element
    }

    /// The collection being walked.
    pub fn collection(&self) -> &Designator {
        &self.collection
    }

    /// Element type.
    pub fn item_type(&self) -> &ValueType {
        &self.item_type
    }
}

impl std::fmt::Debug for SequenceCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SequenceCursor")
            .field("collection", &self.collection.name())
            .field("position", &state.position)
            .field("exhausted", &state.exhausted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::FailureKind;
    use crate::variable::VariableDesignator;
    use serde_json::json;

    #[test]
    fn walks_every_element_then_stops() {
        let drinks = Designator::constant(json!(["coke", "fanta"]));
        let cursor = SequenceCursor::new(&drinks).unwrap();
        assert_eq!(cursor.advance().unwrap(), Advance::Next(json!("coke")));
        assert_eq!(cursor.element().resolve().unwrap(), json!("coke"));
        assert_eq!(cursor.advance().unwrap(), Advance::Next(json!("fanta")));
        assert_eq!(cursor.advance().unwrap(), Advance::StopIteration);
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn stays_exhausted_until_reset() {
        let one = Designator::constant(json!([1]));
        let cursor = SequenceCursor::new(&one).unwrap();
        cursor.advance().unwrap();
        assert_eq!(cursor.advance().unwrap(), Advance::StopIteration);
        assert_eq!(cursor.advance().unwrap(), Advance::StopIteration);
        cursor.reset();
        assert_eq!(cursor.advance().unwrap(), Advance::Next(json!(1)));
    }

    #[test]
    fn empty_collection_stops_immediately() {
        let empty = Designator::constant(json!([]));
        let cursor = SequenceCursor::new(&empty).unwrap();
        assert_eq!(cursor.advance().unwrap(), Advance::StopIteration);
    }

    #[test]
    fn element_is_unset_before_first_advance() {
        let items = Designator::constant(json!(["a"]));
        let cursor = SequenceCursor::new(&items).unwrap();
        assert_eq!(cursor.element().resolve().unwrap_err().kind(), FailureKind::Unset);
        assert_eq!(cursor.element().value_type(), &ValueType::String);
    }

    #[test]
    fn non_list_collection_is_rejected() {
        let scalar = Designator::constant(json!("coke"));
        assert!(SequenceCursor::new(&scalar).is_err());
    }

    #[test]
    fn unresolvable_collection_is_reported() {
        let pending = VariableDesignator::new(ValueType::list(ValueType::String));
        let cursor = SequenceCursor::new(&pending).unwrap();
        let err = cursor.advance().unwrap_err();
        assert_eq!(err.root_cause().kind(), FailureKind::Unset);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn sees_collection_updates_between_advances() {
        let items = VariableDesignator::with_initial(ValueType::list(ValueType::Integer), json!([1]))
            .unwrap();
        let writer = items.writeable().unwrap();
        let cursor = SequenceCursor::new(&items).unwrap();
        assert_eq!(cursor.advance().unwrap(), Advance::Next(json!(1)));
        writer.write(json!([1, 2])).unwrap();
        assert_eq!(cursor.advance().unwrap(), Advance::Next(json!(2)));
    }
}
