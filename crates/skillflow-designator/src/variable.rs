//! # Variable Designators and Write Handles
//!
//! A variable is the only designator whose value can change between
//! resolutions. Its value lives in a shared slot; readers get an ordinary
//! [`Designator`] and the single writer gets a [`WriteHandle`].
//!
//! The write handle is not `Clone`, and a variable issues it at most once.
//! Handing it to exactly one state makes that state the sole producer of
//! the value, which is what lets a reviewer tell which state writes
//! `selected_drink` by reading the wiring code alone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use skillflow_core::{ConstructionDefect, ValueType};

use crate::designator::{Designator, Kind};
use crate::failure::WriteError;

/// Storage shared by a variable's readers and its writer.
pub(crate) struct Slot {
    value: RwLock<Option<Value>>,
    writer_issued: AtomicBool,
}

impl Slot {
    fn new(initial: Option<Value>) -> Self {
        Self {
            value: RwLock::new(initial),
            writer_issued: AtomicBool::new(false),
        }
    }

    pub(crate) fn get(&self) -> Option<Value> {
        self.value.read().clone()
    }

    fn set(&self, value: Option<Value>) {
        *self.value.write() = value;
    }
}

/// A settable designator of a declared type.
///
/// Dereferences to its read-only [`Designator`], so it can be projected,
/// transformed, and handed to states like any other designator.
#[derive(Clone)]
pub struct VariableDesignator {
    designator: Designator,
    slot: Arc<Slot>,
}

impl VariableDesignator {
    /// An unset variable. Resolving it before the first write fails with
    /// `Unset`.
    pub fn new(ty: ValueType) -> Self {
        Self::from_slot(ty, Slot::new(None))
    }

    /// A variable that starts out holding `initial`.
    pub fn with_initial(ty: ValueType, initial: Value) -> Result<Self, ConstructionDefect> {
        if !ty.accepts(&initial) {
            return Err(ConstructionDefect::TypeMismatch {
                designator: "variable".to_string(),
                expected: ty.to_string(),
                found: initial.to_string(),
            });
        }
        Ok(Self::from_slot(ty, Slot::new(Some(initial))))
    }

    fn from_slot(ty: ValueType, slot: Slot) -> Self {
        let slot = Arc::new(slot);
        let designator =
            Designator::from_parts("variable", ty, Kind::Variable(Arc::clone(&slot)));
        Self { designator, slot }
    }

    /// Rename for diagnostics. Call before handing out readers.
    pub fn named(self, name: impl Into<String>) -> Self {
        Self {
            designator: self.designator.named(name),
            slot: self.slot,
        }
    }

    /// The read side.
    pub fn designator(&self) -> &Designator {
        &self.designator
    }

    /// Whether a value is currently stored.
    pub fn is_set(&self) -> bool {
        self.slot.value.read().is_some()
    }

    /// Issue the write capability.
    ///
    /// Succeeds once per variable. Every later call is a construction
    /// defect, since two writers for one value would make the data flow
    /// ambiguous.
    pub fn writeable(&self) -> Result<WriteHandle, ConstructionDefect> {
        if self.slot.writer_issued.swap(true, Ordering::SeqCst) {
            return Err(ConstructionDefect::WriterAlreadyIssued {
                designator: self.designator.name().to_string(),
            });
        }
        Ok(WriteHandle {
            designator: self.designator.clone(),
            slot: Arc::clone(&self.slot),
        })
    }
}

impl std::ops::Deref for VariableDesignator {
    type Target = Designator;

    fn deref(&self) -> &Designator {
        &self.designator
    }
}

impl AsRef<Designator> for VariableDesignator {
    fn as_ref(&self) -> &Designator {
        &self.designator
    }
}

impl std::fmt::Debug for VariableDesignator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableDesignator")
            .field("name", &self.designator.name())
            .field("type", &self.designator.value_type().to_string())
            .field("set", &self.is_set())
            .finish()
    }
}

/// The unique write capability for one variable.
pub struct WriteHandle {
    designator: Designator,
    slot: Arc<Slot>,
}

impl WriteHandle {
    /// Store `value`. Rejected without changing the stored value when it
    /// does not have the variable's declared type.
    pub fn write(&self, value: Value) -> Result<(), WriteError> {
        let ty = self.designator.value_type();
        if !ty.accepts(&value) {
            return Err(WriteError::TypeMismatch {
                designator: self.designator.name().to_string(),
                expected: ty.to_string(),
                found: value.to_string(),
            });
        }
        tracing::trace!(designator = %self.designator.name(), "variable written");
        self.slot.set(Some(value));
        Ok(())
    }

    /// Serialize a Rust value and store it.
    pub fn write_as<T: Serialize>(&self, value: &T) -> Result<(), WriteError> {
        let value = serde_json::to_value(value).map_err(|e| WriteError::Serialization {
            designator: self.designator.name().to_string(),
            message: e.to_string(),
        })?;
        self.write(value)
    }

    /// Return the variable to the unset state.
    pub fn clear(&self) {
        self.slot.set(None);
    }

    /// The read side of the variable this handle writes.
    pub fn designator(&self) -> &Designator {
        &self.designator
    }

    /// Name of the variable.
    pub fn name(&self) -> &str {
        self.designator.name()
    }

    /// Declared type of the variable.
    pub fn value_type(&self) -> &ValueType {
        self.designator.value_type()
    }
}

impl std::fmt::Debug for WriteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteHandle")
            .field("variable", &self.designator.name())
            .finish()
    }
}
