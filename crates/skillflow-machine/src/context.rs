//! # Execution Context
//!
//! The narrow channel sibling states use to exchange data that designators
//! do not carry. Each machine owns one [`Userdata`] scope for the duration
//! of a run. A state sees that scope only through its [`KeyAccess`]: the
//! input keys it declared (readable) and the output keys it declared
//! (writable), each possibly remapped to a different machine-level key.
//!
//! ## Scoping across nesting
//!
//! A nested machine does not share its parent's scope. On entry it copies
//! its declared input keys in from the parent; on normal termination it
//! copies its declared output keys back out. Keys its children use
//! internally never leak upward.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use skillflow_core::{KeyName, StateName};

use crate::error::ExecutionError;
use crate::preempt::PreemptSignal;
use crate::state::State;

// ── Userdata ─────────────────────────────────────────────────────────

/// Key-value store of one machine scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Userdata {
    values: BTreeMap<KeyName, Value>,
}

impl Userdata {
    /// An empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// The value under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Store `value` under `key`, returning the previous value.
    pub fn insert(&mut self, key: KeyName, value: Value) -> Option<Value> {
        self.values.insert(key, value)
    }

    /// Remove and return the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Whether `key` holds a value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&KeyName, &Value)> {
        self.values.iter()
    }
}

impl FromIterator<(KeyName, Value)> for Userdata {
    fn from_iter<I: IntoIterator<Item = (KeyName, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

// ── Key Access ───────────────────────────────────────────────────────

/// Which keys one state may read and write, and where they live in the
/// machine scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyAccess {
    inputs: BTreeMap<KeyName, KeyName>,
    outputs: BTreeMap<KeyName, KeyName>,
}

impl KeyAccess {
    /// Access that maps every declared key of `state` to itself.
    pub fn identity(state: &dyn State) -> Self {
        Self::from_pairs(
            state.input_keys().iter().map(|k| (k.clone(), k.clone())),
            state.output_keys().iter().map(|k| (k.clone(), k.clone())),
        )
    }

    /// Access from explicit `(local, machine)` pairs.
    pub fn from_pairs(
        inputs: impl IntoIterator<Item = (KeyName, KeyName)>,
        outputs: impl IntoIterator<Item = (KeyName, KeyName)>,
    ) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
            outputs: outputs.into_iter().collect(),
        }
    }

    /// Machine-level key a local input key reads from.
    pub fn input(&self, local: &str) -> Option<&KeyName> {
        self.inputs.get(local)
    }

    /// Machine-level key a local output key writes to.
    pub fn output(&self, local: &str) -> Option<&KeyName> {
        self.outputs.get(local)
    }

    /// Machine-level keys this state reads.
    pub fn machine_inputs(&self) -> impl Iterator<Item = &KeyName> {
        self.inputs.values()
    }

    /// Machine-level keys this state writes.
    pub fn machine_outputs(&self) -> impl Iterator<Item = &KeyName> {
        self.outputs.values()
    }
}

// ── Context ──────────────────────────────────────────────────────────

/// What a state sees while it executes.
pub struct ExecutionContext<'a> {
    state: &'a StateName,
    store: &'a mut Userdata,
    access: &'a KeyAccess,
    preempt: &'a PreemptSignal,
}

impl<'a> ExecutionContext<'a> {
    /// A context for `state` over `store`.
    ///
    /// The executor builds one per state execution. Exposed so a state can
    /// be exercised on its own.
    pub fn new(
        state: &'a StateName,
        store: &'a mut Userdata,
        access: &'a KeyAccess,
        preempt: &'a PreemptSignal,
    ) -> Self {
        Self {
            state,
            store,
            access,
            preempt,
        }
    }

    /// Name of the executing state.
    pub fn state_name(&self) -> &StateName {
        self.state
    }

    /// Read a declared input key. Fails if the key was not declared or
    /// holds no value.
    pub fn read(&self, key: &str) -> Result<Value, ExecutionError> {
        let machine_key = self.input_key(key)?;
        self.store
            .get(machine_key.as_str())
            .cloned()
            .ok_or_else(|| ExecutionError::MissingKey {
                state: self.state.to_string(),
                key: machine_key.to_string(),
            })
    }

    /// Read a declared input key that may legitimately be absent.
    pub fn get(&self, key: &str) -> Result<Option<&Value>, ExecutionError> {
        let machine_key = self.input_key(key)?;
        Ok(self.store.get(machine_key.as_str()))
    }

    /// Write a declared output key.
    pub fn write(&mut self, key: &str, value: Value) -> Result<(), ExecutionError> {
        let machine_key =
            self.access
                .output(key)
                .ok_or_else(|| ExecutionError::UndeclaredWrite {
                    state: self.state.to_string(),
                    key: key.to_string(),
                })?;
        tracing::trace!(state = %self.state, key = %machine_key, "userdata written");
        self.store.insert(machine_key.clone(), value);
        Ok(())
    }

    /// Whether preemption has been requested. Long-running states poll this
    /// and return early with one of their own outcomes.
    pub fn preempt_requested(&self) -> bool {
        self.preempt.is_requested()
    }

    /// The signal of the enclosing run.
    pub fn preempt_signal(&self) -> &PreemptSignal {
        self.preempt
    }

    fn input_key(&self, key: &str) -> Result<&KeyName, ExecutionError> {
        self.access
            .input(key)
            .ok_or_else(|| ExecutionError::UndeclaredRead {
                state: self.state.to_string(),
                key: key.to_string(),
            })
    }
}
