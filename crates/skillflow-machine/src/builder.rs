//! # Machine Builder
//!
//! Collects states, their transitions and remappings, then validates the
//! whole graph in [`StateMachineBuilder::build`]. Validation reports every
//! defect it finds in one [`ConstructionError`] so a wiring mistake list
//! can be fixed in one pass.
//!
//! ## Checks
//!
//! | Check | Defect |
//! |---|---|
//! | Labels (state names, outcomes, keys) are well formed | `InvalidLabel` |
//! | State names are unique | `DuplicateState` |
//! | At least one state; initial state exists | `NoStates`, `UnknownInitialState` |
//! | Transitions only use declared outcomes, at most once each | `UndeclaredOutcome`, `DuplicateTransition` |
//! | Targets name exactly one state or exposed outcome | `UnknownTarget`, `AmbiguousTarget` |
//! | Every outcome of every reachable state is routed | `MissingTransition` |
//! | Every exposed outcome except `preempted` is reachable | `UnreachableOutcome` |
//! | Remapping names declared keys | `UnknownRemapKey` |
//! | Inputs are provided by the machine or a sibling | `UnsatisfiedInputKey` |
//! | Machine outputs are written by some state | `UnproducedOutputKey` |
//!
//! States that cannot be reached from the initial state are legal but
//! logged with `warn!`.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use skillflow_core::{
    ConstructionDefect, ConstructionError, KeyName, Outcome, OutcomeSet, StateName, PREEMPTED,
};

use crate::context::KeyAccess;
use crate::machine::{Child, MachineStatus, StateMachine};
use crate::preempt::PreemptSignal;
use crate::state::State;
use crate::transition::{Remapping, Target, Transitions};

struct Entry {
    name: String,
    state: Box<dyn State>,
    transitions: Transitions,
    remapping: Remapping,
}

/// Assembles a [`StateMachine`].
///
/// ```ignore
/// let machine = StateMachineBuilder::new("SERVE", ["succeeded", "failed"])
///     .add("FIND", find, Transitions::new().on("found", "GRAB").on("not_found", "failed"))
///     .add("GRAB", grab, Transitions::new().on("done", "succeeded").on("failed", "failed"))
///     .build()?;
/// ```
pub struct StateMachineBuilder {
    name: String,
    outcomes: Vec<String>,
    initial: Option<String>,
    input_keys: Vec<String>,
    output_keys: Vec<String>,
    entries: Vec<Entry>,
}

impl StateMachineBuilder {
    /// Start a machine exposing `outcomes`.
    pub fn new<I, S>(name: impl Into<String>, outcomes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            outcomes: outcomes.into_iter().map(Into::into).collect(),
            initial: None,
            input_keys: Vec::new(),
            output_keys: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Add a state. The first state added is the initial state unless
    /// [`Self::initial`] says otherwise.
    pub fn add(
        self,
        name: impl Into<String>,
        state: impl State + 'static,
        transitions: Transitions,
    ) -> Self {
        self.add_with_remapping(name, state, transitions, Remapping::new())
    }

    /// Add a state whose keys are renamed in this machine's scope.
    pub fn add_with_remapping(
        mut self,
        name: impl Into<String>,
        state: impl State + 'static,
        transitions: Transitions,
        remapping: Remapping,
    ) -> Self {
        self.entries.push(Entry {
            name: name.into(),
            state: Box::new(state),
            transitions,
            remapping,
        });
        self
    }

    /// Add an already boxed state.
    pub fn add_boxed(
        mut self,
        name: impl Into<String>,
        state: Box<dyn State>,
        transitions: Transitions,
        remapping: Remapping,
    ) -> Self {
        self.entries.push(Entry {
            name: name.into(),
            state,
            transitions,
            remapping,
        });
        self
    }

    /// Start at `name` instead of the first state added.
    pub fn initial(mut self, name: impl Into<String>) -> Self {
        self.initial = Some(name.into());
        self
    }

    /// Keys copied in from the parent scope (or from the userdata passed
    /// to [`StateMachine::run`]).
    pub fn input_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Keys copied back out when the machine terminates normally.
    pub fn output_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Validate and compile the machine.
    pub fn build(self) -> Result<StateMachine, ConstructionError> {
        let mut defects = Vec::new();

        let outcome_set = match OutcomeSet::new(&self.outcomes) {
            Ok(set) => Some(set),
            Err(e) => {
                defects.push(ConstructionDefect::label("machine outcomes", e));
                None
            }
        };
        let exposed: BTreeSet<&str> = self.outcomes.iter().map(String::as_str).collect();

        let input_keys = labels(&self.input_keys, "machine input keys", &mut defects);
        let output_keys = labels(&self.output_keys, "machine output keys", &mut defects);

        // ── Names ────────────────────────────────────────────────────
        if self.entries.is_empty() {
            defects.push(ConstructionDefect::NoStates);
        }
        let mut index: BTreeMap<&str, usize> = BTreeMap::new();
        let mut names: Vec<Option<StateName>> = Vec::with_capacity(self.entries.len());
        for (idx, entry) in self.entries.iter().enumerate() {
            match StateName::new(entry.name.as_str()) {
                Ok(name) => names.push(Some(name)),
                Err(e) => {
                    defects.push(ConstructionDefect::label(format!("state {}", entry.name), e));
                    names.push(None);
                }
            }
            if index.insert(entry.name.as_str(), idx).is_some() {
                defects.push(ConstructionDefect::DuplicateState {
                    state: entry.name.clone(),
                });
            }
        }
        let initial = match &self.initial {
            Some(name) => match index.get(name.as_str()) {
                Some(idx) => Some(*idx),
                None => {
                    defects.push(ConstructionDefect::UnknownInitialState {
                        state: name.clone(),
                    });
                    None
                }
            },
            None => (!self.entries.is_empty()).then_some(0),
        };

        // ── Transitions ──────────────────────────────────────────────
        let mut compiled: Vec<BTreeMap<Outcome, Target>> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let declared = entry.state.outcomes();
            if let Err(e) = declared.check() {
                defects.push(ConstructionDefect::label(
                    format!("outcomes of state {}", entry.name),
                    e,
                ));
            }
            let mut table = BTreeMap::new();
            for (outcome, target) in entry.transitions.iter() {
                let Some(label) = declared.get(outcome) else {
                    defects.push(ConstructionDefect::UndeclaredOutcome {
                        state: entry.name.clone(),
                        outcome: outcome.to_string(),
                        declared: declared.to_string(),
                    });
                    continue;
                };
                let compiled_target = match (index.get(target), exposed.contains(target)) {
                    (Some(_), true) => {
                        defects.push(ConstructionDefect::AmbiguousTarget {
                            state: entry.name.clone(),
                            outcome: outcome.to_string(),
                            target: target.to_string(),
                        });
                        continue;
                    }
                    (Some(idx), false) => Target::State(*idx),
                    (None, true) => match Outcome::new(target) {
                        Ok(exposed) => Target::Outcome(exposed),
                        // Already reported against the machine outcomes.
                        Err(_) => continue,
                    },
                    (None, false) => {
                        defects.push(ConstructionDefect::UnknownTarget {
                            state: entry.name.clone(),
                            outcome: outcome.to_string(),
                            target: target.to_string(),
                        });
                        continue;
                    }
                };
                if table.insert(label.clone(), compiled_target).is_some() {
                    defects.push(ConstructionDefect::DuplicateTransition {
                        state: entry.name.clone(),
                        outcome: outcome.to_string(),
                    });
                }
            }
            compiled.push(table);
        }

        // ── Reachability ─────────────────────────────────────────────
        let mut reached_states = vec![false; self.entries.len()];
        let mut reached_outcomes: BTreeSet<String> = BTreeSet::new();
        if let Some(start) = initial {
            let mut queue = VecDeque::from([start]);
            reached_states[start] = true;
            while let Some(idx) = queue.pop_front() {
                let entry = &self.entries[idx];
                for outcome in entry.state.outcomes() {
                    match compiled[idx].get(outcome) {
                        Some(Target::State(next)) => {
                            if !reached_states[*next] {
                                reached_states[*next] = true;
                                queue.push_back(*next);
                            }
                        }
                        Some(Target::Outcome(o)) => {
                            reached_outcomes.insert(o.to_string());
                        }
                        None => defects.push(ConstructionDefect::MissingTransition {
                            state: entry.name.clone(),
                            outcome: outcome.to_string(),
                        }),
                    }
                }
            }
            for outcome in &self.outcomes {
                if outcome != PREEMPTED && !reached_outcomes.contains(outcome) {
                    defects.push(ConstructionDefect::UnreachableOutcome {
                        outcome: outcome.clone(),
                    });
                }
            }
            for (entry, reached) in self.entries.iter().zip(&reached_states) {
                if !reached {
                    tracing::warn!(machine = %self.name, state = %entry.name, "state is unreachable from the initial state");
                }
            }
        }

        // ── Keys ─────────────────────────────────────────────────────
        let mut accesses = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            accesses.push(key_access(entry, &mut defects));
        }
        let mut provided: BTreeSet<&KeyName> = input_keys.iter().collect();
        for access in &accesses {
            provided.extend(access.machine_outputs());
        }
        for (entry, access) in self.entries.iter().zip(&accesses) {
            for key in access.machine_inputs() {
                if !provided.contains(key) {
                    defects.push(ConstructionDefect::UnsatisfiedInputKey {
                        state: entry.name.clone(),
                        key: key.to_string(),
                    });
                }
            }
        }
        for key in &output_keys {
            if !accesses.iter().any(|a| a.machine_outputs().any(|k| k == key)) {
                defects.push(ConstructionDefect::UnproducedOutputKey {
                    key: key.to_string(),
                });
            }
        }

        // ── Assemble ─────────────────────────────────────────────────
        let (Some(outcomes), Some(initial), true) = (outcome_set, initial, defects.is_empty())
        else {
            for defect in &defects {
                tracing::error!(machine = %self.name, defect = %defect, "construction defect");
            }
            return Err(ConstructionError {
                machine: self.name,
                defects,
            });
        };

        // Every name validated, so flattening keeps all of them.
        let children = self
            .entries
            .into_iter()
            .zip(names.into_iter().flatten())
            .zip(compiled)
            .zip(accesses)
            .map(|(((entry, name), transitions), access)| Child {
                name,
                state: entry.state,
                transitions,
                access,
            })
            .collect();

        tracing::debug!(machine = %self.name, "machine built");
        Ok(StateMachine {
            name: self.name,
            outcomes,
            input_keys,
            output_keys,
            children,
            initial,
            signal: PreemptSignal::new(),
            status: MachineStatus::Constructed,
            history: Vec::new(),
        })
    }
}

/// Validate raw keys, reporting bad ones.
fn labels(raw: &[String], context: &str, defects: &mut Vec<ConstructionDefect>) -> Vec<KeyName> {
    raw.iter()
        .filter_map(|k| match KeyName::new(k.as_str()) {
            Ok(key) => Some(key),
            Err(e) => {
                defects.push(ConstructionDefect::label(context, e));
                None
            }
        })
        .collect()
}

/// Compile one state's key access from its declared keys and remapping.
fn key_access(entry: &Entry, defects: &mut Vec<ConstructionDefect>) -> KeyAccess {
    let inputs = entry.state.input_keys();
    let outputs = entry.state.output_keys();
    for key in inputs.iter().chain(outputs) {
        if let Err(e) = key.check() {
            defects.push(ConstructionDefect::label(
                format!("keys of state {}", entry.name),
                e,
            ));
        }
    }
    for (local, _) in entry.remapping.iter() {
        if !inputs.iter().chain(outputs).any(|k| k == local) {
            defects.push(ConstructionDefect::UnknownRemapKey {
                state: entry.name.clone(),
                key: local.to_string(),
            });
        }
    }
    let mut resolve = |local: &KeyName| -> Option<(KeyName, KeyName)> {
        let Some(target) = entry.remapping.get(local.as_str()) else {
            return Some((local.clone(), local.clone()));
        };
        match KeyName::new(target) {
            Ok(machine) => Some((local.clone(), machine)),
            Err(e) => {
                defects.push(ConstructionDefect::label(
                    format!("remapping of state {}", entry.name),
                    e,
                ));
                None
            }
        }
    };
    let inputs: Vec<_> = inputs.iter().filter_map(&mut resolve).collect();
    let outputs: Vec<_> = outputs.iter().filter_map(&mut resolve).collect();
    KeyAccess::from_pairs(inputs, outputs)
}
