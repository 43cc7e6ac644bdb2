//! # Assembly
//!
//! Turns a parsed [`BehaviorFile`] into a runnable [`StateMachine`] using
//! only the public construction APIs, so a file that assembles is wired
//! exactly as hand-written code would be.
//!
//! Defects are collected rather than returned one at a time: every state
//! of a machine is constructed before giving up, and the defects of a
//! nested machine are reported alongside its parent's.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use skillflow_core::{ConstructionDefect, ConstructionError, Outcome};
use skillflow_machine::{Remapping, State, StateMachine, StateMachineBuilder, Transitions};
use skillflow_states::mock::ScriptedCapability;
use skillflow_states::{
    CallbackState, Capability, CheckTries, CheckTriesParams, FixedOutcome, ResetTries, TryCounter,
    WaitTime,
};

use crate::config::{BehaviorFile, MachineSpec, ScriptedSpec, StateKind, StateSpec};

/// A machine plus the mocks it talks to.
pub struct Assembly {
    pub machine: StateMachine,
    /// Scripted capabilities by name, for inspecting invocations after a
    /// run.
    pub capabilities: BTreeMap<String, Arc<ScriptedCapability>>,
}

/// Assemble the root machine of `file`.
pub fn assemble(file: &BehaviorFile) -> Result<Assembly, ConstructionError> {
    let capabilities: BTreeMap<String, Arc<ScriptedCapability>> = file
        .capabilities
        .iter()
        .map(|(name, scripts)| {
            let capability = ScriptedCapability::from_scripts(name.clone(), scripts.clone());
            (name.clone(), Arc::new(capability))
        })
        .collect();

    let mut assembler = Assembler {
        capabilities: &capabilities,
        counters: BTreeMap::new(),
    };
    let machine = assembler.machine(&file.machine)?;
    tracing::debug!(
        machine = %machine.name(),
        counters = assembler.counters.len(),
        "behavior assembled"
    );
    Ok(Assembly {
        machine,
        capabilities,
    })
}

struct Assembler<'a> {
    capabilities: &'a BTreeMap<String, Arc<ScriptedCapability>>,
    /// Retry counters are shared by name across the whole file.
    counters: BTreeMap<String, TryCounter>,
}

enum StateFailure {
    Defect(ConstructionDefect),
    Nested(ConstructionError),
}

impl From<ConstructionDefect> for StateFailure {
    fn from(defect: ConstructionDefect) -> Self {
        Self::Defect(defect)
    }
}

impl Assembler<'_> {
    fn machine(&mut self, spec: &MachineSpec) -> Result<StateMachine, ConstructionError> {
        let mut builder = StateMachineBuilder::new(spec.name.clone(), spec.outcomes.iter().cloned())
            .input_keys(spec.input_keys.iter().cloned())
            .output_keys(spec.output_keys.iter().cloned());
        if let Some(initial) = &spec.initial {
            builder = builder.initial(initial.clone());
        }

        let mut defects = Vec::new();
        for entry in &spec.states {
            match self.state(entry) {
                Ok(state) => {
                    let transitions: Transitions = entry.transitions.iter().collect();
                    let remapping: Remapping = entry.remapping.iter().collect();
                    builder = builder.add_boxed(entry.name.clone(), state, transitions, remapping);
                }
                Err(StateFailure::Defect(defect)) => defects.push(defect),
                Err(StateFailure::Nested(nested)) => defects.extend(nested.defects),
            }
        }
        if !defects.is_empty() {
            return Err(ConstructionError {
                machine: spec.name.clone(),
                defects,
            });
        }
        builder.build()
    }

    fn state(&mut self, spec: &StateSpec) -> Result<Box<dyn State>, StateFailure> {
        let state: Box<dyn State> = match &spec.kind {
            StateKind::Scripted(scripted) => Box::new(scripted_state(&spec.name, scripted)?),
            StateKind::Capability(call) => {
                let capability = self.capabilities.get(&call.capability).ok_or_else(|| {
                    ConstructionDefect::InvalidParameter {
                        state: spec.name.clone(),
                        detail: format!("no scripted capability named {}", call.capability),
                    }
                })?;
                let capability: Arc<dyn Capability> = capability.clone();
                Box::new(call.clone().into_state(capability)?)
            }
            StateKind::Wait(params) => Box::new(WaitTime::new(*params)?),
            StateKind::CheckTries { counter, max_tries } => Box::new(CheckTries::new(
                self.counter(counter),
                CheckTriesParams {
                    max_tries: *max_tries,
                },
            )?),
            StateKind::ResetTries { counter } => Box::new(ResetTries::new(self.counter(counter))),
            StateKind::Fixed { outcome } => Box::new(FixedOutcome::new(outcome)?),
            StateKind::Machine(nested) => {
                Box::new(self.machine(nested).map_err(StateFailure::Nested)?)
            }
        };
        tracing::trace!(state = %spec.name, kind = spec.kind.as_str(), "state constructed");
        Ok(state)
    }

    fn counter(&mut self, name: &str) -> TryCounter {
        self.counters.entry(name.to_string()).or_default().clone()
    }
}

/// A state that returns its script in order (repeating the last entry),
/// reading and writing the declared keys on every execution.
fn scripted_state(name: &str, spec: &ScriptedSpec) -> Result<CallbackState, ConstructionDefect> {
    let invalid = |detail: String| ConstructionDefect::InvalidParameter {
        state: name.to_string(),
        detail,
    };
    if spec.script.is_empty() {
        return Err(invalid("script must not be empty".into()));
    }
    if let Some(stray) = spec.script.iter().find(|o| !spec.outcomes.contains(*o)) {
        return Err(invalid(format!("script returns {stray}, which is not a declared outcome")));
    }
    let script = spec
        .script
        .iter()
        .map(|raw| Outcome::new(raw.as_str()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConstructionDefect::label(format!("script of {name}"), e))?;

    let reads = spec.reads.clone();
    let writes: Vec<(String, Value)> = spec.writes.clone().into_iter().collect();
    let mut step = 0usize;
    CallbackState::new(&spec.outcomes, move |ctx| {
        for key in &reads {
            ctx.read(key)?;
        }
        for (key, value) in &writes {
            ctx.write(key, value.clone())?;
        }
        let outcome = script[step.min(script.len() - 1)].clone();
        step += 1;
        Ok(outcome)
    })?
    .with_keys(&spec.reads, spec.writes.keys())
}
