//! # State Machine Executor
//!
//! A [`StateMachine`] runs its states one at a time on the caller's thread.
//! Starting at the initial state it executes the current state, looks the
//! returned outcome up in that state's transitions, and either moves to the
//! next state or terminates with one of its own exposed outcomes.
//!
//! ## Lifecycle
//!
//! ```text
//! Constructed ──run──▶ Running{state} ──▶ Terminated{outcome}
//!                            │
//!                            ├──▶ Preempted
//!                            └──▶ Faulted
//! ```
//!
//! A machine can be run again after it terminates. Each run starts at the
//! initial state with a fresh userdata scope and a cleared history; state
//! instances keep whatever internal data they accumulated.
//!
//! ## Preemption
//!
//! The signal is checked before every state execution, including the
//! first. When it is raised the machine stops and returns `preempted` if it
//! declares that outcome. Otherwise it fails with
//! [`ExecutionError::Preempted`], which a parent handles the same way, so
//! the request climbs until a machine that can report it is found (or the
//! root fails with it). Nested machines observe the signal of the run that
//! entered them.

use std::collections::BTreeMap;

use serde::Serialize;

use skillflow_core::{KeyName, Outcome, OutcomeSet, StateName};

use crate::context::{ExecutionContext, KeyAccess, Userdata};
use crate::error::ExecutionError;
use crate::preempt::PreemptSignal;
use crate::state::State;
use crate::transition::{Target, TransitionRecord};

// ── Status ───────────────────────────────────────────────────────────

/// Where a machine is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MachineStatus {
    /// Built, never run.
    Constructed,
    /// Executing `state`.
    Running {
        /// The current state.
        state: StateName,
    },
    /// The last run ended with `outcome`.
    Terminated {
        /// The exposed outcome.
        outcome: Outcome,
    },
    /// The last run was preempted.
    Preempted,
    /// The last run stopped on an execution error.
    Faulted,
}

impl MachineStatus {
    /// Whether no run is in progress.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running { .. })
    }

    /// Short name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Constructed => "constructed",
            Self::Running { .. } => "running",
            Self::Terminated { .. } => "terminated",
            Self::Preempted => "preempted",
            Self::Faulted => "faulted",
        }
    }
}

impl std::fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running { state } => write!(f, "running({state})"),
            Self::Terminated { outcome } => write!(f, "terminated({outcome})"),
            other => f.write_str(other.as_str()),
        }
    }
}

// ── Outline ──────────────────────────────────────────────────────────

/// Serializable description of a machine's structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineOutline {
    /// Machine name.
    pub name: String,
    /// Exposed outcomes in declaration order.
    pub outcomes: Vec<String>,
    /// Initial state.
    pub initial: String,
    /// Machine-level input keys.
    pub input_keys: Vec<String>,
    /// Machine-level output keys.
    pub output_keys: Vec<String>,
    /// States in the order they were added.
    pub states: Vec<StateOutline>,
}

/// One state inside a [`MachineOutline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateOutline {
    /// State name.
    pub name: String,
    /// Kind reported by the state.
    pub kind: String,
    /// Declared outcomes.
    pub outcomes: Vec<String>,
    /// Outcome to target.
    pub transitions: BTreeMap<String, String>,
    /// Machine-level keys read.
    pub reads: Vec<String>,
    /// Machine-level keys written.
    pub writes: Vec<String>,
    /// Structure of the nested machine, if this state is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine: Option<Box<MachineOutline>>,
}

impl MachineOutline {
    fn render(&self, f: &mut std::fmt::Formatter<'_>, depth: usize) -> std::fmt::Result {
        let pad = "  ".repeat(depth);
        writeln!(
            f,
            "{pad}{} [{}] initial={}",
            self.name,
            self.outcomes.join(", "),
            self.initial
        )?;
        for state in &self.states {
            writeln!(f, "{pad}  {} ({})", state.name, state.kind)?;
            for (outcome, target) in &state.transitions {
                writeln!(f, "{pad}    {outcome} -> {target}")?;
            }
            if let Some(nested) = &state.machine {
                nested.render(f, depth + 2)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for MachineOutline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.render(f, 0)
    }
}

// ── Machine ──────────────────────────────────────────────────────────

/// A compiled child of a machine.
pub(crate) struct Child {
    pub(crate) name: StateName,
    pub(crate) state: Box<dyn State>,
    pub(crate) transitions: BTreeMap<Outcome, Target>,
    pub(crate) access: KeyAccess,
}

/// A validated, runnable state machine. Build one with
/// [`crate::StateMachineBuilder`].
pub struct StateMachine {
    pub(crate) name: String,
    pub(crate) outcomes: OutcomeSet,
    pub(crate) input_keys: Vec<KeyName>,
    pub(crate) output_keys: Vec<KeyName>,
    pub(crate) children: Vec<Child>,
    pub(crate) initial: usize,
    pub(crate) signal: PreemptSignal,
    pub(crate) status: MachineStatus,
    pub(crate) history: Vec<TransitionRecord>,
}

impl StateMachine {
    /// Machine name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the initial state.
    pub fn initial_state(&self) -> &StateName {
        &self.children[self.initial].name
    }

    /// State names in the order they were added.
    pub fn state_names(&self) -> impl Iterator<Item = &StateName> {
        self.children.iter().map(|c| &c.name)
    }

    /// Current lifecycle status.
    pub fn status(&self) -> &MachineStatus {
        &self.status
    }

    /// Transitions taken during the latest run, oldest first.
    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    /// The signal that preempts runs started with [`Self::run`]. Clone it
    /// and hand it to whoever may need to abort the run.
    pub fn preempt_signal(&self) -> PreemptSignal {
        self.signal.clone()
    }

    /// Describe the machine's structure, recursing into nested machines.
    pub fn outline(&self) -> MachineOutline {
        let target_name = |target: &Target| match target {
            Target::State(idx) => self.children[*idx].name.to_string(),
            Target::Outcome(outcome) => outcome.to_string(),
        };
        MachineOutline {
            name: self.name.clone(),
            outcomes: self.outcomes.iter().map(ToString::to_string).collect(),
            initial: self.initial_state().to_string(),
            input_keys: self.input_keys.iter().map(ToString::to_string).collect(),
            output_keys: self.output_keys.iter().map(ToString::to_string).collect(),
            states: self
                .children
                .iter()
                .map(|child| StateOutline {
                    name: child.name.to_string(),
                    kind: child.state.kind().to_string(),
                    outcomes: child
                        .state
                        .outcomes()
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                    transitions: child
                        .transitions
                        .iter()
                        .map(|(o, t)| (o.to_string(), target_name(t)))
                        .collect(),
                    reads: child.access.machine_inputs().map(ToString::to_string).collect(),
                    writes: child.access.machine_outputs().map(ToString::to_string).collect(),
                    machine: child.state.as_machine().map(|m| Box::new(m.outline())),
                })
                .collect(),
        }
    }

    /// Run as the root machine.
    ///
    /// The machine's declared input keys are copied out of `userdata`
    /// before the run; its declared output keys are copied back after it
    /// terminates normally. The preemption signal is lowered when the run
    /// ends, however it ends.
    pub fn run(&mut self, userdata: &mut Userdata) -> Result<Outcome, ExecutionError> {
        let signal = self.signal.clone();
        let mut scope = self.enter_scope(|key| Ok(userdata.get(key).cloned()))?;
        let result = self.run_scope(&mut scope, &signal);
        signal.clear();
        let outcome = result?;
        for (key, value) in self.exit_scope(&scope) {
            userdata.insert(key, value);
        }
        Ok(outcome)
    }

    fn enter_scope(
        &self,
        mut lookup: impl FnMut(&str) -> Result<Option<serde_json::Value>, ExecutionError>,
    ) -> Result<Userdata, ExecutionError> {
        let mut scope = Userdata::new();
        for key in &self.input_keys {
            if let Some(value) = lookup(key.as_str())? {
                scope.insert(key.clone(), value);
            }
        }
        Ok(scope)
    }

    fn exit_scope(&self, scope: &Userdata) -> Vec<(KeyName, serde_json::Value)> {
        self.output_keys
            .iter()
            .filter_map(|key| scope.get(key.as_str()).map(|v| (key.clone(), v.clone())))
            .collect()
    }

    fn run_scope(
        &mut self,
        scope: &mut Userdata,
        signal: &PreemptSignal,
    ) -> Result<Outcome, ExecutionError> {
        self.history.clear();
        let mut current = self.initial;
        loop {
            if signal.is_requested() {
                return self.preempted();
            }

            let state_name = self.children[current].name.clone();
            self.status = MachineStatus::Running {
                state: state_name.clone(),
            };
            tracing::debug!(machine = %self.name, state = %state_name, "executing state");

            let child = &mut self.children[current];
            let result = {
                let mut ctx = ExecutionContext::new(&child.name, scope, &child.access, signal);
                child.state.execute(&mut ctx)
            };
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(ExecutionError::Preempted { .. }) if self.outcomes.declares_preempted() => {
                    return self.preempted();
                }
                Err(e) => {
                    if e.is_preemption() {
                        self.status = MachineStatus::Preempted;
                    } else {
                        tracing::error!(machine = %self.name, state = %state_name, error = %e, "state failed");
                        self.status = MachineStatus::Faulted;
                    }
                    return Err(e);
                }
            };

            let child = &self.children[current];
            if !child.state.outcomes().contains(outcome.as_str()) {
                let err = ExecutionError::OutcomeContractViolation {
                    machine: self.name.clone(),
                    state: state_name.to_string(),
                    outcome: outcome.to_string(),
                    declared: child.state.outcomes().to_string(),
                };
                tracing::error!(machine = %self.name, error = %err, "outcome contract violated");
                self.status = MachineStatus::Faulted;
                return Err(err);
            }

            let Some(target) = child.transitions.get(&outcome).cloned() else {
                let err = ExecutionError::MissingTransition {
                    machine: self.name.clone(),
                    state: state_name.to_string(),
                    outcome: outcome.to_string(),
                };
                tracing::error!(machine = %self.name, error = %err, "missing transition");
                self.status = MachineStatus::Faulted;
                return Err(err);
            };

            match target {
                Target::State(next) => {
                    let to = self.children[next].name.to_string();
                    self.record(state_name, outcome, to, false);
                    current = next;
                }
                Target::Outcome(exposed) => {
                    self.record(state_name, outcome, exposed.to_string(), true);
                    self.status = MachineStatus::Terminated {
                        outcome: exposed.clone(),
                    };
                    return Ok(exposed);
                }
            }
        }
    }

    fn record(&mut self, from: StateName, outcome: Outcome, to: String, terminal: bool) {
        tracing::info!(
            machine = %self.name,
            from = %from,
            outcome = %outcome,
            to = %to,
            terminal,
            "transition"
        );
        self.history.push(TransitionRecord {
            machine: self.name.clone(),
            from,
            outcome,
            to,
            terminal,
            at: chrono::Utc::now(),
        });
    }

    fn preempted(&mut self) -> Result<Outcome, ExecutionError> {
        self.status = MachineStatus::Preempted;
        if let Some(outcome) = self.outcomes.get(skillflow_core::PREEMPTED) {
            tracing::warn!(machine = %self.name, "preempted");
            Ok(outcome.clone())
        } else {
            tracing::warn!(machine = %self.name, "preempted without a preempted outcome; passing to parent");
            Err(ExecutionError::Preempted {
                machine: self.name.clone(),
            })
        }
    }
}

impl State for StateMachine {
    fn outcomes(&self) -> &OutcomeSet {
        &self.outcomes
    }

    fn input_keys(&self) -> &[KeyName] {
        &self.input_keys
    }

    fn output_keys(&self) -> &[KeyName] {
        &self.output_keys
    }

    fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecutionError> {
        let mut scope = self.enter_scope(|key| Ok(ctx.get(key)?.cloned()))?;
        let signal = ctx.preempt_signal().clone();
        let outcome = self.run_scope(&mut scope, &signal)?;
        for (key, value) in self.exit_scope(&scope) {
            ctx.write(key.as_str(), value)?;
        }
        Ok(outcome)
    }

    fn kind(&self) -> &str {
        "machine"
    }

    fn as_machine(&self) -> Option<&StateMachine> {
        Some(self)
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.name)
            .field("outcomes", &self.outcomes.to_string())
            .field("states", &self.children.len())
            .field("status", &self.status)
            .finish()
    }
}
