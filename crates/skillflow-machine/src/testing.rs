//! Test doubles shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use skillflow_core::{KeyName, Outcome, OutcomeSet};

use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::preempt::PreemptSignal;
use crate::state::State;

/// Returns scripted outcomes in order, repeating the last one, and counts
/// its executions.
pub(crate) struct Scripted {
    outcomes: OutcomeSet,
    script: VecDeque<&'static str>,
    last: &'static str,
    pub(crate) calls: Arc<AtomicUsize>,
    preempt_after: Option<PreemptSignal>,
    inputs: Vec<KeyName>,
    outputs: Vec<KeyName>,
    writes: Vec<(&'static str, Value)>,
}

impl Scripted {
    pub(crate) fn new(outcomes: &[&'static str], script: &[&'static str]) -> Self {
        Self {
            outcomes: OutcomeSet::fixed(outcomes),
            script: script.iter().copied().collect(),
            last: script.last().copied().unwrap_or(outcomes[0]),
            calls: Arc::new(AtomicUsize::new(0)),
            preempt_after: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Always returns `outcome`.
    pub(crate) fn always(outcome: &'static str) -> Self {
        Self::new(&[outcome], &[outcome])
    }

    pub(crate) fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Raise `signal` at the end of every execution.
    pub(crate) fn preempting(mut self, signal: PreemptSignal) -> Self {
        self.preempt_after = Some(signal);
        self
    }

    pub(crate) fn reads(mut self, key: &str) -> Self {
        self.inputs.push(KeyName::new(key).unwrap());
        self
    }

    pub(crate) fn writes(mut self, key: &'static str, value: Value) -> Self {
        self.outputs.push(KeyName::new(key).unwrap());
        self.writes.push((key, value));
        self
    }
}

impl State for Scripted {
    fn outcomes(&self) -> &OutcomeSet {
        &self.outcomes
    }

    fn input_keys(&self) -> &[KeyName] {
        &self.inputs
    }

    fn output_keys(&self) -> &[KeyName] {
        &self.outputs
    }

    fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for key in &self.inputs {
            ctx.read(key.as_str())?;
        }
        for (key, value) in &self.writes {
            ctx.write(key, value.clone())?;
        }
        if let Some(signal) = &self.preempt_after {
            signal.request();
        }
        let next = self.script.pop_front().unwrap_or(self.last);
        Ok(Outcome::from_static(next))
    }
}
