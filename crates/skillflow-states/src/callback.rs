//! # Callback States
//!
//! The escape hatch for one-off logic that does not deserve its own type:
//! a closure with a declared outcome set.

use skillflow_core::{ConstructionDefect, KeyName, LabelError, Outcome, OutcomeSet};
use skillflow_machine::{ExecutionContext, ExecutionError, State};

type Callback = dyn FnMut(&mut ExecutionContext<'_>) -> Result<Outcome, ExecutionError> + Send;

/// A state whose `execute` is a closure.
///
/// The closure owns whatever it captures, so counters it keeps persist
/// across executions like any other state's internal data.
pub struct CallbackState {
    outcomes: OutcomeSet,
    inputs: Vec<KeyName>,
    outputs: Vec<KeyName>,
    callback: Box<Callback>,
}

impl CallbackState {
    /// Wrap `callback`, which must return one of `outcomes`.
    pub fn new<I, S, F>(outcomes: I, callback: F) -> Result<Self, ConstructionDefect>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&mut ExecutionContext<'_>) -> Result<Outcome, ExecutionError> + Send + 'static,
    {
        let outcomes =
            OutcomeSet::new(outcomes).map_err(|e| ConstructionDefect::label("callback outcomes", e))?;
        Ok(Self {
            outcomes,
            inputs: Vec::new(),
            outputs: Vec::new(),
            callback: Box::new(callback),
        })
    }

    /// Declare userdata keys the callback reads and writes.
    pub fn with_keys<I, O>(mut self, inputs: I, outputs: O) -> Result<Self, ConstructionDefect>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        O: IntoIterator,
        O::Item: AsRef<str>,
    {
        let parse = |k: &str| -> Result<KeyName, LabelError> { KeyName::new(k) };
        self.inputs = inputs
            .into_iter()
            .map(|k| parse(k.as_ref()))
            .collect::<Result<_, _>>()
            .map_err(|e| ConstructionDefect::label("callback input keys", e))?;
        self.outputs = outputs
            .into_iter()
            .map(|k| parse(k.as_ref()))
            .collect::<Result<_, _>>()
            .map_err(|e| ConstructionDefect::label("callback output keys", e))?;
        Ok(self)
    }
}

impl State for CallbackState {
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
        (self.callback)(ctx)
    }

    fn kind(&self) -> &str {
        "callback"
    }
}
