//! # Capability Calls
//!
//! A [`Capability`] is an external skill (navigation, speech, grasping,
//! perception) reached through a named operation. The core never looks
//! inside one: it passes resolved parameters in and gets a signal label
//! (and optionally a result value) back.
//!
//! [`CapabilityState`] is the bridge between that open-ended signal and the
//! closed outcome set a state must honour. Every signal the state expects is
//! mapped explicitly; anything else, including an invocation error, lands on
//! the declared `on_error` outcome. Parameters that fail to resolve land on
//! `on_unresolved` (defaulting to `on_error`).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use skillflow_core::{ConstructionDefect, Outcome, OutcomeSet};
use skillflow_designator::{Designator, WriteHandle};
use skillflow_machine::{ExecutionContext, ExecutionError, State};
use thiserror::Error;
use tracing::{debug, warn};

// ── Contract ────────────────────────────────────────────────────────

/// What a capability operation reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityResponse {
    /// Free-form completion signal, e.g. `succeeded`, `aborted`, `timeout`.
    pub signal: String,
    /// Optional payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl CapabilityResponse {
    pub fn signal(signal: impl Into<String>) -> Self {
        Self {
            signal: signal.into(),
            result: None,
        }
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }
}

/// A capability could not carry out an invocation at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// The capability has no such operation.
    #[error("capability {capability} has no operation {operation}")]
    UnknownOperation {
        /// The capability.
        capability: String,
        /// The requested operation.
        operation: String,
    },

    /// The operation raised an error instead of signalling.
    #[error("capability {capability} operation {operation} failed: {message}")]
    Failed {
        /// The capability.
        capability: String,
        /// The operation.
        operation: String,
        /// What went wrong.
        message: String,
    },
}

/// An external skill invoked from inside a state.
///
/// Invocation is synchronous: a long-running operation blocks the calling
/// state until it signals.
pub trait Capability: Send + Sync {
    /// Name used in diagnostics and behavior files.
    fn name(&self) -> &str;

    /// Run `operation` with `params`.
    fn invoke(
        &self,
        operation: &str,
        params: &Map<String, Value>,
    ) -> Result<CapabilityResponse, CapabilityError>;
}

// ── State ───────────────────────────────────────────────────────────

/// Invokes one capability operation and maps its signal to an outcome.
pub struct CapabilityState {
    capability: Arc<dyn Capability>,
    operation: String,
    params: Vec<(String, Designator)>,
    signals: BTreeMap<String, Outcome>,
    on_error: Outcome,
    on_unresolved: Outcome,
    result: Option<WriteHandle>,
    outcomes: OutcomeSet,
}

impl CapabilityState {
    /// Start building a call to `operation` on `capability`.
    pub fn builder(capability: Arc<dyn Capability>, operation: impl Into<String>) -> CapabilityStateBuilder {
        CapabilityStateBuilder {
            capability,
            operation: operation.into(),
            params: Vec::new(),
            signals: Vec::new(),
            on_error: None,
            on_unresolved: None,
            result: None,
        }
    }

    /// Name of the invoked operation.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    fn resolve_params(&self) -> Result<Map<String, Value>, String> {
        let mut resolved = Map::new();
        for (key, designator) in &self.params {
            let value = designator
                .resolve()
                .map_err(|e| format!("parameter {key}: {e}"))?;
            resolved.insert(key.clone(), value);
        }
        Ok(resolved)
    }
}

impl State for CapabilityState {
    fn outcomes(&self) -> &OutcomeSet {
        &self.outcomes
    }

    fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecutionError> {
        let capability = self.capability.name();
        let params = match self.resolve_params() {
            Ok(params) => params,
            Err(reason) => {
                warn!(state = %ctx.state_name(), capability, %reason, "capability parameters unresolved");
                return Ok(self.on_unresolved.clone());
            }
        };

        debug!(state = %ctx.state_name(), capability, operation = %self.operation, "invoking capability");
        let response = match self.capability.invoke(&self.operation, &params) {
            Ok(response) => response,
            Err(e) => {
                warn!(state = %ctx.state_name(), error = %e, "capability invocation failed");
                return Ok(self.on_error.clone());
            }
        };

        let Some(outcome) = self.signals.get(&response.signal).cloned() else {
            warn!(
                state = %ctx.state_name(),
                capability,
                signal = %response.signal,
                "unmapped capability signal"
            );
            return Ok(self.on_error.clone());
        };

        if let (Some(handle), Some(result)) = (&self.result, response.result) {
            if let Err(e) = handle.write(result) {
                warn!(state = %ctx.state_name(), error = %e, "capability result rejected");
                return Ok(self.on_error.clone());
            }
        }
        Ok(outcome)
    }

    fn kind(&self) -> &str {
        "capability"
    }
}

impl std::fmt::Debug for CapabilityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityState")
            .field("capability", &self.capability.name())
            .field("operation", &self.operation)
            .field("outcomes", &self.outcomes)
            .finish()
    }
}

/// Builder for [`CapabilityState`]. Labels are validated in
/// [`CapabilityStateBuilder::build`].
pub struct CapabilityStateBuilder {
    capability: Arc<dyn Capability>,
    operation: String,
    params: Vec<(String, Designator)>,
    signals: Vec<(String, String)>,
    on_error: Option<String>,
    on_unresolved: Option<String>,
    result: Option<WriteHandle>,
}

impl CapabilityStateBuilder {
    /// Pass the resolved value of `source` as parameter `key`.
    pub fn param(mut self, key: impl Into<String>, source: &Designator) -> Self {
        self.params.push((key.into(), source.clone()));
        self
    }

    /// Pass a fixed value as parameter `key`.
    pub fn param_value(self, key: impl Into<String>, value: Value) -> Self {
        let constant = Designator::constant(value);
        self.param(key, &constant)
    }

    /// Map `signal` to `outcome`.
    pub fn on(mut self, signal: impl Into<String>, outcome: impl Into<String>) -> Self {
        self.signals.push((signal.into(), outcome.into()));
        self
    }

    /// Outcome for invocation errors and unmapped signals. Required.
    pub fn on_error(mut self, outcome: impl Into<String>) -> Self {
        self.on_error = Some(outcome.into());
        self
    }

    /// Outcome when a parameter cannot be resolved.
    pub fn on_unresolved(mut self, outcome: impl Into<String>) -> Self {
        self.on_unresolved = Some(outcome.into());
        self
    }

    /// Write the response payload into a variable.
    pub fn write_result(mut self, handle: WriteHandle) -> Self {
        self.result = Some(handle);
        self
    }

    pub fn build(self) -> Result<CapabilityState, ConstructionDefect> {
        let context = format!("capability {}", self.capability.name());
        let invalid = |detail: String| ConstructionDefect::InvalidParameter {
            state: context.clone(),
            detail,
        };
        let label = |raw: &str| {
            Outcome::new(raw).map_err(|e| ConstructionDefect::label(context.clone(), e))
        };

        let on_error = self
            .on_error
            .as_deref()
            .ok_or_else(|| invalid("no on_error outcome declared".into()))
            .and_then(label)?;
        let on_unresolved = match self.on_unresolved.as_deref() {
            Some(raw) => label(raw)?,
            None => on_error.clone(),
        };

        let mut signals = BTreeMap::new();
        let mut declared: Vec<Outcome> = Vec::new();
        for (signal, raw) in &self.signals {
            let outcome = label(raw)?;
            if signals.insert(signal.clone(), outcome.clone()).is_some() {
                return Err(invalid(format!("signal {signal} mapped more than once")));
            }
            declared.push(outcome);
        }
        if signals.is_empty() {
            return Err(invalid("no signal is mapped to an outcome".into()));
        }
        declared.push(on_error.clone());
        declared.push(on_unresolved.clone());
        let mut seen = std::collections::HashSet::new();
        declared.retain(|o| seen.insert(o.clone()));
        let outcomes =
            OutcomeSet::new(declared.iter().map(Outcome::as_str)).map_err(|e| ConstructionDefect::label(context.clone(), e))?;

        Ok(CapabilityState {
            capability: self.capability,
            operation: self.operation,
            params: self.params,
            signals,
            on_error,
            on_unresolved,
            result: self.result,
            outcomes,
        })
    }
}

// ── Configuration ───────────────────────────────────────────────────

/// A capability call as carried by a behavior file.
///
/// ```yaml
/// capability: navigation
/// operation: drive_to
/// params: { room: kitchen }
/// signals: { arrived: succeeded, blocked: failed }
/// on_error: failed
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilityCall {
    pub capability: String,
    pub operation: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    pub signals: BTreeMap<String, String>,
    pub on_error: String,
    #[serde(default)]
    pub on_unresolved: Option<String>,
}

impl CapabilityCall {
    /// Build the state against a concrete capability.
    pub fn into_state(self, capability: Arc<dyn Capability>) -> Result<CapabilityState, ConstructionDefect> {
        if capability.name() != self.capability {
            return Err(ConstructionDefect::InvalidParameter {
                state: format!("capability {}", self.capability),
                detail: format!("bound to capability {}", capability.name()),
            });
        }
        let mut builder = CapabilityState::builder(capability, self.operation).on_error(self.on_error);
        if let Some(outcome) = self.on_unresolved {
            builder = builder.on_unresolved(outcome);
        }
        for (key, value) in self.params {
            builder = builder.param_value(key, value);
        }
        for (signal, outcome) in self.signals {
            builder = builder.on(signal, outcome);
        }
        builder.build()
    }
}
