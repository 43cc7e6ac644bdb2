//! # Mock Collaborators
//!
//! Stand-ins for the robot so behaviors can be built and exercised without
//! hardware: a [`ScriptedCapability`] that answers each operation from a
//! script, and a [`StaticWorldModel`] that answers queries from a fixed
//! list of entities.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use skillflow_designator::{CollaboratorError, QueryCollaborator};

use crate::capability::{Capability, CapabilityError, CapabilityResponse};

// ── ScriptedCapability ──────────────────────────────────────────────

/// One scripted reply.
///
/// In YAML a reply is either `{ signal: arrived }` (optionally with a
/// `result`) or `{ fail: "motor fault" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptStep {
    /// Signal completion.
    Respond {
        signal: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
    /// Raise an invocation error.
    Fail { fail: String },
}

impl ScriptStep {
    pub fn respond(signal: impl Into<String>) -> Self {
        Self::Respond {
            signal: signal.into(),
            result: None,
        }
    }

    pub fn respond_with(signal: impl Into<String>, result: Value) -> Self {
        Self::Respond {
            signal: signal.into(),
            result: Some(result),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail {
            fail: message.into(),
        }
    }
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub operation: String,
    pub params: Map<String, Value>,
}

#[derive(Debug, Default)]
struct Script {
    steps: Vec<ScriptStep>,
    next: usize,
}

/// A capability whose operations reply from per-operation scripts.
///
/// Replies are consumed in order; once a script runs out its last step
/// repeats. Every invocation is recorded.
#[derive(Debug)]
pub struct ScriptedCapability {
    name: String,
    scripts: Mutex<BTreeMap<String, Script>>,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedCapability {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scripts: Mutex::new(BTreeMap::new()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Build from an operation → steps table, as read from a behavior file.
    pub fn from_scripts(name: impl Into<String>, scripts: BTreeMap<String, Vec<ScriptStep>>) -> Self {
        scripts
            .into_iter()
            .fold(Self::new(name), |cap, (op, steps)| cap.script(op, steps))
    }

    /// Script `operation`, replacing any earlier script.
    pub fn script(self, operation: impl Into<String>, steps: Vec<ScriptStep>) -> Self {
        self.scripts
            .lock()
            .insert(operation.into(), Script { steps, next: 0 });
        self
    }

    /// Calls seen so far, oldest first.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }
}

impl Capability for ScriptedCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(
        &self,
        operation: &str,
        params: &Map<String, Value>,
    ) -> Result<CapabilityResponse, CapabilityError> {
        self.invocations.lock().push(Invocation {
            operation: operation.to_string(),
            params: params.clone(),
        });

        let mut scripts = self.scripts.lock();
        let script = scripts
            .get_mut(operation)
            .ok_or_else(|| CapabilityError::UnknownOperation {
                capability: self.name.clone(),
                operation: operation.to_string(),
            })?;
        let idx = script.next.min(script.steps.len().saturating_sub(1));
        script.next += 1;
        let step = script
            .steps
            .get(idx)
            .ok_or_else(|| CapabilityError::Failed {
                capability: self.name.clone(),
                operation: operation.to_string(),
                message: "empty script".into(),
            })?;
        tracing::trace!(capability = %self.name, operation, step = idx, "scripted reply");

        match step {
            ScriptStep::Respond { signal, result } => Ok(CapabilityResponse {
                signal: signal.clone(),
                result: result.clone(),
            }),
            ScriptStep::Fail { fail } => Err(CapabilityError::Failed {
                capability: self.name.clone(),
                operation: operation.to_string(),
                message: fail.clone(),
            }),
        }
    }
}

// ── StaticWorldModel ────────────────────────────────────────────────

/// A world model holding a fixed list of entities.
///
/// A query returns, in insertion order, every entity whose fields equal
/// all query parameters.
#[derive(Debug, Clone, Default)]
pub struct StaticWorldModel {
    name: String,
    entities: Vec<Value>,
}

impl StaticWorldModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: Vec::new(),
        }
    }

    pub fn with_entity(mut self, entity: Value) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn entities(&self) -> &[Value] {
        &self.entities
    }
}

impl QueryCollaborator for StaticWorldModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn query(&self, params: &Map<String, Value>) -> Result<Vec<Value>, CollaboratorError> {
        Ok(self
            .entities
            .iter()
            .filter(|entity| {
                params
                    .iter()
                    .all(|(key, want)| entity.get(key).is_some_and(|have| have == want))
            })
            .cloned()
            .collect())
    }
}
