//! # Behavior Files
//!
//! The YAML shape the CLI reads. A behavior file describes one machine,
//! the scripted replies of the capabilities its states call, and the
//! userdata the run starts from:
//!
//! ```yaml
//! machine:
//!   name: FETCH
//!   outcomes: [succeeded, failed]
//!   states:
//!     - name: DRIVE
//!       capability:
//!         capability: navigation
//!         operation: drive_to
//!         params: { room: kitchen }
//!         signals: { arrived: succeeded }
//!         on_error: failed
//!       transitions: { succeeded: succeeded, failed: failed }
//! capabilities:
//!   navigation:
//!     drive_to:
//!       - { signal: arrived }
//! ```
//!
//! Nothing here is validated beyond its shape; wiring checks happen when
//! the file is assembled.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::{self, DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use skillflow_states::mock::ScriptStep;
use skillflow_states::{CapabilityCall, WaitTimeParams};

/// A whole behavior file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BehaviorFile {
    /// The root machine.
    pub machine: MachineSpec,
    /// Capability name to operation name to scripted replies.
    #[serde(default)]
    pub capabilities: BTreeMap<String, BTreeMap<String, Vec<ScriptStep>>>,
    /// Initial userdata for `run`.
    #[serde(default)]
    pub userdata: Map<String, Value>,
}

impl BehaviorFile {
    /// Read and parse a behavior file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read behavior file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// One machine, root or nested.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineSpec {
    pub name: String,
    pub outcomes: Vec<String>,
    /// Defaults to the first state.
    #[serde(default)]
    pub initial: Option<String>,
    #[serde(default)]
    pub input_keys: Vec<String>,
    #[serde(default)]
    pub output_keys: Vec<String>,
    pub states: Vec<StateSpec>,
}

/// One state entry: its name, what it is, and how it is wired.
///
/// Besides `name`, `transitions` and `remapping`, an entry carries exactly
/// one key naming its kind. Any other key is rejected.
#[derive(Debug, Clone)]
pub struct StateSpec {
    pub name: String,
    pub kind: StateKind,
    /// Outcome to target (state or machine outcome).
    pub transitions: BTreeMap<String, String>,
    /// State-local key to machine key.
    pub remapping: BTreeMap<String, String>,
}

impl<'de> Deserialize<'de> for StateSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut entry = BTreeMap::<String, serde_yaml::Value>::deserialize(deserializer)?;
        let name: String =
            take(&mut entry, "name")?.ok_or_else(|| D::Error::missing_field("name"))?;
        let transitions = take(&mut entry, "transitions")?.unwrap_or_default();
        let remapping = take(&mut entry, "remapping")?.unwrap_or_default();

        if let Some(unknown) = entry.keys().find(|k| !StateKind::NAMES.contains(&k.as_str())) {
            return Err(D::Error::custom(format!(
                "unknown field `{unknown}` in state {name}, expected name, transitions, remapping or one of {}",
                StateKind::NAMES.join(", ")
            )));
        }
        if entry.len() > 1 {
            let kinds: Vec<&str> = entry.keys().map(String::as_str).collect();
            return Err(D::Error::custom(format!(
                "state {name} declares more than one kind: {}",
                kinds.join(", ")
            )));
        }
        let Some((tag, body)) = entry.into_iter().next() else {
            return Err(D::Error::custom(format!(
                "state {name} declares no kind, expected one of {}",
                StateKind::NAMES.join(", ")
            )));
        };
        let kind = StateKind::from_entry(&tag, body)
            .map_err(|e| D::Error::custom(format!("state {name}: {tag}: {e}")))?;

        Ok(Self {
            name,
            kind,
            transitions,
            remapping,
        })
    }
}

fn take<T: DeserializeOwned, E: de::Error>(
    entry: &mut BTreeMap<String, serde_yaml::Value>,
    key: &str,
) -> std::result::Result<Option<T>, E> {
    entry
        .remove(key)
        .map(|value| serde_yaml::from_value(value).map_err(|e| E::custom(format!("{key}: {e}"))))
        .transpose()
}

/// The kinds of state a behavior file can declare.
#[derive(Debug, Clone)]
pub enum StateKind {
    /// Returns `script` outcomes in order, repeating the last one.
    Scripted(ScriptedSpec),
    /// Calls an operation of a scripted capability.
    Capability(CapabilityCall),
    /// Sleeps, polling for preemption.
    Wait(WaitTimeParams),
    /// Top of a retry loop. States sharing a `counter` share attempts.
    CheckTries { counter: String, max_tries: usize },
    /// Rewinds a named retry counter.
    ResetTries { counter: String },
    /// Always returns the same outcome.
    Fixed { outcome: String },
    /// A nested machine.
    Machine(MachineSpec),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CheckTriesEntry {
    counter: String,
    max_tries: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CounterEntry {
    counter: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FixedEntry {
    outcome: String,
}

impl StateKind {
    /// Keys that select a kind in a state entry.
    pub const NAMES: &'static [&'static str] = &[
        "scripted",
        "capability",
        "wait",
        "check_tries",
        "reset_tries",
        "fixed",
        "machine",
    ];

    /// Short name used in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scripted(_) => "scripted",
            Self::Capability(_) => "capability",
            Self::Wait(_) => "wait",
            Self::CheckTries { .. } => "check_tries",
            Self::ResetTries { .. } => "reset_tries",
            Self::Fixed { .. } => "fixed",
            Self::Machine(_) => "machine",
        }
    }

    fn from_entry(tag: &str, body: serde_yaml::Value) -> std::result::Result<Self, serde_yaml::Error> {
        Ok(match tag {
            "scripted" => Self::Scripted(serde_yaml::from_value(body)?),
            "capability" => Self::Capability(serde_yaml::from_value(body)?),
            "wait" => Self::Wait(serde_yaml::from_value(body)?),
            "check_tries" => {
                let CheckTriesEntry { counter, max_tries } = serde_yaml::from_value(body)?;
                Self::CheckTries { counter, max_tries }
            }
            "reset_tries" => {
                let CounterEntry { counter } = serde_yaml::from_value(body)?;
                Self::ResetTries { counter }
            }
            "fixed" => {
                let FixedEntry { outcome } = serde_yaml::from_value(body)?;
                Self::Fixed { outcome }
            }
            "machine" => Self::Machine(serde_yaml::from_value(body)?),
            other => return Err(de::Error::unknown_variant(other, Self::NAMES)),
        })
    }
}

/// Parameters of a scripted state.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptedSpec {
    pub outcomes: Vec<String>,
    pub script: Vec<String>,
    /// Keys the state reads; a missing value fails the run.
    #[serde(default)]
    pub reads: Vec<String>,
    /// Values written on every execution.
    #[serde(default)]
    pub writes: BTreeMap<String, Value>,
}
