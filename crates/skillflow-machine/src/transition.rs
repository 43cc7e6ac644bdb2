//! # Transition Tables
//!
//! [`Transitions`] and [`Remapping`] are the per-state wiring handed to a
//! [`crate::StateMachineBuilder`]. They hold raw strings; the builder
//! validates and compiles them, so a typo surfaces as a construction defect
//! with the offending state named rather than as a panic at the call site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use skillflow_core::{Outcome, StateName};

/// Outcome-to-target mapping of one state.
///
/// A target is either the name of a sibling state or one of the enclosing
/// machine's exposed outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transitions {
    entries: Vec<(String, String)>,
}

impl Transitions {
    /// No transitions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `outcome` to `target`.
    pub fn on(mut self, outcome: impl Into<String>, target: impl Into<String>) -> Self {
        self.entries.push((outcome.into(), target.into()));
        self
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(o, t)| (o.as_str(), t.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<O: Into<String>, T: Into<String>> FromIterator<(O, T)> for Transitions {
    fn from_iter<I: IntoIterator<Item = (O, T)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(o, t)| (o.into(), t.into()))
                .collect(),
        }
    }
}

/// Mapping from a state's own key names to the machine's key names.
///
/// Keys without an entry keep their name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Remapping {
    entries: Vec<(String, String)>,
}

impl Remapping {
    /// No remapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose the state's `local` key as the machine's `machine` key.
    pub fn map(mut self, local: impl Into<String>, machine: impl Into<String>) -> Self {
        self.entries.push((local.into(), machine.into()));
        self
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(l, m)| (l.as_str(), m.as_str()))
    }

    /// The machine key for `local`, if remapped.
    pub fn get(&self, local: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(l, _)| l == local)
            .map(|(_, m)| m.as_str())
    }
}

impl<L: Into<String>, M: Into<String>> FromIterator<(L, M)> for Remapping {
    fn from_iter<I: IntoIterator<Item = (L, M)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(l, m)| (l.into(), m.into()))
                .collect(),
        }
    }
}

/// Where a compiled transition leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    /// Index of a sibling state.
    State(usize),
    /// Terminate the machine with this exposed outcome.
    Outcome(Outcome),
}

/// One transition taken during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// The machine that took the transition.
    pub machine: String,
    /// The state that finished.
    pub from: StateName,
    /// The outcome it returned.
    pub outcome: Outcome,
    /// The next state, or the machine outcome when `terminal`.
    pub to: String,
    /// Whether the transition ended the machine.
    pub terminal: bool,
    /// When the transition was taken (UTC).
    pub at: DateTime<Utc>,
}

impl std::fmt::Display for TransitionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let arrow = if self.terminal { "==>" } else { "-->" };
        write!(
            f,
            "{}: {} --{}{} {}",
            self.machine, self.from, self.outcome, arrow, self.to
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_order() {
        let t = Transitions::new()
            .on("succeeded", "SERVE")
            .on("failed", "aborted");
        let pairs: Vec<_> = t.iter().collect();
        assert_eq!(pairs, vec![("succeeded", "SERVE"), ("failed", "aborted")]);
    }

    #[test]
    fn collects_from_pairs() {
        let t: Transitions = [("done", "END")].into_iter().collect();
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn remapping_lookup() {
        let r = Remapping::new().map("item", "selected_drink");
        assert_eq!(r.get("item"), Some("selected_drink"));
        assert_eq!(r.get("other"), None);
    }

    #[test]
    fn transitions_deserialize_from_yaml_style_pairs() {
        let t: Transitions =
            serde_json::from_str(r#"[["ok", "NEXT"], ["failed", "aborted"]]"#).unwrap();
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn record_display_marks_terminal() {
        let record = TransitionRecord {
            machine: "MAIN".into(),
            from: StateName::new("C").unwrap(),
            outcome: Outcome::new("done").unwrap(),
            to: "done".into(),
            terminal: true,
            at: Utc::now(),
        };
        assert_eq!(record.to_string(), "MAIN: C --done==> done");
    }
}
