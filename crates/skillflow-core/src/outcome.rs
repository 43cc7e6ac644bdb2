//! # Outcome Sets
//!
//! Every state and every machine exposes a closed, ordered set of outcome
//! labels that is fixed when it is constructed.

use serde::{Deserialize, Serialize};

use crate::error::LabelError;
use crate::label::Outcome;

/// The outcome label a machine reports when it is preempted, if it
/// declares it.
pub const PREEMPTED: &str = "preempted";

/// A closed, duplicate-free set of outcome labels in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OutcomeSet(Vec<Outcome>);

impl OutcomeSet {
    /// Build a set from raw labels, validating each and rejecting
    /// duplicates and an empty set.
    pub fn new<I, S>(labels: I) -> Result<Self, LabelError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut outcomes: Vec<Outcome> = Vec::new();
        for raw in labels {
            let outcome = Outcome::new(raw.as_ref())?;
            if outcomes.contains(&outcome) {
                return Err(LabelError::Duplicate {
                    label: outcome.to_string(),
                });
            }
            outcomes.push(outcome);
        }
        if outcomes.is_empty() {
            return Err(LabelError::EmptySet);
        }
        Ok(Self(outcomes))
    }

    /// Build a set from string literals without validation.
    ///
    /// Used by library states whose outcomes are fixed in code. Machine
    /// builders call [`Self::check`] on every child, so a bad literal is
    /// still caught before execution.
    pub fn fixed(labels: &[&'static str]) -> Self {
        Self(labels.iter().map(|l| Outcome::from_static(l)).collect())
    }

    /// Validate every label and the absence of duplicates.
    pub fn check(&self) -> Result<(), LabelError> {
        if self.0.is_empty() {
            return Err(LabelError::EmptySet);
        }
        for (idx, outcome) in self.0.iter().enumerate() {
            outcome.check()?;
            if self.0[..idx].contains(outcome) {
                return Err(LabelError::Duplicate {
                    label: outcome.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Whether `label` is one of the declared outcomes.
    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|o| o.as_str() == label)
    }

    /// Look up the declared outcome equal to `label`.
    pub fn get(&self, label: &str) -> Option<&Outcome> {
        self.0.iter().find(|o| o.as_str() == label)
    }

    /// Iterate in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Outcome> {
        self.0.iter()
    }

    /// Number of declared outcomes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty. Only possible for sets built with
    /// [`Self::fixed`] from an empty slice.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the set declares the dedicated `preempted` outcome.
    pub fn declares_preempted(&self) -> bool {
        self.contains(PREEMPTED)
    }
}

impl<'a> IntoIterator for &'a OutcomeSet {
    type Item = &'a Outcome;
    type IntoIter = std::slice::Iter<'a, Outcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::fmt::Display for OutcomeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (idx, outcome) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            f.write_str(outcome.as_str())?;
        }
        f.write_str("}")
    }
}

impl<'de> Deserialize<'de> for OutcomeSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Vec::<String>::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}
