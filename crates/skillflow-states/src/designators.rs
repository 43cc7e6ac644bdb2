//! # Designator States
//!
//! Small states whose whole job is moving or inspecting a designator value:
//! copying one designator into a variable, branching on a boolean,
//! flipping a flag, or returning an outcome picked at run time.
//!
//! Each state checks the declared types of the designators it is given
//! when it is constructed and maps run-time resolution failures onto its
//! own `failed` outcome (or a declared fallback).

use skillflow_core::{ConstructionDefect, Outcome, OutcomeSet, ValueType};
use skillflow_designator::{Designator, WriteHandle};
use skillflow_machine::{ExecutionContext, ExecutionError, State};
use tracing::warn;

// ── WriteDesignator ─────────────────────────────────────────────────

/// Resolves `source` and writes the value into a variable.
pub struct WriteDesignator {
    source: Designator,
    target: WriteHandle,
    outcomes: OutcomeSet,
}

impl WriteDesignator {
    pub fn new(source: &Designator, target: WriteHandle) -> Result<Self, ConstructionDefect> {
        if !source.value_type().is_assignable_to(target.value_type()) {
            return Err(ConstructionDefect::TypeMismatch {
                designator: target.name().to_string(),
                expected: target.value_type().to_string(),
                found: format!("{} ({})", source.name(), source.value_type()),
            });
        }
        Ok(Self {
            source: source.clone(),
            target,
            outcomes: OutcomeSet::fixed(&["written", "failed"]),
        })
    }
}

impl State for WriteDesignator {
    fn outcomes(&self) -> &OutcomeSet {
        &self.outcomes
    }

    fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecutionError> {
        let written = self
            .source
            .resolve()
            .map_err(|e| e.to_string())
            .and_then(|value| self.target.write(value).map_err(|e| e.to_string()));
        match written {
            Ok(()) => Ok(Outcome::from_static("written")),
            Err(reason) => {
                warn!(state = %ctx.state_name(), %reason, "designator not written");
                Ok(Outcome::from_static("failed"))
            }
        }
    }

    fn kind(&self) -> &str {
        "write_designator"
    }
}

// ── CheckBool ───────────────────────────────────────────────────────

/// Branches on a boolean designator: `true`, `false`, or `failed` when it
/// cannot be resolved.
pub struct CheckBool {
    check: Designator,
    outcomes: OutcomeSet,
}

impl CheckBool {
    pub fn new(check: &Designator) -> Result<Self, ConstructionDefect> {
        check.expect_type(&ValueType::Bool)?;
        Ok(Self {
            check: check.clone(),
            outcomes: OutcomeSet::fixed(&["true", "false", "failed"]),
        })
    }
}

impl State for CheckBool {
    fn outcomes(&self) -> &OutcomeSet {
        &self.outcomes
    }

    fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecutionError> {
        match self.check.resolve_as::<bool>() {
            Ok(true) => Ok(Outcome::from_static("true")),
            Ok(false) => Ok(Outcome::from_static("false")),
            Err(failure) => {
                warn!(state = %ctx.state_name(), error = %failure, "boolean check failed");
                Ok(Outcome::from_static("failed"))
            }
        }
    }

    fn kind(&self) -> &str {
        "check_bool"
    }
}

// ── ToggleBool ──────────────────────────────────────────────────────

/// Flips a boolean variable. An unset variable counts as `false`.
pub struct ToggleBool {
    flag: WriteHandle,
    outcomes: OutcomeSet,
}

impl ToggleBool {
    pub fn new(flag: WriteHandle) -> Result<Self, ConstructionDefect> {
        flag.designator().expect_type(&ValueType::Bool)?;
        Ok(Self {
            flag,
            outcomes: OutcomeSet::fixed(&["done"]),
        })
    }
}

impl State for ToggleBool {
    fn outcomes(&self) -> &OutcomeSet {
        &self.outcomes
    }

    fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecutionError> {
        let current = self.flag.designator().resolve_as::<bool>().unwrap_or(false);
        self.flag
            .write(serde_json::Value::Bool(!current))
            .map_err(|e| ExecutionError::StateFailure {
                state: ctx.state_name().to_string(),
                message: e.to_string(),
            })?;
        Ok(Outcome::from_static("done"))
    }

    fn kind(&self) -> &str {
        "toggle_bool"
    }
}

// ── FixedOutcome ────────────────────────────────────────────────────

/// Returns an outcome without doing anything else.
///
/// Built with [`FixedOutcome::new`] it always returns the same label, which
/// is handy as a placeholder while a behavior is being wired. Built with
/// [`FixedOutcome::from_designator`] the label is read from a string
/// designator at run time; anything outside the declared set (or a failed
/// resolution) yields the fallback.
pub struct FixedOutcome {
    outcomes: OutcomeSet,
    source: Option<Designator>,
    fallback: Outcome,
}

impl FixedOutcome {
    pub fn new(outcome: &str) -> Result<Self, ConstructionDefect> {
        let fallback =
            Outcome::new(outcome).map_err(|e| ConstructionDefect::label("fixed outcome", e))?;
        let outcomes = OutcomeSet::new([outcome])
            .map_err(|e| ConstructionDefect::label("fixed outcome", e))?;
        Ok(Self {
            outcomes,
            source: None,
            fallback,
        })
    }

    pub fn from_designator<I, S>(
        outcomes: I,
        source: &Designator,
        fallback: &str,
    ) -> Result<Self, ConstructionDefect>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let outcomes =
            OutcomeSet::new(outcomes).map_err(|e| ConstructionDefect::label("fixed outcomes", e))?;
        source.expect_type(&ValueType::String)?;
        let fallback = outcomes
            .get(fallback)
            .cloned()
            .ok_or_else(|| ConstructionDefect::InvalidParameter {
                state: "fixed".into(),
                detail: format!("fallback {fallback} is not one of {outcomes}"),
            })?;
        Ok(Self {
            outcomes,
            source: Some(source.clone()),
            fallback,
        })
    }
}

impl State for FixedOutcome {
    fn outcomes(&self) -> &OutcomeSet {
        &self.outcomes
    }

    fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecutionError> {
        let Some(source) = &self.source else {
            return Ok(self.fallback.clone());
        };
        match source.resolve_as::<String>() {
            Ok(label) => match self.outcomes.get(&label) {
                Some(outcome) => Ok(outcome.clone()),
                None => {
                    warn!(state = %ctx.state_name(), %label, fallback = %self.fallback, "undeclared outcome requested");
                    Ok(self.fallback.clone())
                }
            },
            Err(failure) => {
                warn!(state = %ctx.state_name(), error = %failure, fallback = %self.fallback, "outcome not resolved");
                Ok(self.fallback.clone())
            }
        }
    }

    fn kind(&self) -> &str {
        "fixed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::execute_once;
    use serde_json::json;
    use skillflow_designator::VariableDesignator;

    #[test]
    fn write_designator_copies_value() {
        let target = VariableDesignator::new(ValueType::String);
        let mut state =
            WriteDesignator::new(&Designator::constant(json!("kitchen")), target.writeable().unwrap())
                .unwrap();
        assert_eq!(execute_once(&mut state).unwrap(), "written");
        assert_eq!(target.resolve().unwrap(), json!("kitchen"));
    }

    #[test]
    fn write_designator_maps_unset_source_to_failed() {
        let source = VariableDesignator::new(ValueType::String);
        let target = VariableDesignator::new(ValueType::String);
        let mut state = WriteDesignator::new(&source, target.writeable().unwrap()).unwrap();
        assert_eq!(execute_once(&mut state).unwrap(), "failed");
        assert!(!target.is_set());
    }

    #[test]
    fn write_designator_rejects_incompatible_types() {
        let target = VariableDesignator::new(ValueType::Bool);
        let result = WriteDesignator::new(&Designator::constant(json!(3)), target.writeable().unwrap());
        assert!(matches!(result, Err(ConstructionDefect::TypeMismatch { .. })));
    }

    #[test]
    fn check_bool_branches() {
        let mut yes = CheckBool::new(&Designator::constant(json!(true))).unwrap();
        let mut no = CheckBool::new(&Designator::constant(json!(false))).unwrap();
        assert_eq!(execute_once(&mut yes).unwrap(), "true");
        assert_eq!(execute_once(&mut no).unwrap(), "false");
    }

    #[test]
    fn check_bool_unset_is_failed() {
        let flag = VariableDesignator::new(ValueType::Bool);
        let mut state = CheckBool::new(&flag).unwrap();
        assert_eq!(execute_once(&mut state).unwrap(), "failed");
    }

    #[test]
    fn check_bool_requires_bool() {
        assert!(CheckBool::new(&Designator::constant(json!("yes"))).is_err());
    }

    #[test]
    fn toggle_flips_and_treats_unset_as_false() {
        let flag = VariableDesignator::new(ValueType::Bool);
        let mut state = ToggleBool::new(flag.writeable().unwrap()).unwrap();
        execute_once(&mut state).unwrap();
        assert_eq!(flag.resolve().unwrap(), json!(true));
        execute_once(&mut state).unwrap();
        assert_eq!(flag.resolve().unwrap(), json!(false));
    }

    #[test]
    fn fixed_outcome_always_returns_its_label() {
        let mut state = FixedOutcome::new("succeeded").unwrap();
        assert_eq!(state.outcomes().len(), 1);
        assert_eq!(execute_once(&mut state).unwrap(), "succeeded");
    }

    #[test]
    fn designated_outcome_uses_fallback_for_unknown_labels() {
        let choice = VariableDesignator::new(ValueType::String);
        let handle = choice.writeable().unwrap();
        let mut state =
            FixedOutcome::from_designator(["left", "right", "unknown"], &choice, "unknown").unwrap();
        assert_eq!(execute_once(&mut state).unwrap(), "unknown");
        handle.write(json!("left")).unwrap();
        assert_eq!(execute_once(&mut state).unwrap(), "left");
        handle.write(json!("up")).unwrap();
        assert_eq!(execute_once(&mut state).unwrap(), "unknown");
    }

    #[test]
    fn fallback_must_be_declared() {
        let choice = Designator::constant(json!("left"));
        let result = FixedOutcome::from_designator(["left"], &choice, "right");
        assert!(matches!(result, Err(ConstructionDefect::InvalidParameter { .. })));
    }
}
