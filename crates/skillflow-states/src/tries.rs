//! # Bounded Retries
//!
//! A retry loop is two states sharing one [`TryCounter`]: [`CheckTries`]
//! sits at the top of the loop and answers `retry` until the limit is hit,
//! [`ResetTries`] rewinds the counter once the loop is left (on success or
//! after giving up) so the next pass starts fresh.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use skillflow_core::{ConstructionDefect, Outcome, OutcomeSet};
use skillflow_machine::{ExecutionContext, ExecutionError, State};
use tracing::{debug, info};

/// Attempt count shared between the states of one retry loop.
#[derive(Debug, Clone, Default)]
pub struct TryCounter(Arc<AtomicUsize>);

impl TryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts counted since the last reset.
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }
}

/// Construction parameters for [`CheckTries`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckTriesParams {
    /// How many times `retry` is returned before `max_reached`.
    pub max_tries: usize,
}

/// Counts an attempt and reports whether another is allowed.
pub struct CheckTries {
    counter: TryCounter,
    max_tries: usize,
    outcomes: OutcomeSet,
}

impl CheckTries {
    pub fn new(counter: TryCounter, params: CheckTriesParams) -> Result<Self, ConstructionDefect> {
        if params.max_tries == 0 {
            return Err(ConstructionDefect::InvalidParameter {
                state: "check_tries".into(),
                detail: "max_tries must be at least 1".into(),
            });
        }
        Ok(Self {
            counter,
            max_tries: params.max_tries,
            outcomes: OutcomeSet::fixed(&["retry", "max_reached"]),
        })
    }

    pub fn counter(&self) -> &TryCounter {
        &self.counter
    }
}

impl State for CheckTries {
    fn outcomes(&self) -> &OutcomeSet {
        &self.outcomes
    }

    fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecutionError> {
        let attempt = self.counter.bump();
        if attempt > self.max_tries {
            info!(state = %ctx.state_name(), max_tries = self.max_tries, "retry limit reached");
            return Ok(Outcome::from_static("max_reached"));
        }
        debug!(state = %ctx.state_name(), attempt, max_tries = self.max_tries, "retrying");
        Ok(Outcome::from_static("retry"))
    }

    fn kind(&self) -> &str {
        "check_tries"
    }
}

/// Rewinds a [`TryCounter`].
pub struct ResetTries {
    counter: TryCounter,
    outcomes: OutcomeSet,
}

impl ResetTries {
    pub fn new(counter: TryCounter) -> Self {
        Self {
            counter,
            outcomes: OutcomeSet::fixed(&["reset"]),
        }
    }
}

impl State for ResetTries {
    fn outcomes(&self) -> &OutcomeSet {
        &self.outcomes
    }

    fn execute(&mut self, _ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecutionError> {
        self.counter.reset();
        Ok(Outcome::from_static("reset"))
    }

    fn kind(&self) -> &str {
        "reset_tries"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::execute_once;

    #[test]
    fn retries_up_to_the_limit() {
        let counter = TryCounter::new();
        let mut check = CheckTries::new(counter.clone(), CheckTriesParams { max_tries: 2 }).unwrap();
        assert_eq!(execute_once(&mut check).unwrap(), "retry");
        assert_eq!(execute_once(&mut check).unwrap(), "retry");
        assert_eq!(execute_once(&mut check).unwrap(), "max_reached");
        assert_eq!(execute_once(&mut check).unwrap(), "max_reached");
        assert_eq!(counter.count(), 4);
    }

    #[test]
    fn reset_starts_a_fresh_loop() {
        let counter = TryCounter::new();
        let mut check = CheckTries::new(counter.clone(), CheckTriesParams { max_tries: 1 }).unwrap();
        let mut reset = ResetTries::new(counter.clone());
        execute_once(&mut check).unwrap();
        assert_eq!(execute_once(&mut check).unwrap(), "max_reached");
        assert_eq!(execute_once(&mut reset).unwrap(), "reset");
        assert_eq!(counter.count(), 0);
        assert_eq!(execute_once(&mut check).unwrap(), "retry");
    }

    #[test]
    fn zero_limit_is_rejected() {
        let result = CheckTries::new(TryCounter::new(), CheckTriesParams { max_tries: 0 });
        assert!(matches!(result, Err(ConstructionDefect::InvalidParameter { .. })));
    }

    #[test]
    fn params_deserialize_from_yaml() {
        let params: CheckTriesParams = serde_yaml::from_str("max_tries: 3").unwrap();
        assert_eq!(params.max_tries, 3);
        assert!(serde_yaml::from_str::<CheckTriesParams>("max: 3").is_err());
    }
}
