//! # Timed Wait
//!
//! Blocks the run for a fixed duration. The sleep is split into short
//! slices so a preemption request is noticed within one poll interval.

use std::time::{Duration, Instant};

use serde::Deserialize;
use skillflow_core::{ConstructionDefect, Outcome, OutcomeSet};
use skillflow_machine::{ExecutionContext, ExecutionError, State};
use tracing::{debug, warn};

fn default_poll_interval_ms() -> u64 {
    50
}

/// Construction parameters for [`WaitTime`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitTimeParams {
    /// Total wait in seconds.
    pub seconds: f64,
    /// How often the preemption signal is checked.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl WaitTimeParams {
    pub fn seconds(seconds: f64) -> Self {
        Self {
            seconds,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Waits, returning `waited` or `preempted`.
pub struct WaitTime {
    duration: Duration,
    poll: Duration,
    outcomes: OutcomeSet,
}

impl WaitTime {
    pub fn new(params: WaitTimeParams) -> Result<Self, ConstructionDefect> {
        if !params.seconds.is_finite() || params.seconds < 0.0 {
            return Err(ConstructionDefect::InvalidParameter {
                state: "wait".into(),
                detail: format!("seconds must be a finite, non-negative number, got {}", params.seconds),
            });
        }
        if params.poll_interval_ms == 0 {
            return Err(ConstructionDefect::InvalidParameter {
                state: "wait".into(),
                detail: "poll_interval_ms must be at least 1".into(),
            });
        }
        let duration = Duration::try_from_secs_f64(params.seconds).map_err(|e| {
            ConstructionDefect::InvalidParameter {
                state: "wait".into(),
                detail: format!("seconds {} is not a representable duration: {e}", params.seconds),
            }
        })?;
        Ok(Self {
            duration,
            poll: Duration::from_millis(params.poll_interval_ms),
            outcomes: OutcomeSet::fixed(&["waited", "preempted"]),
        })
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl State for WaitTime {
    fn outcomes(&self) -> &OutcomeSet {
        &self.outcomes
    }

    fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecutionError> {
        // A deadline past the clock's range means wait until preempted.
        let deadline = Instant::now().checked_add(self.duration);
        debug!(state = %ctx.state_name(), duration_ms = self.duration.as_millis() as u64, "waiting");
        loop {
            if ctx.preempt_requested() {
                warn!(state = %ctx.state_name(), "wait preempted");
                return Ok(Outcome::preempted());
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(Outcome::from_static("waited"));
                    }
                    self.poll.min(deadline - now)
                }
                None => self.poll,
            };
            std::thread::sleep(slice);
        }
    }

    fn kind(&self) -> &str {
        "wait"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{execute_once, execute_with};
    use skillflow_machine::{PreemptSignal, Userdata};

    #[test]
    fn waits_the_full_duration() {
        let mut state = WaitTime::new(WaitTimeParams::seconds(0.03)).unwrap();
        let start = Instant::now();
        assert_eq!(execute_once(&mut state).unwrap(), "waited");
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn zero_wait_returns_immediately() {
        let mut state = WaitTime::new(WaitTimeParams::seconds(0.0)).unwrap();
        assert_eq!(execute_once(&mut state).unwrap(), "waited");
    }

    #[test]
    fn preemption_cuts_the_wait_short() {
        let mut state = WaitTime::new(WaitTimeParams {
            seconds: 30.0,
            poll_interval_ms: 5,
        })
        .unwrap();
        let signal = PreemptSignal::new();
        let remote = signal.clone();
        let requester = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.request();
        });
        let start = Instant::now();
        let outcome = execute_with(&mut state, &mut Userdata::new(), &signal).unwrap();
        requester.join().unwrap();
        assert_eq!(outcome, "preempted");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn invalid_durations_are_rejected() {
        assert!(WaitTime::new(WaitTimeParams::seconds(-1.0)).is_err());
        assert!(WaitTime::new(WaitTimeParams::seconds(f64::NAN)).is_err());
        assert!(WaitTime::new(WaitTimeParams {
            seconds: 1.0,
            poll_interval_ms: 0
        })
        .is_err());
    }

    #[test]
    fn unrepresentable_duration_is_a_defect() {
        let err = WaitTime::new(WaitTimeParams::seconds(1e20)).err().unwrap();
        assert!(matches!(err, ConstructionDefect::InvalidParameter { .. }));
    }

    #[test]
    fn huge_wait_still_yields_to_preemption() {
        let mut state = WaitTime::new(WaitTimeParams::seconds(1.0e19)).unwrap();
        let signal = PreemptSignal::new();
        signal.request();
        let outcome = execute_with(&mut state, &mut Userdata::new(), &signal).unwrap();
        assert_eq!(outcome, "preempted");
    }

    #[test]
    fn poll_interval_defaults() {
        let params: WaitTimeParams = serde_yaml::from_str("seconds: 2.5").unwrap();
        assert_eq!(params, WaitTimeParams::seconds(2.5));
    }
}
