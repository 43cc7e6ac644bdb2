//! # Preemption Signal
//!
//! A shared flag an external party raises to abort a run. The executor
//! checks it before every state execution; a state that blocks for a long
//! time may poll it through its execution context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable handle to one preemption flag. All clones observe the same
/// flag.
#[derive(Debug, Clone, Default)]
pub struct PreemptSignal {
    flag: Arc<AtomicBool>,
}

impl PreemptSignal {
    /// A lowered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop at the next state boundary.
    pub fn request(&self) {
        tracing::warn!("preemption requested");
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether a request is pending.
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Lower the signal.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
