//! Per-resource circuit state machine.
//!
//! # State Transitions
//! ```text
//! Closed → Open: |window| >= failure_threshold after insert + prune (trip)
//! Open → Open:   AddFailure is ignored
//! any → Closed:  CloseCircuit
//! any → Open:    OpenCircuit (no workflow is started)
//! ```
//!
//! The actor itself is pure: it does not start workflows or persist anything.
//! The registry applies an operation to a copy, performs the side effects the
//! outcome asks for, and only then commits the copy.

use serde::{Deserialize, Serialize};

use crate::circuit::state::{window_cutoff, CircuitState, FailureRecord, FailureWindow};
use crate::config::CircuitConfig;
use crate::error::BreakerResult;
use crate::workflow::types::BreakerConfig;

/// Result of reporting a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AddFailureOutcome {
    /// The circuit was already open; nothing changed.
    ConflictIgnored,
    /// The failure was counted without reaching the threshold.
    Recorded { window_len: usize },
    /// The threshold was reached. The caller must launch the breaker workflow.
    Tripped {
        window_len: usize,
        config: BreakerConfig,
    },
}

/// Durable state of one resource key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitActor {
    pub state: CircuitState,
    pub window: FailureWindow,
}

impl CircuitActor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a failure and decide whether the circuit trips.
    pub fn add_failure(
        &mut self,
        resource_key: &str,
        record: FailureRecord,
        config: &CircuitConfig,
    ) -> BreakerResult<AddFailureOutcome> {
        record.validate()?;

        if self.state == CircuitState::Open {
            return Ok(AddFailureOutcome::ConflictIgnored);
        }

        // The new record can itself fall outside the window if it is stale.
        let cutoff = window_cutoff(record.failure_time, config.window_size());
        self.window.insert(record);
        self.window.prune_before(cutoff);

        let window_len = self.window.len();
        if window_len >= config.failure_threshold {
            let breaker = BreakerConfig::new(resource_key, config.backoff_duration())?;
            self.state = CircuitState::Open;
            Ok(AddFailureOutcome::Tripped {
                window_len,
                config: breaker,
            })
        } else {
            Ok(AddFailureOutcome::Recorded { window_len })
        }
    }

    /// Close the circuit. The window is left as is.
    pub fn close(&mut self) {
        self.state = CircuitState::Closed;
    }

    /// Open the circuit without launching remediation.
    pub fn open(&mut self) {
        self.state = CircuitState::Open;
    }

    pub fn is_open(&self) -> bool {
        self.state == CircuitState::Open
    }
}
