//! Append-only replay journal.
//!
//! Every step of a workflow instance (clock reads, activity results, the
//! timer/signal race) is appended here and persisted before the workflow
//! moves on. On resume the journal is replayed from the start: recorded steps
//! hand back their outcome instead of executing again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BreakerError, BreakerResult};

/// Which side of the cooldown race finished first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceWinner {
    Timer,
    Signal,
}

/// Recorded outcome of a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
    Clock { at: DateTime<Utc> },
    Activity { result: serde_json::Value },
    Race { winner: RaceWinner },
}

impl StepOutcome {
    fn kind(&self) -> &'static str {
        match self {
            StepOutcome::Clock { .. } => "clock",
            StepOutcome::Activity { .. } => "activity",
            StepOutcome::Race { .. } => "race",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub seq: usize,
    pub step: String,
    pub outcome: StepOutcome,
}

/// Journal plus a replay cursor.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
    cursor: usize,
}

impl Journal {
    pub fn new(entries: Vec<JournalEntry>) -> Self {
        Self { entries, cursor: 0 }
    }

    /// True while recorded steps remain ahead of the cursor.
    pub fn is_replaying(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// Take the next recorded outcome if `step` was already executed.
    ///
    /// Fails when the journal recorded a different step at this position.
    pub fn replay(&mut self, step: &str) -> BreakerResult<Option<StepOutcome>> {
        let Some(entry) = self.entries.get(self.cursor) else {
            return Ok(None);
        };
        if entry.step != step {
            return Err(BreakerError::NonDeterministicReplay {
                seq: entry.seq,
                expected: step.to_string(),
                recorded: entry.step.clone(),
            });
        }
        self.cursor += 1;
        Ok(Some(entry.outcome.clone()))
    }

    /// Append a freshly executed step. Only valid once replay has caught up.
    pub fn append(&mut self, step: &str, outcome: StepOutcome) -> JournalEntry {
        debug_assert!(!self.is_replaying());
        let entry = JournalEntry {
            seq: self.entries.len(),
            step: step.to_string(),
            outcome,
        };
        self.entries.push(entry.clone());
        self.cursor = self.entries.len();
        entry
    }

    /// Number of entries consumed or appended so far.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Error for a recorded outcome whose kind does not fit the step replaying it.
pub(crate) fn mismatched_outcome(seq: usize, step: &str, expected: &str, found: &StepOutcome) -> BreakerError {
    BreakerError::NonDeterministicReplay {
        seq,
        expected: format!("{} ({})", step, expected),
        recorded: format!("{} ({})", step, found.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_then_append() {
        let mut journal = Journal::default();
        journal.append("stop", StepOutcome::Activity { result: serde_json::json!(200) });
        journal.append("cooldown", StepOutcome::Race { winner: RaceWinner::Signal });

        let mut resumed = Journal::new(journal.entries().to_vec());
        assert!(resumed.is_replaying());
        assert!(matches!(
            resumed.replay("stop").unwrap(),
            Some(StepOutcome::Activity { .. })
        ));
        assert_eq!(
            resumed.replay("cooldown").unwrap(),
            Some(StepOutcome::Race { winner: RaceWinner::Signal })
        );
        assert!(!resumed.is_replaying());
        assert_eq!(resumed.replay("start").unwrap(), None);

        let entry = resumed.append("start", StepOutcome::Activity { result: serde_json::json!(200) });
        assert_eq!(entry.seq, 2);
        assert_eq!(resumed.len(), 3);
    }

    #[test]
    fn test_replay_detects_divergence() {
        let mut journal = Journal::new(vec![JournalEntry {
            seq: 0,
            step: "stop".into(),
            outcome: StepOutcome::Activity { result: serde_json::Value::Null },
        }]);

        let err = journal.replay("start").unwrap_err();
        assert!(matches!(
            err,
            BreakerError::NonDeterministicReplay { seq: 0, .. }
        ));
    }
}
