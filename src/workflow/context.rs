//! Replay-aware execution context handed to a running workflow.
//!
//! All non-deterministic inputs of a workflow pass through here: the clock,
//! activity results and the outcome of the timer/signal race. Each is looked
//! up in the journal first and only executed when the journal has no entry
//! for it yet. New entries are persisted before the call returns.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use tokio::sync::mpsc;

use crate::error::{BreakerError, BreakerResult};
use crate::storage::{JsonStore, StorageError};
use crate::workflow::clock::RuntimeClock;
use crate::workflow::journal::{mismatched_outcome, Journal, RaceWinner, StepOutcome};
use crate::workflow::types::{InstanceRecord, WorkflowState};

pub struct WorkflowContext {
    instance_id: String,
    journal: Journal,
    store: JsonStore<InstanceRecord>,
    clock: RuntimeClock,
    wakeups: mpsc::UnboundedReceiver<()>,
}

impl WorkflowContext {
    pub(crate) fn new(
        record: &InstanceRecord,
        store: JsonStore<InstanceRecord>,
        clock: RuntimeClock,
        wakeups: mpsc::UnboundedReceiver<()>,
    ) -> Self {
        Self {
            instance_id: record.instance_id.clone(),
            journal: Journal::new(record.journal.clone()),
            store,
            clock,
            wakeups,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// True while the workflow is re-running steps that already completed.
    pub fn is_replaying(&self) -> bool {
        self.journal.is_replaying()
    }

    /// Journaled current time.
    pub async fn current_time(&mut self, step: &str) -> BreakerResult<DateTime<Utc>> {
        if let Some(recorded) = self.journal.replay(step)? {
            return match recorded {
                StepOutcome::Clock { at } => Ok(at),
                other => Err(self.mismatch(step, "clock", &other)),
            };
        }

        let at = self.clock.now();
        self.record(step, StepOutcome::Clock { at }, None)?;
        Ok(at)
    }

    /// Run `activity` once; later replays return the recorded result.
    pub async fn call_activity<T, F, Fut>(&mut self, step: &str, activity: F) -> BreakerResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(recorded) = self.journal.replay(step)? {
            return match recorded {
                StepOutcome::Activity { result } => {
                    Ok(serde_json::from_value(result).map_err(StorageError::from)?)
                }
                other => Err(self.mismatch(step, "activity", &other)),
            };
        }

        let value = activity().await;
        let result = serde_json::to_value(&value).map_err(StorageError::from)?;
        self.record(step, StepOutcome::Activity { result }, None)?;
        Ok(value)
    }

    /// Wait until `deadline` or until `signal` is delivered, whichever comes first.
    ///
    /// The loser is discarded: the timer future is dropped when the signal
    /// wins, and a signal arriving after the timer stays unconsumed.
    pub async fn race_timer_with_signal(
        &mut self,
        step: &str,
        deadline: DateTime<Utc>,
        signal: &str,
    ) -> BreakerResult<RaceWinner> {
        if let Some(recorded) = self.journal.replay(step)? {
            return match recorded {
                StepOutcome::Race { winner } => Ok(winner),
                other => Err(self.mismatch(step, "race", &other)),
            };
        }

        let mut wakeups_open = true;
        let winner = loop {
            if self.has_pending_signal(signal) {
                break RaceWinner::Signal;
            }

            let remaining = self.clock.until(deadline);
            if remaining.is_zero() {
                break RaceWinner::Timer;
            }

            if !wakeups_open {
                tokio::time::sleep(remaining).await;
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(remaining) => {}
                woke = self.wakeups.recv() => {
                    if woke.is_none() {
                        wakeups_open = false;
                    }
                }
            }
        };

        let consume = (winner == RaceWinner::Signal).then_some(signal);
        self.record(step, StepOutcome::Race { winner }, consume)?;
        Ok(winner)
    }

    /// Persist a progress marker. Not journaled; replay re-derives it.
    pub fn set_state(&self, state: WorkflowState) -> BreakerResult<()> {
        let now = self.clock.now();
        self.store.upsert_with(&self.instance_id, |current| match current {
            Some(record) if record.state != state => {
                let mut record = record.clone();
                record.state = state;
                record.updated_at = now;
                (Some(record), ())
            }
            _ => (None, ()),
        })?;
        Ok(())
    }

    fn mismatch(&self, step: &str, expected: &str, found: &StepOutcome) -> BreakerError {
        mismatched_outcome(self.journal.position().saturating_sub(1), step, expected, found)
    }

    fn has_pending_signal(&self, signal: &str) -> bool {
        self.store
            .get(&self.instance_id)
            .map(|r| r.inbox.iter().any(|s| s == signal))
            .unwrap_or(false)
    }

    fn record(
        &mut self,
        step: &str,
        outcome: StepOutcome,
        consume_signal: Option<&str>,
    ) -> BreakerResult<()> {
        let entry = self.journal.append(step, outcome);
        let now = self.clock.now();
        let instance_id = self.instance_id.clone();

        self.store.upsert_with(&self.instance_id, |current| match current {
            Some(record) => {
                let mut record = record.clone();
                record.journal.push(entry);
                record.updated_at = now;
                if let Some(signal) = consume_signal {
                    if let Some(pos) = record.inbox.iter().position(|s| s == signal) {
                        record.inbox.remove(pos);
                    }
                }
                (Some(record), Ok(()))
            }
            None => (None, Err(BreakerError::InstanceNotFound(instance_id))),
        })?
    }
}
