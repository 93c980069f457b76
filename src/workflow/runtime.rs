//! Workflow runtime: owns instance records, schedules instances, delivers signals.
//!
//! # Responsibilities
//! - Start at most one running instance per key
//! - Persist every journal entry before the workflow continues
//! - Deliver external signals through the durable inbox
//! - Re-run every non-terminal instance on startup
//! - Close the circuit of a completed instance after it is marked terminal

use dashmap::DashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;

use crate::circuit::TripLauncher;
use crate::controller::ResourceController;
use crate::error::{BreakerError, BreakerResult};
use crate::observability::metrics;
use crate::storage::JsonStore;
use crate::workflow::breaker::{BreakerWorkflow, CircuitReset, CLOSE_CIRCUIT_STEP};
use crate::workflow::clock::RuntimeClock;
use crate::workflow::context::WorkflowContext;
use crate::workflow::journal::{JournalEntry, StepOutcome};
use crate::workflow::types::{
    BreakerConfig, InstanceRecord, InstanceStatus, StartOutcome, WorkflowState,
};

struct RuntimeInner<C> {
    store: JsonStore<InstanceRecord>,
    clock: RuntimeClock,
    workflow: BreakerWorkflow<C>,
    /// Wakes a running instance when a signal lands in its inbox.
    wakers: DashMap<String, mpsc::UnboundedSender<()>>,
    circuits: OnceLock<Arc<dyn CircuitReset>>,
}

/// Crash-recoverable scheduler for breaker workflow instances.
pub struct WorkflowRuntime<C> {
    inner: Arc<RuntimeInner<C>>,
}

impl<C> Clone for WorkflowRuntime<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: ResourceController> WorkflowRuntime<C> {
    pub fn new(
        store: JsonStore<InstanceRecord>,
        clock: RuntimeClock,
        workflow: BreakerWorkflow<C>,
    ) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                store,
                clock,
                workflow,
                wakers: DashMap::new(),
                circuits: OnceLock::new(),
            }),
        }
    }

    /// Attach the circuit registry used by the close-on-recovery step.
    ///
    /// Only the first binding takes effect.
    pub fn bind_circuits(&self, circuits: Arc<dyn CircuitReset>) {
        if self.inner.circuits.set(circuits).is_err() {
            tracing::warn!("Circuit registry already bound to workflow runtime");
        }
    }

    /// Start an instance for `config`, unless one is already running for its key.
    ///
    /// A key whose previous instance is terminal is reused with a new generation.
    pub fn start_instance(&self, config: BreakerConfig) -> BreakerResult<StartOutcome> {
        let key = config.instance_key().to_string();
        let now = self.inner.clock.now();

        let created = self.inner.store.upsert_with(&key, |current| match current {
            Some(existing) if !existing.state.is_terminal() => (None, None),
            existing => {
                let generation = existing.map(|r| r.generation + 1).unwrap_or(1);
                let record = InstanceRecord::new(config.clone(), generation, now);
                (Some(record.clone()), Some(record))
            }
        })?;

        match created {
            Some(record) => {
                tracing::info!(
                    instance_id = %record.instance_id,
                    generation = record.generation,
                    backoff_secs = config.backoff_duration().as_secs(),
                    "Started breaker workflow"
                );
                metrics::record_workflow_transition(WorkflowState::Created.as_str());
                self.spawn(record);
                Ok(StartOutcome::Started)
            }
            None => {
                tracing::info!(instance_id = %key, "Breaker workflow already running, start ignored");
                Ok(StartOutcome::AlreadyRunning)
            }
        }
    }

    /// Deliver `signal` to a running instance.
    pub fn raise_event(&self, instance_id: &str, signal: &str) -> BreakerResult<()> {
        let now = self.inner.clock.now();
        self.inner
            .store
            .upsert_with(instance_id, |current| match current {
                None => (None, Err(BreakerError::InstanceNotFound(instance_id.to_string()))),
                Some(record) if record.state.is_terminal() => (
                    None,
                    Err(BreakerError::InstanceNotRunning(instance_id.to_string())),
                ),
                Some(record) => {
                    let mut record = record.clone();
                    record.inbox.push(signal.to_string());
                    record.updated_at = now;
                    (Some(record), Ok(()))
                }
            })??;

        if let Some(waker) = self.inner.wakers.get(instance_id) {
            let _ = waker.send(());
        }
        tracing::info!(instance_id = %instance_id, signal = %signal, "Signal raised");
        Ok(())
    }

    pub fn status(&self, instance_id: &str) -> Option<InstanceStatus> {
        self.inner.store.get(instance_id).map(|r| r.status())
    }

    pub fn journal(&self, instance_id: &str) -> Option<Vec<JournalEntry>> {
        self.inner.store.get(instance_id).map(|r| r.journal)
    }

    /// Status of every known instance, sorted by id.
    pub fn instances(&self) -> Vec<InstanceStatus> {
        let mut statuses: Vec<InstanceStatus> = self
            .inner
            .store
            .entries()
            .into_iter()
            .map(|(_, r)| r.status())
            .collect();
        statuses.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        statuses
    }

    /// Number of instances that are not terminal or still have to close their circuit.
    pub fn active_count(&self) -> usize {
        self.inner
            .store
            .entries()
            .iter()
            .filter(|(_, r)| r.is_active())
            .count()
    }

    /// Re-run every non-terminal instance from its journal, and finish
    /// circuit closes that a completed instance did not get to record.
    pub fn resume_pending(&self) -> BreakerResult<usize> {
        let mut resumed = 0;
        for (key, record) in self.inner.store.entries() {
            if record.state.is_terminal() {
                if record.close_pending {
                    tracing::info!(instance_id = %key, "Resuming circuit close of completed breaker workflow");
                    let runtime = self.clone();
                    tokio::spawn(async move {
                        runtime
                            .close_circuit(&key, record.generation, record.config.resource_id())
                            .await;
                    });
                    resumed += 1;
                }
                continue;
            }
            if self.inner.wakers.contains_key(&key) {
                continue;
            }
            tracing::info!(
                instance_id = %key,
                state = %record.state,
                steps = record.journal.len(),
                "Resuming breaker workflow"
            );
            self.spawn(record);
            resumed += 1;
        }
        Ok(resumed)
    }

    fn spawn(&self, record: InstanceRecord) {
        let (waker, wakeups) = mpsc::unbounded_channel();
        self.inner
            .wakers
            .insert(record.instance_id.clone(), waker.clone());
        metrics::record_active_workflows(self.active_count());

        let ctx = WorkflowContext::new(
            &record,
            self.inner.store.clone(),
            self.inner.clock,
            wakeups,
        );
        let runtime = self.clone();
        tokio::spawn(async move {
            runtime
                .execute(ctx, record.config, record.generation, waker)
                .await;
        });
    }

    async fn execute(
        self,
        mut ctx: WorkflowContext,
        config: BreakerConfig,
        generation: u64,
        waker: mpsc::UnboundedSender<()>,
    ) {
        let instance_id = ctx.instance_id().to_string();
        let result = self.inner.workflow.run(&mut ctx, &config).await;

        let (state, last_error) = match result {
            Ok(()) => (WorkflowState::Completed, None),
            Err(e) => {
                tracing::error!(
                    instance_id = %instance_id,
                    resource_id = %config.resource_id(),
                    error = %e,
                    "Breaker workflow failed"
                );
                (WorkflowState::Failed, Some(e.to_string()))
            }
        };
        let close_pending = state == WorkflowState::Completed
            && self.inner.workflow.closes_on_recovery()
            && self.inner.circuits.get().is_some();

        if let Err(e) = self.finish(&instance_id, generation, state, last_error, close_pending) {
            tracing::error!(instance_id = %instance_id, error = %e, "Failed to record workflow outcome");
        }

        self.inner
            .wakers
            .remove_if(&instance_id, |_, current| current.same_channel(&waker));
        metrics::record_workflow_transition(state.as_str());
        tracing::info!(instance_id = %instance_id, state = %state, "Breaker workflow finished");

        if close_pending {
            self.close_circuit(&instance_id, generation, config.resource_id())
                .await;
        }
        metrics::record_active_workflows(self.active_count());
    }

    fn finish(
        &self,
        instance_id: &str,
        generation: u64,
        state: WorkflowState,
        last_error: Option<String>,
        close_pending: bool,
    ) -> BreakerResult<()> {
        let now = self.inner.clock.now();
        self.inner.store.upsert_with(instance_id, |current| match current {
            Some(record) if record.generation == generation => {
                let mut record = record.clone();
                record.state = state;
                record.last_error = last_error;
                record.close_pending = close_pending;
                record.updated_at = now;
                (Some(record), ())
            }
            _ => (None, ()),
        })?;
        Ok(())
    }

    /// Close the circuit of a completed instance and journal the result.
    ///
    /// The entry is dropped when the key has already moved on to a newer generation.
    async fn close_circuit(&self, instance_id: &str, generation: u64, resource_id: &str) {
        let Some(circuits) = self.inner.circuits.get() else {
            return;
        };
        let closed = self
            .inner
            .workflow
            .reset_circuit(resource_id, circuits.as_ref())
            .await;
        let outcome = StepOutcome::Activity {
            result: serde_json::to_value(&closed).unwrap_or_default(),
        };

        let now = self.inner.clock.now();
        let recorded = self.inner.store.upsert_with(instance_id, |current| match current {
            Some(record) if record.generation == generation && record.close_pending => {
                let mut record = record.clone();
                record.journal.push(JournalEntry {
                    seq: record.journal.len(),
                    step: CLOSE_CIRCUIT_STEP.to_string(),
                    outcome,
                });
                record.close_pending = false;
                record.updated_at = now;
                (Some(record), ())
            }
            _ => (None, ()),
        });
        if let Err(e) = recorded {
            tracing::error!(instance_id = %instance_id, error = %e, "Failed to record circuit close");
        }
    }
}

impl<C: ResourceController> TripLauncher for WorkflowRuntime<C> {
    fn launch(&self, config: BreakerConfig) -> BreakerResult<StartOutcome> {
        self.start_instance(config)
    }
}
