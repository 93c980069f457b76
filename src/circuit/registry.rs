//! Keyed actor registry.
//!
//! One tokio task per resource key owns that key's `CircuitActor`. Callers talk
//! to it through a bounded mailbox and get the answer back on a oneshot
//! channel, so operations on the same key never overlap while different keys
//! proceed in parallel.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::circuit::actor::{AddFailureOutcome, CircuitActor};
use crate::circuit::state::{CircuitState, FailureRecord};
use crate::config::CircuitConfig;
use crate::error::{BreakerError, BreakerResult};
use crate::observability::metrics;
use crate::storage::JsonStore;
use crate::workflow::{BreakerConfig, CircuitReset, StartOutcome};

const MAILBOX_CAPACITY: usize = 64;

/// Starts the breaker workflow for a tripped circuit.
pub trait TripLauncher: Send + Sync {
    fn launch(&self, config: BreakerConfig) -> BreakerResult<StartOutcome>;
}

/// Point-in-time view of one circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSnapshot {
    pub resource_key: String,
    pub state: CircuitState,
    pub window_len: usize,
    pub failures: Vec<FailureRecord>,
}

impl CircuitSnapshot {
    fn of(resource_key: &str, actor: &CircuitActor) -> Self {
        let mut failures: Vec<FailureRecord> = actor.window.iter().cloned().collect();
        failures.sort_by(|a, b| a.failure_time.cmp(&b.failure_time));
        Self {
            resource_key: resource_key.to_string(),
            state: actor.state,
            window_len: actor.window.len(),
            failures,
        }
    }
}

enum Command {
    AddFailure {
        record: FailureRecord,
        reply: oneshot::Sender<BreakerResult<AddFailureOutcome>>,
    },
    Close {
        reply: oneshot::Sender<BreakerResult<()>>,
    },
    Open {
        reply: oneshot::Sender<BreakerResult<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<CircuitSnapshot>,
    },
}

struct RegistryInner {
    store: JsonStore<CircuitActor>,
    config: CircuitConfig,
    launcher: Arc<dyn TripLauncher>,
    mailboxes: DashMap<String, mpsc::Sender<Command>>,
}

/// Routes circuit operations to the single-writer actor of each resource key.
#[derive(Clone)]
pub struct CircuitRegistry {
    inner: Arc<RegistryInner>,
}

impl CircuitRegistry {
    pub fn new(
        store: JsonStore<CircuitActor>,
        config: CircuitConfig,
        launcher: Arc<dyn TripLauncher>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                store,
                config,
                launcher,
                mailboxes: DashMap::new(),
            }),
        }
    }

    /// Report a failure for `resource_key`.
    pub async fn add_failure(
        &self,
        resource_key: &str,
        record: FailureRecord,
    ) -> BreakerResult<AddFailureOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(resource_key, Command::AddFailure { record, reply })
            .await?;
        rx.await.map_err(|_| dropped_reply(resource_key))?
    }

    /// Force the circuit closed. The failure window is kept.
    pub async fn close_circuit(&self, resource_key: &str) -> BreakerResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(resource_key, Command::Close { reply }).await?;
        rx.await.map_err(|_| dropped_reply(resource_key))?
    }

    /// Force the circuit open. No workflow is started.
    pub async fn open_circuit(&self, resource_key: &str) -> BreakerResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(resource_key, Command::Open { reply }).await?;
        rx.await.map_err(|_| dropped_reply(resource_key))?
    }

    /// Current state of `resource_key`.
    ///
    /// Keys without a live actor are read from the store; no actor is started.
    pub async fn snapshot(&self, resource_key: &str) -> BreakerResult<CircuitSnapshot> {
        validate_key(resource_key)?;
        let live = self
            .inner
            .mailboxes
            .get(resource_key)
            .map(|mailbox| mailbox.clone())
            .filter(|mailbox| !mailbox.is_closed());
        let Some(mailbox) = live else {
            let actor = self.inner.store.get(resource_key).unwrap_or_default();
            return Ok(CircuitSnapshot::of(resource_key, &actor));
        };

        let (reply, rx) = oneshot::channel();
        mailbox
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| actor_stopped(resource_key))?;
        rx.await.map_err(|_| dropped_reply(resource_key))
    }

    /// Committed state of every persisted circuit, sorted by key.
    pub fn circuits(&self) -> Vec<CircuitSnapshot> {
        let mut circuits: Vec<CircuitSnapshot> = self
            .inner
            .store
            .entries()
            .iter()
            .map(|(key, actor)| CircuitSnapshot::of(key, actor))
            .collect();
        circuits.sort_by(|a, b| a.resource_key.cmp(&b.resource_key));
        circuits
    }

    async fn send(&self, resource_key: &str, command: Command) -> BreakerResult<()> {
        validate_key(resource_key)?;
        self.mailbox(resource_key)
            .send(command)
            .await
            .map_err(|_| actor_stopped(resource_key))
    }

    /// Mailbox of `resource_key`, spawning its actor on first use.
    fn mailbox(&self, resource_key: &str) -> mpsc::Sender<Command> {
        match self.inner.mailboxes.entry(resource_key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_closed() {
                    occupied.insert(self.spawn_actor(resource_key));
                }
                occupied.get().clone()
            }
            Entry::Vacant(vacant) => vacant.insert(self.spawn_actor(resource_key)).clone(),
        }
    }

    fn spawn_actor(&self, resource_key: &str) -> mpsc::Sender<Command> {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let inner = self.inner.clone();
        let key = resource_key.to_string();
        tokio::spawn(async move {
            inner.run_actor(key, rx).await;
        });
        tx
    }
}

impl RegistryInner {
    async fn run_actor(&self, key: String, mut rx: mpsc::Receiver<Command>) {
        let mut actor = self.store.get(&key).unwrap_or_default();
        tracing::debug!(resource_key = %key, state = %actor.state, "Circuit actor activated");

        while let Some(command) = rx.recv().await {
            match command {
                Command::AddFailure { record, reply } => {
                    let _ = reply.send(self.add_failure(&key, &mut actor, record));
                }
                Command::Close { reply } => {
                    let _ = reply.send(self.transition(&key, &mut actor, CircuitState::Closed));
                }
                Command::Open { reply } => {
                    let _ = reply.send(self.transition(&key, &mut actor, CircuitState::Open));
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(CircuitSnapshot::of(&key, &actor));
                }
            }
        }
    }

    /// Apply to a copy, launch remediation if tripped, then commit.
    fn add_failure(
        &self,
        key: &str,
        actor: &mut CircuitActor,
        record: FailureRecord,
    ) -> BreakerResult<AddFailureOutcome> {
        let mut next = actor.clone();
        let outcome = match next.add_failure(key, record, &self.config) {
            Ok(outcome) => outcome,
            Err(e) => {
                metrics::record_failure_reported("rejected");
                return Err(e);
            }
        };

        match &outcome {
            AddFailureOutcome::ConflictIgnored => {
                tracing::info!(
                    resource_key = %key,
                    "Failure reported for a circuit that is already open"
                );
                metrics::record_failure_reported("ignored");
                return Ok(outcome);
            }
            AddFailureOutcome::Recorded { window_len } => {
                tracing::info!(
                    resource_key = %key,
                    window_len,
                    window_secs = self.config.window_size_secs,
                    "Failure recorded"
                );
                metrics::record_failure_reported("recorded");
            }
            AddFailureOutcome::Tripped { window_len, config } => {
                let started = self.launcher.launch(config.clone()).map_err(|e| match e {
                    BreakerError::RuntimeUnavailable(_) => e,
                    other => BreakerError::RuntimeUnavailable(other.to_string()),
                })?;
                tracing::error!(
                    resource_key = %key,
                    window_len,
                    workflow = ?started,
                    "Break this circuit"
                );
                metrics::record_failure_reported("tripped");
                metrics::record_trip();
            }
        }

        let persisted = self.store.put(key, next.clone());
        *actor = next;
        persisted?;
        Ok(outcome)
    }

    fn transition(
        &self,
        key: &str,
        actor: &mut CircuitActor,
        target: CircuitState,
    ) -> BreakerResult<()> {
        let mut next = actor.clone();
        match target {
            CircuitState::Closed => next.close(),
            CircuitState::Open => next.open(),
        }

        let persisted = self.store.put(key, next.clone());
        let previous = actor.state;
        *actor = next;
        persisted?;

        tracing::info!(resource_key = %key, from = %previous, to = %target, "Circuit state set");
        metrics::record_circuit_transition(match target {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
        });
        Ok(())
    }
}

impl CircuitReset for CircuitRegistry {
    fn close_circuit<'a>(
        &'a self,
        resource_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = BreakerResult<()>> + Send + 'a>> {
        Box::pin(CircuitRegistry::close_circuit(self, resource_key))
    }
}

fn validate_key(resource_key: &str) -> BreakerResult<()> {
    if resource_key.trim().is_empty() {
        return Err(BreakerError::validation("resource key must not be empty"));
    }
    Ok(())
}

fn actor_stopped(resource_key: &str) -> BreakerError {
    BreakerError::RuntimeUnavailable(format!("circuit actor for {resource_key} is not running"))
}

fn dropped_reply(resource_key: &str) -> BreakerError {
    BreakerError::RuntimeUnavailable(format!("circuit actor for {resource_key} dropped the reply"))
}
