//! Breaker workflow input, instance records and status views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{BreakerError, BreakerResult};
use crate::workflow::journal::JournalEntry;

/// Name of the external event that ends the cooldown early.
pub const FORCE_CLOSE_SIGNAL: &str = "ForceCloseCircuit";

/// Immutable input of one breaker workflow instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerConfig {
    resource_id: String,
    backoff_duration: Duration,
}

impl BreakerConfig {
    pub fn new(resource_id: impl Into<String>, backoff_duration: Duration) -> BreakerResult<Self> {
        let resource_id = resource_id.into();
        if resource_id.trim().is_empty() {
            return Err(BreakerError::validation("resourceId must not be empty"));
        }
        Ok(Self {
            resource_id,
            backoff_duration,
        })
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn backoff_duration(&self) -> Duration {
        self.backoff_duration
    }

    /// Instances are keyed by resource so at most one trip runs per resource.
    pub fn instance_key(&self) -> &str {
        &self.resource_id
    }
}

/// Lifecycle of a breaker workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Created,
    Stopping,
    WaitingForRecovery,
    Starting,
    Completed,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowState::Created => "created",
            WorkflowState::Stopping => "stopping",
            WorkflowState::WaitingForRecovery => "waiting_for_recovery",
            WorkflowState::Starting => "starting",
            WorkflowState::Completed => "completed",
            WorkflowState::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of asking the runtime to start an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    /// An instance for the same key is still running; nothing was started.
    AlreadyRunning,
}

/// Durable record of one workflow instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub instance_id: String,
    pub config: BreakerConfig,
    pub state: WorkflowState,
    /// Incremented each time the key is reused after a terminal run.
    pub generation: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Completed steps in execution order.
    pub journal: Vec<JournalEntry>,
    /// Signals delivered but not yet consumed.
    pub inbox: Vec<String>,
    pub last_error: Option<String>,
    /// Completed, but the circuit close has not been journaled yet.
    #[serde(default)]
    pub close_pending: bool,
}

impl InstanceRecord {
    pub fn new(config: BreakerConfig, generation: u64, now: DateTime<Utc>) -> Self {
        Self {
            instance_id: config.instance_key().to_string(),
            config,
            state: WorkflowState::Created,
            generation,
            created_at: now,
            updated_at: now,
            journal: Vec::new(),
            inbox: Vec::new(),
            last_error: None,
            close_pending: false,
        }
    }

    /// Still has work to do: not terminal, or its circuit close is outstanding.
    pub fn is_active(&self) -> bool {
        !self.state.is_terminal() || self.close_pending
    }

    pub fn status(&self) -> InstanceStatus {
        InstanceStatus {
            instance_id: self.instance_id.clone(),
            resource_id: self.config.resource_id().to_string(),
            backoff_secs: self.config.backoff_duration().as_secs(),
            state: self.state,
            generation: self.generation,
            created_at: self.created_at,
            updated_at: self.updated_at,
            steps_completed: self.journal.len(),
            pending_signals: self.inbox.clone(),
            last_error: self.last_error.clone(),
            close_pending: self.close_pending,
        }
    }
}

/// Read-only view of an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceStatus {
    pub instance_id: String,
    pub resource_id: String,
    pub backoff_secs: u64,
    pub state: WorkflowState,
    pub generation: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub steps_completed: usize,
    pub pending_signals: Vec<String>,
    pub last_error: Option<String>,
    pub close_pending: bool,
}
