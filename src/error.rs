//! Error taxonomy shared by the circuit actors and the breaker workflow.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors surfaced by circuit and workflow operations.
#[derive(Debug, Error)]
pub enum BreakerError {
    /// A required field was missing or empty.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The resource controller answered Stop/Start with a non-success status.
    #[error("{operation} of {resource_id} failed with status {status}: {detail}")]
    ControlPlane {
        operation: String,
        resource_id: String,
        status: u16,
        detail: String,
    },

    /// The actor or workflow substrate could not be reached. Safe to retry.
    #[error("Runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// No workflow instance is registered under this key.
    #[error("Workflow instance not found: {0}")]
    InstanceNotFound(String),

    /// The workflow instance exists but has already reached a terminal state.
    #[error("Workflow instance {0} is not running")]
    InstanceNotRunning(String),

    /// A replayed step did not match what the journal recorded.
    #[error("Non-deterministic replay at step {seq}: expected {expected}, journal has {recorded}")]
    NonDeterministicReplay {
        seq: usize,
        expected: String,
        recorded: String,
    },

    /// Durable storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl BreakerError {
    /// True when the caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            BreakerError::RuntimeUnavailable(_) => true,
            BreakerError::Storage(StorageError::Io(_)) => true,
            _ => false,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        BreakerError::Validation(message.into())
    }
}

/// Result type for breaker operations.
pub type BreakerResult<T> = Result<T, BreakerError>;
