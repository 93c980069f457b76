//! Adaptive circuit breaker for managed resources.
//!
//! Failures reported per resource are counted in an event-time window. When
//! the threshold is reached the circuit opens and a crash-recoverable breaker
//! workflow stops the resource, waits out a cooldown (or a `ForceCloseCircuit`
//! signal) and starts it again.

// Core
pub mod circuit;
pub mod error;
pub mod workflow;

// Collaborators
pub mod controller;
pub mod storage;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

// Ingress
pub mod admin;

pub use circuit::{AddFailureOutcome, CircuitRegistry, CircuitState, FailureRecord};
pub use config::AppConfig;
pub use error::{BreakerError, BreakerResult};
pub use workflow::{BreakerConfig, WorkflowRuntime, WorkflowState};
