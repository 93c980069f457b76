//! Breaker workflow subsystem.
//!
//! # Data Flow
//! ```text
//! CircuitRegistry (trip)
//!     → WorkflowRuntime::start_instance (one running instance per resource)
//!     → tokio task running BreakerWorkflow::run
//!         → WorkflowContext: journal lookup → replay recorded outcome
//!                                          └→ execute + append + persist
//!
//! Admin API (ForceCloseCircuit)
//!     → WorkflowRuntime::raise_event → durable inbox → wake the running task
//!
//! Startup:
//!     workflows.json → WorkflowRuntime::resume_pending → replay to first unlogged step
//! ```
//!
//! # Design Decisions
//! - Instance id is the resource id, which enforces at most one trip per resource
//! - Clock readings, controller results and race winners are journaled; nothing else is
//! - Progress state (`Stopping`, `Starting`, ...) is a persisted marker, not a journal entry
//! - An activity interrupted by a crash runs again on resume; stop/start are idempotent
//! - Closing the circuit is a post-completion step tracked by `close_pending`, not part of the saga

pub mod breaker;
pub mod clock;
pub mod context;
pub mod journal;
pub mod runtime;
pub mod types;

pub use breaker::{BreakerWorkflow, CircuitReset, CLOSE_CIRCUIT_STEP};
pub use clock::RuntimeClock;
pub use context::WorkflowContext;
pub use journal::{JournalEntry, RaceWinner, StepOutcome};
pub use runtime::WorkflowRuntime;
pub use types::{
    BreakerConfig, InstanceRecord, InstanceStatus, StartOutcome, WorkflowState,
    FORCE_CLOSE_SIGNAL,
};
