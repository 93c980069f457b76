//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Workflow Stop/Start step:
//!     → retries.rs (classify result, decide whether to try again)
//!     → backoff.rs (exponential delay + jitter between attempts)
//!     → final ControlStatus / ControllerError journaled by the workflow
//! ```
//!
//! # Design Decisions
//! - Every attempt has a deadline (controller request timeout)
//! - Attempts are bounded; exhaustion fails the workflow instead of stranding it
//! - Jittered backoff prevents synchronized retries across resources

pub mod backoff;
pub mod retries;

pub use retries::call_with_retry;
