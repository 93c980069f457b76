//! Circuit subsystem.
//!
//! # Data Flow
//! ```text
//! Admin API / embedding code
//!     → CircuitRegistry::add_failure(resource_key, record)
//!     → mailbox of that key (bounded, one task per key)
//!     → CircuitActor::add_failure on a copy
//!         → Recorded / ConflictIgnored → commit
//!         → Tripped → TripLauncher::launch → commit (or roll back on error)
//!     → circuits.json
//! ```
//!
//! # Design Decisions
//! - Per-key serialization replaces locking; the prune-count-trip sequence is atomic
//! - Actors are created on first use and never deleted
//! - Pruning uses the event time of the newest report, not the wall clock
//! - `open_circuit` never starts remediation

pub mod actor;
pub mod registry;
pub mod state;

pub use actor::{AddFailureOutcome, CircuitActor};
pub use registry::{CircuitRegistry, CircuitSnapshot, TripLauncher};
pub use state::{CircuitState, FailureRecord, FailureWindow};
