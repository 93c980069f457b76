//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Open stores → Build WorkflowRuntime → Build CircuitRegistry
//!     → Bind registry into runtime → Resume in-flight workflows
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop admin listener → Exit (workflows resume next start)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then storage, then runtimes, then listeners
//! - No drain of running workflows; the journal makes an abrupt stop safe

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build_service, start, Service, StartupError};
