//! Durable keyed storage.
//!
//! # Data Flow
//! ```text
//! circuit registry / workflow runtime
//!     → JsonStore::put (in-memory DashMap update)
//!     → snapshot under write lock
//!     → temp file + rename  ({ "version": 1, "records": { key: value } })
//!
//! Startup:
//!     JsonStore::open(path) → version check → hydrate DashMap
//! ```
//!
//! # Design Decisions
//! - One file per record kind (circuits, workflows)
//! - Every mutation is flushed before the caller is answered
//! - A store without a path is memory-only (tests, ephemeral runs)

pub mod store;

pub use store::{JsonStore, StorageError, SCHEMA_VERSION};
