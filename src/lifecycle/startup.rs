//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the circuit and workflow stores (memory-only without `data_dir`)
//! - Build the workflow runtime, then the circuit registry on top of it
//! - Bind the registry back into the runtime for the close-on-recovery step
//! - Resume every workflow instance that was in flight at the last shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Workflows resume only after the registry is bound, so a resumed
//!   instance can still close its circuit

use std::fs;
use std::sync::Arc;
use thiserror::Error;

use crate::circuit::{CircuitActor, CircuitRegistry};
use crate::config::AppConfig;
use crate::controller::{ControllerError, HttpResourceController, ResourceController};
use crate::error::BreakerError;
use crate::storage::{JsonStore, StorageError};
use crate::workflow::{BreakerWorkflow, InstanceRecord, RuntimeClock, WorkflowRuntime};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to prepare data directory: {0}")]
    DataDir(#[from] std::io::Error),

    #[error("failed to open store: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to build resource controller: {0}")]
    Controller(#[from] ControllerError),

    #[error("failed to resume workflows: {0}")]
    Resume(#[from] BreakerError),
}

/// The wired-up breaker: circuit registry plus workflow runtime.
pub struct Service<C> {
    pub circuits: CircuitRegistry,
    pub workflows: WorkflowRuntime<C>,
}

/// Build the service against the configured HTTP management plane.
pub fn start(config: &AppConfig) -> Result<Service<HttpResourceController>, StartupError> {
    let controller = HttpResourceController::new(&config.controller)?;
    build_service(config, Arc::new(controller), RuntimeClock::new())
}

/// Build the service against any controller. Must run inside a tokio runtime.
pub fn build_service<C: ResourceController>(
    config: &AppConfig,
    controller: Arc<C>,
    clock: RuntimeClock,
) -> Result<Service<C>, StartupError> {
    let (circuit_store, workflow_store) = open_stores(config)?;

    let workflow = BreakerWorkflow::new(
        controller,
        config.retries.clone(),
        config.circuit.close_on_recovery,
    );
    let workflows = WorkflowRuntime::new(workflow_store, clock, workflow);
    let circuits = CircuitRegistry::new(
        circuit_store,
        config.circuit.clone(),
        Arc::new(workflows.clone()),
    );
    workflows.bind_circuits(Arc::new(circuits.clone()));

    let resumed = workflows.resume_pending()?;
    tracing::info!(
        circuits = circuits.circuits().len(),
        resumed_workflows = resumed,
        window_secs = config.circuit.window_size_secs,
        failure_threshold = config.circuit.failure_threshold,
        backoff_secs = config.circuit.backoff_duration_secs,
        "Breaker service ready"
    );

    Ok(Service {
        circuits,
        workflows,
    })
}

fn open_stores(
    config: &AppConfig,
) -> Result<(JsonStore<CircuitActor>, JsonStore<InstanceRecord>), StartupError> {
    match &config.storage.data_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let circuits = JsonStore::open(dir.join(&config.storage.circuits_file))?;
            let workflows = JsonStore::open(dir.join(&config.storage.workflows_file))?;
            tracing::info!(data_dir = %dir.display(), "Using durable storage");
            Ok((circuits, workflows))
        }
        None => {
            tracing::warn!("No data_dir configured, state will not survive a restart");
            Ok((JsonStore::in_memory(), JsonStore::in_memory()))
        }
    }
}
