//! The breaker saga: stop the resource, wait out the cooldown, start it again.
//!
//! # State Machine
//! ```text
//! Created → Stopping → WaitingForRecovery → Starting → Completed
//!              │                               │
//!              └──────────► Failed ◄───────────┘
//! ```
//!
//! # Journaled Steps
//! ```text
//! "instantiated"   clock      cooldown deadline = this + backoff
//! "stop"           activity   ControlStatus or transport error
//! "cooldown"       race       timer vs ForceCloseCircuit
//! "start"          activity   ControlStatus or transport error
//! "close-circuit"  activity   appended after Completed, only when close_on_recovery is set
//! ```
//!
//! The circuit is closed only after the instance is marked terminal.

use chrono::TimeDelta;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::RetryConfig;
use crate::controller::{ControlOperation, ControlStatus, ResourceController};
use crate::error::{BreakerError, BreakerResult};
use crate::resilience::call_with_retry;
use crate::workflow::context::WorkflowContext;
use crate::workflow::journal::RaceWinner;
use crate::workflow::types::{BreakerConfig, WorkflowState, FORCE_CLOSE_SIGNAL};

/// Closes the originating circuit once the resource is back.
pub trait CircuitReset: Send + Sync {
    fn close_circuit<'a>(
        &'a self,
        resource_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = BreakerResult<()>> + Send + 'a>>;
}

/// Journal step name of the post-completion circuit close.
pub const CLOSE_CIRCUIT_STEP: &str = "close-circuit";

/// Controller result as stored in the journal.
type ControlOutcome = Result<ControlStatus, String>;

pub struct BreakerWorkflow<C> {
    controller: Arc<C>,
    retry: RetryConfig,
    close_on_recovery: bool,
}

impl<C: ResourceController> BreakerWorkflow<C> {
    pub fn new(controller: Arc<C>, retry: RetryConfig, close_on_recovery: bool) -> Self {
        Self {
            controller,
            retry,
            close_on_recovery,
        }
    }

    pub fn closes_on_recovery(&self) -> bool {
        self.close_on_recovery
    }

    /// Drive one instance to completion, replaying whatever the journal already holds.
    pub async fn run(&self, ctx: &mut WorkflowContext, config: &BreakerConfig) -> BreakerResult<()> {
        let resource_id = config.resource_id();
        let instantiated_at = ctx.current_time("instantiated").await?;

        ctx.set_state(WorkflowState::Stopping)?;
        if !ctx.is_replaying() {
            tracing::info!(resource_id = %resource_id, "Disabling resource to open circuit");
        }
        let stopped = self.control(ctx, "stop", ControlOperation::Stop, resource_id).await?;
        ensure_success(ControlOperation::Stop, resource_id, stopped)?;

        ctx.set_state(WorkflowState::WaitingForRecovery)?;
        let backoff = TimeDelta::from_std(config.backoff_duration()).unwrap_or(TimeDelta::MAX);
        let deadline = instantiated_at
            .checked_add_signed(backoff)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);
        if !ctx.is_replaying() {
            tracing::info!(
                resource_id = %resource_id,
                deadline = %deadline,
                "Resource stopped, waiting for cooldown or {}",
                FORCE_CLOSE_SIGNAL
            );
        }
        let winner = ctx
            .race_timer_with_signal("cooldown", deadline, FORCE_CLOSE_SIGNAL)
            .await?;
        if !ctx.is_replaying() {
            match winner {
                RaceWinner::Timer => tracing::info!(resource_id = %resource_id, "Cooldown elapsed"),
                RaceWinner::Signal => tracing::info!(
                    resource_id = %resource_id,
                    "Cooldown cut short by {}",
                    FORCE_CLOSE_SIGNAL
                ),
            }
        }

        ctx.set_state(WorkflowState::Starting)?;
        let started = self.control(ctx, "start", ControlOperation::Start, resource_id).await?;
        ensure_success(ControlOperation::Start, resource_id, started)?;

        if !ctx.is_replaying() {
            tracing::info!(resource_id = %resource_id, "Resource re-enabled");
        }
        Ok(())
    }

    /// Close the circuit of a resource that has been started again.
    pub async fn reset_circuit(
        &self,
        resource_id: &str,
        circuits: &dyn CircuitReset,
    ) -> Result<(), String> {
        let closed = circuits
            .close_circuit(resource_id)
            .await
            .map_err(|e| e.to_string());
        match &closed {
            Ok(()) => tracing::info!(resource_id = %resource_id, "Circuit closed after recovery"),
            Err(e) => tracing::warn!(
                resource_id = %resource_id,
                error = %e,
                "Resource restarted but circuit could not be closed"
            ),
        }
        closed
    }

    async fn control(
        &self,
        ctx: &mut WorkflowContext,
        step: &str,
        operation: ControlOperation,
        resource_id: &str,
    ) -> BreakerResult<ControlOutcome> {
        let controller = self.controller.clone();
        let retry = self.retry.clone();
        ctx.call_activity(step, || async move {
            call_with_retry(controller.as_ref(), operation, resource_id, &retry)
                .await
                .map_err(|e| e.to_string())
        })
        .await
    }
}

fn ensure_success(
    operation: ControlOperation,
    resource_id: &str,
    outcome: ControlOutcome,
) -> BreakerResult<()> {
    match outcome {
        Ok(status) if status.is_success() => Ok(()),
        Ok(status) => Err(BreakerError::ControlPlane {
            operation: operation.to_string(),
            resource_id: resource_id.to_string(),
            status: status.code,
            detail: status.detail,
        }),
        Err(detail) => Err(BreakerError::ControlPlane {
            operation: operation.to_string(),
            resource_id: resource_id.to_string(),
            status: 0,
            detail,
        }),
    }
}
