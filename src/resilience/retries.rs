//! Bounded retry for management-plane calls.
//!
//! # Responsibilities
//! - Retry transport errors, timeouts, 429 and 5xx
//! - Give up immediately on other non-success statuses
//! - Sleep with exponential backoff + jitter between attempts
//!
//! Only the final result reaches the workflow journal, so the number of
//! attempts never changes what a replay sees.

use crate::config::RetryConfig;
use crate::controller::{ControlOperation, ControlStatus, ControllerError, ResourceController};
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;

/// Run `operation` against `resource_id`, retrying per `policy`.
pub async fn call_with_retry<C>(
    controller: &C,
    operation: ControlOperation,
    resource_id: &str,
    policy: &RetryConfig,
) -> Result<ControlStatus, ControllerError>
where
    C: ResourceController,
{
    let backoff = Backoff::from(policy);
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = controller.execute(operation, resource_id).await;
        let (outcome, retryable) = match &result {
            Ok(status) if status.is_success() => ("success", false),
            Ok(status) => ("status", status.is_retryable()),
            Err(e) => ("error", e.is_retryable()),
        };
        metrics::record_controller_call(operation.as_str(), outcome);

        if !retryable || attempt >= max_attempts {
            return result;
        }

        let delay = backoff.delay(attempt);
        match &result {
            Ok(status) => tracing::warn!(
                operation = %operation,
                resource_id = %resource_id,
                attempt,
                status = status.code,
                delay_ms = delay.as_millis() as u64,
                "Retryable status from management plane"
            ),
            Err(e) => tracing::warn!(
                operation = %operation,
                resource_id = %resource_id,
                attempt,
                error = %e,
                delay_ms = delay.as_millis() as u64,
                "Management call failed, retrying"
            ),
        }
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
