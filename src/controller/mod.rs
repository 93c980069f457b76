//! Management-plane access to the protected resource.
//!
//! # Data Flow
//! ```text
//! BreakerWorkflow step
//!     → resilience::retries (bounded attempts, backoff + jitter)
//!     → ResourceController::stop / start
//!     → ControlStatus (status code + body) or ControllerError (transport)
//! ```
//!
//! # Design Decisions
//! - A non-success status is a value, not an error; the workflow decides
//! - Transport failures and timeouts are errors and always retryable
//! - Implementations must tolerate repeated calls for the same resource

pub mod http;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

pub use http::HttpResourceController;

/// The two operations the breaker performs on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlOperation {
    Stop,
    Start,
}

impl ControlOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlOperation::Stop => "stop",
            ControlOperation::Start => "start",
        }
    }
}

impl fmt::Display for ControlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status returned by the management plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlStatus {
    pub code: u16,
    pub detail: String,
}

impl ControlStatus {
    pub fn new(code: u16, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200, "")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Throttling and server-side errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        self.code == 429 || self.code >= 500
    }
}

/// Failure to obtain any status from the management plane.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ControllerError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ControllerError::InvalidRequest(_))
    }
}

/// Stops and starts resources by id.
pub trait ResourceController: Send + Sync + 'static {
    fn stop(
        &self,
        resource_id: &str,
    ) -> impl Future<Output = Result<ControlStatus, ControllerError>> + Send;

    fn start(
        &self,
        resource_id: &str,
    ) -> impl Future<Output = Result<ControlStatus, ControllerError>> + Send;

    fn execute(
        &self,
        operation: ControlOperation,
        resource_id: &str,
    ) -> impl Future<Output = Result<ControlStatus, ControllerError>> + Send {
        async move {
            match operation {
                ControlOperation::Stop => self.stop(resource_id).await,
                ControlOperation::Start => self.start(resource_id).await,
            }
        }
    }
}
