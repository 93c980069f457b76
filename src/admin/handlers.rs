use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::admin::AdminState;
use crate::circuit::{AddFailureOutcome, CircuitSnapshot, CircuitState, FailureRecord};
use crate::controller::ResourceController;
use crate::error::BreakerError;
use crate::workflow::{InstanceStatus, FORCE_CLOSE_SIGNAL};

/// `BreakerError` rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub BreakerError);

impl From<BreakerError> for ApiError {
    fn from(err: BreakerError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            BreakerError::Validation(_) => StatusCode::BAD_REQUEST,
            BreakerError::InstanceNotFound(_) => StatusCode::NOT_FOUND,
            BreakerError::InstanceNotRunning(_) => StatusCode::CONFLICT,
            BreakerError::ControlPlane { .. } => StatusCode::BAD_GATEWAY,
            e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Admin request failed");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub circuits: usize,
    pub open_circuits: usize,
    pub active_workflows: usize,
}

/// Body of `POST /circuits/{key}/failures`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFailure {
    pub request_id: Option<String>,
    pub instance_id: String,
    pub failure_time: Option<DateTime<Utc>>,
}

impl ReportFailure {
    fn into_record(self) -> FailureRecord {
        FailureRecord::new(
            self.request_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            self.instance_id,
            self.failure_time.unwrap_or_else(Utc::now),
        )
    }
}

pub async fn get_status<C: ResourceController>(
    State(state): State<AdminState<C>>,
) -> Json<SystemStatus> {
    let circuits = state.circuits.circuits();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        circuits: circuits.len(),
        open_circuits: circuits
            .iter()
            .filter(|c| c.state == CircuitState::Open)
            .count(),
        active_workflows: state.workflows.active_count(),
    })
}

pub async fn list_circuits<C: ResourceController>(
    State(state): State<AdminState<C>>,
) -> Json<Vec<CircuitSnapshot>> {
    Json(state.circuits.circuits())
}

pub async fn get_circuit<C: ResourceController>(
    State(state): State<AdminState<C>>,
    Path(key): Path<String>,
) -> ApiResult<CircuitSnapshot> {
    Ok(Json(state.circuits.snapshot(&key).await?))
}

pub async fn report_failure<C: ResourceController>(
    State(state): State<AdminState<C>>,
    Path(key): Path<String>,
    Json(body): Json<ReportFailure>,
) -> ApiResult<AddFailureOutcome> {
    let outcome = state.circuits.add_failure(&key, body.into_record()).await?;
    Ok(Json(outcome))
}

pub async fn close_circuit<C: ResourceController>(
    State(state): State<AdminState<C>>,
    Path(key): Path<String>,
) -> ApiResult<CircuitSnapshot> {
    state.circuits.close_circuit(&key).await?;
    Ok(Json(state.circuits.snapshot(&key).await?))
}

pub async fn open_circuit<C: ResourceController>(
    State(state): State<AdminState<C>>,
    Path(key): Path<String>,
) -> ApiResult<CircuitSnapshot> {
    state.circuits.open_circuit(&key).await?;
    Ok(Json(state.circuits.snapshot(&key).await?))
}

pub async fn list_breakers<C: ResourceController>(
    State(state): State<AdminState<C>>,
) -> Json<Vec<InstanceStatus>> {
    Json(state.workflows.instances())
}

pub async fn get_breaker<C: ResourceController>(
    State(state): State<AdminState<C>>,
    Path(resource): Path<String>,
) -> ApiResult<InstanceStatus> {
    state
        .workflows
        .status(&resource)
        .map(Json)
        .ok_or_else(|| BreakerError::InstanceNotFound(resource).into())
}

pub async fn force_close<C: ResourceController>(
    State(state): State<AdminState<C>>,
    Path(resource): Path<String>,
) -> Result<(StatusCode, Json<InstanceStatus>), ApiError> {
    state.workflows.raise_event(&resource, FORCE_CLOSE_SIGNAL)?;
    let status = state
        .workflows
        .status(&resource)
        .ok_or_else(|| BreakerError::InstanceNotFound(resource.clone()))?;
    Ok((StatusCode::ACCEPTED, Json(status)))
}
