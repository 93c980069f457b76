//! Admin HTTP API.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → TraceLayer
//!     → auth::require_api_key (Bearer <admin.api_key>)
//!     → handlers
//!         /circuits/...  → CircuitRegistry
//!         /breakers/...  → WorkflowRuntime
//!     → JSON body, errors as { "error": ... }
//! ```
//!
//! # Design Decisions
//! - Resource keys are single path segments; keys containing `/` are percent-encoded
//! - Every route requires the API key, including `/status`

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::circuit::CircuitRegistry;
use crate::controller::ResourceController;
use crate::workflow::WorkflowRuntime;

use self::auth::require_api_key;
use self::handlers::*;

/// Shared state of the admin handlers.
pub struct AdminState<C> {
    pub circuits: CircuitRegistry,
    pub workflows: WorkflowRuntime<C>,
}

impl<C> Clone for AdminState<C> {
    fn clone(&self) -> Self {
        Self {
            circuits: self.circuits.clone(),
            workflows: self.workflows.clone(),
        }
    }
}

pub fn setup_admin_router<C: ResourceController>(state: AdminState<C>, api_key: &str) -> Router {
    let api_key: Arc<str> = Arc::from(api_key);

    Router::new()
        .route("/status", get(get_status::<C>))
        .route("/circuits", get(list_circuits::<C>))
        .route("/circuits/{key}", get(get_circuit::<C>))
        .route("/circuits/{key}/failures", post(report_failure::<C>))
        .route("/circuits/{key}/close", post(close_circuit::<C>))
        .route("/circuits/{key}/open", post(open_circuit::<C>))
        .route("/breakers", get(list_breakers::<C>))
        .route("/breakers/{resource}", get(get_breaker::<C>))
        .route("/breakers/{resource}/force-close", post(force_close::<C>))
        .layer(middleware::from_fn_with_state(api_key, require_api_key))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
