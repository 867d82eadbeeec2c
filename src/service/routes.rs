//! Axum routes for the profile edge service.

use axum::{
    extract::{Extension, Json, State},
    middleware,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};

use crate::types::ProfileDecision;
use crate::SESSION_SCHEMA_VERSION;

use super::middleware::{metrics_middleware, profile_middleware};
use super::state::ServiceState;

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub schema_version: String,
    pub cookie_name: String,
    pub query_param: String,
    pub production: bool,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Echo the decision made by [`profile_middleware`].
async fn profile_handler(Extension(decision): Extension<ProfileDecision>) -> Json<ProfileDecision> {
    Json(decision)
}

/// Returns service status and the effective resolver settings.
async fn health_handler(State(state): State<ServiceState>) -> Json<HealthResponse> {
    let config = state.config();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: SESSION_SCHEMA_VERSION.to_string(),
        cookie_name: config.cookie_name.clone(),
        query_param: config.query_param.clone(),
        production: config.environment.is_production(),
    })
}

async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "ok".to_string(),
    })
}

// ============================================================================
// Router Construction
// ============================================================================

/// Build the service router.
///
/// Profile resolution runs only on `/api` routes; health probes never set
/// cookies.
pub fn create_router(state: ServiceState) -> Router {
    let api = Router::new()
        .route("/api/profile", get(profile_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), profile_middleware));

    Router::new()
        .merge(api)
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(liveness_handler))
        .layer(middleware::from_fn(metrics_middleware))
        .with_state(state)
}
