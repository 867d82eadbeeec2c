//! Profile Edge REST Service
//!
//! Runs the profile resolver in front of an HTTP application.
//!
//! ## Endpoints
//!
//! - `GET /api/profile` - Resolve the visitor profile and return the decision
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//!
//! [`profile_middleware`] can also be layered onto any other axum router.

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{metrics_middleware, profile_middleware, MetricsObserver};
pub use routes::{create_router, HealthResponse, LivenessResponse};
pub use state::ServiceState;
