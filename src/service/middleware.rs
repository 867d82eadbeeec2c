//! Service middleware for profile resolution and request metrics.
//!
//! ## Metrics Exposed
//!
//! Metrics are structured log lines under the `visitor_signals::metrics`
//! target, aggregated downstream:
//!
//! - `request` - path, method, status, latency and resolved profile
//! - `profile_resolution` - profile, source and whether a cookie was written
//! - `profile_fallback` - resolution failed open
//! - `profile_slow` - resolution exceeded the soft budget

use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::info;

use crate::error::ProfileError;
use crate::observe::ResolutionObserver;
use crate::resolver::RequestParts;
use crate::types::ProfileDecision;

use super::state::ServiceState;

/// Resolve the visitor profile for every request that passes through.
///
/// The [`ProfileDecision`] is inserted into the request extensions for
/// handlers, and into the response extensions for outer layers. The
/// response gains the profile header, `Cache-Control`, `Vary` and, when the
/// stored value must change, `Set-Cookie`.
pub async fn profile_middleware(
    State(state): State<ServiceState>,
    mut request: Request,
    next: Next,
) -> Response {
    let resolution = {
        let headers = request.headers();
        let uri = request.uri();
        let parts = RequestParts {
            query: uri.query(),
            cookie_header: headers.get(header::COOKIE).map(HeaderValue::as_bytes),
            user_agent: headers.get(header::USER_AGENT).map(HeaderValue::as_bytes),
            forwarded_proto: headers.get("x-forwarded-proto").map(HeaderValue::as_bytes),
            https: uri.scheme_str() == Some("https"),
        };
        state.resolver.resolve_request(&parts)
    };

    request.extensions_mut().insert(resolution.decision);
    let mut response = next.run(request).await;
    response.extensions_mut().insert(resolution.decision);

    let headers = response.headers_mut();
    for (name, value) in &resolution.headers {
        apply_header(headers, name, value);
    }
    if let Some(cookie) = resolution
        .set_cookie_header()
        .and_then(|value| HeaderValue::from_str(&value).ok())
    {
        headers.append(header::SET_COOKIE, cookie);
    }

    response
}

/// Set one resolver header. `Vary` is appended so route-level values survive.
fn apply_header(headers: &mut HeaderMap, name: &str, value: &str) {
    let (Ok(name), Ok(value)) = (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) else {
        tracing::debug!(header = name, "skipping unrepresentable response header");
        return;
    };

    if name == header::VARY {
        headers.append(name, value);
    } else {
        headers.insert(name, value);
    }
}

/// Metrics middleware that records request counts and latency.
///
/// Place it outside [`profile_middleware`] to tag each request with the
/// resolved profile.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();
    let profile = response
        .extensions()
        .get::<ProfileDecision>()
        .map(|decision| decision.resolved.as_str())
        .unwrap_or("none");

    info!(
        target: "visitor_signals::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        profile = profile,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Reports resolver activity as metric log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver;

impl ResolutionObserver for MetricsObserver {
    fn on_resolved(&self, decision: &ProfileDecision, elapsed: Duration) {
        info!(
            target: "visitor_signals::metrics",
            metric_type = "profile_resolution",
            profile = decision.resolved.as_str(),
            source = %decision.source,
            cookie_written = decision.should_persist,
            latency_us = elapsed.as_micros() as u64,
            "profile_resolution_metric"
        );
    }

    fn on_fallback(&self, error: &ProfileError) {
        info!(
            target: "visitor_signals::metrics",
            metric_type = "profile_fallback",
            error = %error,
            "profile_fallback_metric"
        );
    }

    fn on_slow(&self, elapsed: Duration, budget: Duration) {
        info!(
            target: "visitor_signals::metrics",
            metric_type = "profile_slow",
            latency_us = elapsed.as_micros() as u64,
            budget_ms = budget.as_millis() as u64,
            "profile_slow_metric"
        );
    }
}
