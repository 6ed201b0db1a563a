//! Request gate middleware.
//!
//! # Responsibilities
//! - Skip static assets and the gate's own health endpoint
//! - Resolve the client IP once and attach it to the request
//! - Country-code geo-fence (403 `GEO_BLOCKED`)
//! - Global rate limit, then the route-class bucket (429)
//! - `X-RateLimit-*` headers on admitted responses
//! - Tag admitted responses with [`Admitted`] for outer layers
//!
//! # Design Decisions
//! - Checks short-circuit in order: geo, global, route class
//! - Admitted responses carry the global bucket's headers

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::geo::client_ip;
use crate::http::response::{self, RATE_LIMIT_EXCEEDED};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::RateClass;
use crate::security::rate_limit::{RateLimitDecision, API_BUCKET, AUTH_BUCKET, GLOBAL_BUCKET};

/// Client IP resolved by the gate, available to later middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    /// The gate's value if present, else resolved from the headers.
    pub fn of(req: &Request<Body>) -> String {
        req.extensions()
            .get::<ClientIp>()
            .map(|ip| ip.0.clone())
            .unwrap_or_else(|| client_ip(req.headers()))
    }
}

/// Response marker: the request passed the gate and reached the inner stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admitted;

impl Admitted {
    pub fn is_set(response: &Response) -> bool {
        response.extensions().get::<Admitted>().is_some()
    }
}

pub async fn gate_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if state.routes.is_exempt(&path) {
        return admitted(next.run(req).await);
    }

    let start = Instant::now();
    let ip = client_ip(req.headers());
    req.extensions_mut().insert(ClientIp(ip.clone()));

    if state.config.geo.enabled {
        let country = country_code(req.headers(), &state.config.geo.country_header);
        if !state.fence.is_country_allowed(country.as_deref()) {
            tracing::warn!(
                ip = %ip,
                country = country.as_deref().unwrap_or("none"),
                path = %path,
                "Request blocked by geo-fence"
            );
            metrics::record_geo_blocked();
            metrics::record_request("geo_blocked", 403, start);
            return response::geo_blocked();
        }
    }

    if !state.config.rate_limit.enabled {
        let response = next.run(req).await;
        metrics::record_request("admitted", response.status().as_u16(), start);
        return admitted(response);
    }

    let global = state.admission.global_rate_limit(&ip).await;
    if !global.allowed {
        return deny(GLOBAL_BUCKET, &global, None, &ip, &path, start);
    }

    match state.routes.rate_class(&path) {
        Some(RateClass::Auth) => {
            let decision = state.admission.auth_rate_limit(&format!("{path}:{ip}")).await;
            if !decision.allowed {
                return deny(AUTH_BUCKET, &decision, Some(RATE_LIMIT_EXCEEDED), &ip, &path, start);
            }
        }
        Some(RateClass::Api) => {
            let decision = state.admission.api_rate_limit(&ip).await;
            if !decision.allowed {
                return deny(API_BUCKET, &decision, Some(RATE_LIMIT_EXCEEDED), &ip, &path, start);
            }
        }
        None => {}
    }

    let mut response = next.run(req).await;
    response::apply_rate_limit_headers(response.headers_mut(), &global);
    metrics::record_request("admitted", response.status().as_u16(), start);
    admitted(response)
}

fn admitted(mut response: Response) -> Response {
    response.extensions_mut().insert(Admitted);
    response
}

fn deny(
    bucket: &'static str,
    decision: &RateLimitDecision,
    code: Option<&'static str>,
    ip: &str,
    path: &str,
    start: Instant,
) -> Response {
    tracing::warn!(
        ip = %ip,
        path = %path,
        bucket,
        limit = decision.limit,
        reset_at = %decision.reset_at,
        "Rate limit exceeded"
    );
    metrics::record_rate_limited(bucket);
    metrics::record_request("rate_limited", 429, start);
    response::rate_limited(decision, code, Utc::now())
}

fn country_code(headers: &HeaderMap, header: &str) -> Option<String> {
    headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
