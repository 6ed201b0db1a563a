//! Operational endpoints served by the gate itself.

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::config::BackendKind;
use crate::geo::client_ip;
use crate::http::server::AppState;
use crate::resilience::BreakerSnapshot;

pub const HEALTH_PATH: &str = "/_gate/health";
pub const STATUS_PATH: &str = "/_gate/status";

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    version: &'static str,
    breaker_open: bool,
}

/// Liveness; never gated.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthBody {
        status: "ok",
        version: VERSION,
        breaker_open: state.admission.breaker().is_open(),
    })
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub version: &'static str,
    pub uptime_secs: u64,
    pub breaker: BreakerSnapshot,
    pub geo: GeoSummary,
    pub rate_limit: RateLimitSummary,
    pub backend: BackendKind,
}

#[derive(Debug, Serialize)]
pub struct GeoSummary {
    pub enabled: bool,
    pub designated_country: String,
    pub allowed_countries: Vec<String>,
    pub development_mode: bool,
}

#[derive(Debug, Serialize)]
pub struct RateLimitSummary {
    pub enabled: bool,
    pub global: String,
    pub api: String,
    pub auth: String,
}

/// Breaker and configuration summary, admin only.
pub async fn status_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let ip = client_ip(&headers);
    if let Err(rejection) = state.admin.verify(&headers, &ip).await.into_result() {
        return rejection;
    }

    let geo = &state.config.geo;
    let rl = &state.config.rate_limit;
    Json(StatusBody {
        version: VERSION,
        uptime_secs: state.started.elapsed().as_secs(),
        breaker: state.admission.breaker().snapshot(),
        geo: GeoSummary {
            enabled: geo.enabled,
            designated_country: geo.designated_country.clone(),
            allowed_countries: geo.allowed_countries.clone(),
            development_mode: geo.development_mode,
        },
        rate_limit: RateLimitSummary {
            enabled: rl.enabled,
            global: format!("{}/{}m", rl.global_max, rl.global_window_minutes),
            api: format!("{}/{}m", rl.api_max, rl.api_window_minutes),
            auth: format!("{}/{}m", rl.auth_max, rl.auth_window_minutes),
        },
        backend: state.config.backend.kind,
    })
    .into_response()
}
