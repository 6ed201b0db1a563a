//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the gate's own endpoints and the upstream fallback
//! - Wire up middleware (tracing, request ID, timeout, session, gate, guards)
//! - Bind server to listener with graceful shutdown
//! - Forward admitted requests to the upstream application

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri,
    },
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::{AdminVerifier, VendorVerifier};
use crate::backend::Backends;
use crate::config::GateConfig;
use crate::geo::GeoFence;
use crate::http::gate::gate_middleware;
use crate::http::guards::guard_middleware;
use crate::http::session::admin_session_middleware;
use crate::http::status::{health_handler, status_handler, HEALTH_PATH, STATUS_PATH};
use crate::resilience::CircuitBreaker;
use crate::routing::RouteTable;
use crate::security::AdmissionController;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid upstream url '{0}'")]
    InvalidUpstream(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Where admitted requests are forwarded.
#[derive(Debug, Clone)]
pub struct Upstream {
    scheme: Scheme,
    authority: Authority,
}

impl Upstream {
    pub fn parse(url: &str) -> Result<Self, ServerError> {
        let invalid = || ServerError::InvalidUpstream(url.to_string());
        let uri: Uri = url.parse().map_err(|_| invalid())?;
        let parts = uri.into_parts();
        Ok(Self {
            scheme: parts.scheme.ok_or_else(invalid)?,
            authority: parts.authority.ok_or_else(invalid)?,
        })
    }

    /// Same path and query, upstream origin.
    fn rewrite(&self, uri: &Uri) -> Uri {
        let mut parts = uri.clone().into_parts();
        parts.scheme = Some(self.scheme.clone());
        parts.authority = Some(self.authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        Uri::from_parts(parts).unwrap_or_else(|_| uri.clone())
    }
}

/// Everything the middleware and handlers share. Immutable after startup.
pub struct GateState {
    pub config: GateConfig,
    pub routes: RouteTable,
    pub fence: GeoFence,
    pub admission: AdmissionController,
    pub admin: AdminVerifier,
    pub vendor: VendorVerifier,
    pub client: Client<HttpConnector, Body>,
    pub upstream: Upstream,
    pub started: Instant,
}

impl GateState {
    pub fn new(config: GateConfig, backends: Backends) -> Result<Self, ServerError> {
        let upstream = Upstream::parse(&config.upstream.url)?;
        let breaker = CircuitBreaker::new(&config.circuit_breaker);
        let admission = AdmissionController::new(backends.counters.clone(), breaker, &config.rate_limit);
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            routes: RouteTable::new(&config, &[HEALTH_PATH]),
            fence: GeoFence::new(&config.geo),
            admission,
            admin: AdminVerifier::new(&backends, &config.auth),
            vendor: VendorVerifier::new(&backends, &config.auth),
            client,
            upstream,
            started: Instant::now(),
            config,
        })
    }
}

impl std::fmt::Debug for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateState")
            .field("upstream", &self.upstream)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

/// Application state injected into handlers.
pub type AppState = Arc<GateState>;

/// HTTP server for the admission gate.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: GateConfig, backends: Backends) -> Result<Self, ServerError> {
        let state = Arc::new(GateState::new(config, backends)?);
        let router = build_router(state.clone());
        Ok(Self { router, state })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run until a shutdown signal arrives on `shutdown`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.state.config.upstream.url,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
///
/// Request order: trace, request id, concurrency limit, timeout, session,
/// gate, guards, handler.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;
    Router::new()
        .route(HEALTH_PATH, get(health_handler))
        .route(STATUS_PATH, get(status_handler))
        .fallback(proxy_handler)
        .layer(from_fn_with_state(state.clone(), guard_middleware))
        .layer(from_fn_with_state(state.clone(), gate_middleware))
        .layer(from_fn_with_state(state.clone(), admin_session_middleware))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(ConcurrencyLimitLayer::new(config.listener.max_connections))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Forward an admitted request to the upstream application.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (mut parts, body) = request.into_parts();
    let request_id = parts
        .headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    parts.uri = state.upstream.rewrite(&parts.uri);
    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        uri = %parts.uri,
        "Forwarding request"
    );

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
