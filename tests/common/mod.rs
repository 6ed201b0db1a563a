//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use admission_gate::backend::{AdminRecord, AuthUser, Backends, MemoryBackend, VendorRecord};
use admission_gate::config::{BackendKind, GateConfig};
use admission_gate::http::{build_router, GateState};

pub const MR_IP: &str = "41.188.0.10";

/// Start an upstream that echoes what the gate forwarded.
pub async fn start_echo_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(echo);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo(req: Request<Body>) -> Json<Value> {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "path": req.uri().path(),
        "x_admin_id": header("x-admin-id"),
        "x_vendor_id": header("x-vendor-id"),
        "x_request_id": header("x-request-id"),
    }))
}

/// Defaults with the memory backend, pointed at `upstream`.
pub fn test_config(upstream: SocketAddr) -> GateConfig {
    let mut config = GateConfig::default();
    config.upstream.url = format!("http://{upstream}");
    config.backend.kind = BackendKind::Memory;
    config
}

pub fn memory_backend(config: &GateConfig) -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::new(
        config.rate_limit.auth_max,
        config.rate_limit.auth_window_minutes,
    ))
}

pub fn app_with(config: GateConfig, backends: Backends) -> Router {
    build_router(Arc::new(GateState::new(config, backends).unwrap()))
}

/// A request from inside the territory.
pub fn local_request(method: &str, path: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(path)
        .header("x-vercel-ip-country", "MR")
        .header("x-real-ip", MR_IP)
}

pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.unwrap()
}

pub async fn body_json(res: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn admin(id: &str, user_id: &str) -> AdminRecord {
    AdminRecord {
        id: id.into(),
        user_id: Some(user_id.into()),
        email: format!("{id}@example.com"),
        name: Some("Ops".into()),
        role: Some("admin".into()),
        is_active: Some(true),
    }
}

pub fn vendor(id: &str, user_id: &str, is_active: bool, is_approved: bool) -> VendorRecord {
    VendorRecord {
        id: id.into(),
        user_id: Some(user_id.into()),
        business_name: format!("{id} shop"),
        phone: None,
        email: None,
        is_active: Some(is_active),
        is_approved: Some(is_approved),
    }
}

pub fn user(id: &str, metadata: Value) -> AuthUser {
    AuthUser {
        id: id.into(),
        email: None,
        user_metadata: metadata,
    }
}
