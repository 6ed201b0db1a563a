//! Privileged route guards.
//!
//! Admin and vendor API routes are verified before they reach the upstream.
//! Identity headers are always stripped from the inbound request and only
//! set again from a verified principal.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::http::gate::ClientIp;
use crate::http::server::AppState;
use crate::routing::Guard;

pub const X_ADMIN_ID: HeaderName = HeaderName::from_static("x-admin-id");
pub const X_VENDOR_ID: HeaderName = HeaderName::from_static("x-vendor-id");

pub async fn guard_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    strip_identity(req.headers_mut());

    let Some(guard) = state.routes.guard(req.uri().path()) else {
        return next.run(req).await;
    };
    let ip = ClientIp::of(&req);

    let (header, id) = match guard {
        Guard::Admin => match state.admin.verify(req.headers(), &ip).await.into_result() {
            Ok(admin) => {
                tracing::debug!(admin_id = %admin.id, path = %req.uri().path(), "Admin identity forwarded");
                let id = admin.id.clone();
                req.extensions_mut().insert(admin);
                (X_ADMIN_ID, id)
            }
            Err(rejection) => return rejection,
        },
        Guard::Vendor => match state.vendor.verify(req.headers(), &ip).await.into_result() {
            Ok(vendor) => {
                tracing::info!(vendor_id = %vendor.id, business = %vendor.business_name, "Vendor request authorized");
                let id = vendor.id.clone();
                req.extensions_mut().insert(vendor);
                (X_VENDOR_ID, id)
            }
            Err(rejection) => return rejection,
        },
    };

    match HeaderValue::from_str(&id) {
        Ok(value) => {
            req.headers_mut().insert(header, value);
        }
        Err(_) => tracing::error!(principal_id = %id, "Principal id is not a valid header value"),
    }
    next.run(req).await
}

fn strip_identity(headers: &mut HeaderMap) {
    headers.remove(X_ADMIN_ID);
    headers.remove(X_VENDOR_ID);
}
