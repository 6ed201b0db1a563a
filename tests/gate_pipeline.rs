//! End-to-end tests of the gate in front of an echo upstream.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Utc;
use serde_json::json;

use admission_gate::auth::{issue_session, AdminSessionClaims};
use admission_gate::backend::{BackendError, BackendResult, Backends, CounterReply, CounterStore};

mod common;
use common::*;

fn session_token(admin_id: &str, age_ms: i64) -> String {
    let claims = AdminSessionClaims {
        admin_id: admin_id.into(),
        email: format!("{admin_id}@example.com"),
        role: Some("admin".into()),
        timestamp: Utc::now().timestamp_millis() - age_ms,
    };
    issue_session(&claims, None).unwrap()
}

#[tokio::test]
async fn test_missing_country_is_geo_blocked() {
    let upstream = start_echo_upstream().await;
    let config = test_config(upstream);
    let app = app_with(config.clone(), Backends::from_shared(memory_backend(&config)));

    let req = Request::builder()
        .uri("/products")
        .header("x-real-ip", MR_IP)
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body = body_json(res).await;
    assert_eq!(body["code"], "GEO_BLOCKED");
    assert!(body["message_ar"].is_string());
}

#[tokio::test]
async fn test_foreign_country_is_geo_blocked() {
    let upstream = start_echo_upstream().await;
    let config = test_config(upstream);
    let app = app_with(config.clone(), Backends::from_shared(memory_backend(&config)));

    let req = Request::builder()
        .uri("/")
        .header("x-vercel-ip-country", "FR")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, req).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_global_limit_allows_100_then_rejects() {
    let upstream = start_echo_upstream().await;
    let config = test_config(upstream);
    let app = app_with(config.clone(), Backends::from_shared(memory_backend(&config)));

    for i in 0..100u32 {
        let res = send(&app, local_request("GET", "/shop").body(Body::empty()).unwrap()).await;
        assert_eq!(res.status(), StatusCode::OK, "request {i} should be admitted");
        assert_eq!(res.headers()["x-ratelimit-limit"], "100");
        assert_eq!(
            res.headers()["x-ratelimit-remaining"],
            (99 - i).to_string().as_str()
        );
    }

    let res = send(&app, local_request("GET", "/shop").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.headers()["x-ratelimit-remaining"], "0");
    let retry_after: u64 = res.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0);

    let body = body_json(res).await;
    assert_eq!(body["remaining"], 0);
    assert_eq!(body["limit"], 100);
    assert!(body["reset"].is_string());
}

#[tokio::test]
async fn test_login_route_has_its_own_bucket() {
    let upstream = start_echo_upstream().await;
    let config = test_config(upstream);
    let app = app_with(config.clone(), Backends::from_shared(memory_backend(&config)));

    for _ in 0..5 {
        let res = send(&app, local_request("POST", "/api/vendor/login").body(Body::empty()).unwrap()).await;
        assert_eq!(res.status(), StatusCode::OK);
    }
    let res = send(&app, local_request("POST", "/api/vendor/login").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(res).await["code"], "RATE_LIMIT_EXCEEDED");

    // The other login endpoint is keyed separately.
    let res = send(&app, local_request("POST", "/api/admin/login").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_expired_admin_session_is_rejected() {
    let upstream = start_echo_upstream().await;
    let config = test_config(upstream);
    let backend = memory_backend(&config);
    backend.insert_admin(admin("a-1", "u-1"));
    let app = app_with(config.clone(), Backends::from_shared(backend));

    let req = local_request("GET", "/api/admin/orders")
        .header(header::AUTHORIZATION, format!("Bearer {}", session_token("a-1", 7_200_000)))
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(res).await["code"], "SESSION_EXPIRED");
}

#[tokio::test]
async fn test_admin_identity_is_forwarded_and_forgeries_dropped() {
    let upstream = start_echo_upstream().await;
    let config = test_config(upstream);
    let backend = memory_backend(&config);
    backend.insert_admin(admin("a-1", "u-1"));
    let app = app_with(config.clone(), Backends::from_shared(backend));

    let req = local_request("GET", "/api/admin/orders")
        .header(header::AUTHORIZATION, format!("Bearer {}", session_token("a-1", 1_000)))
        .header("x-admin-id", "forged")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let echoed = body_json(res).await;
    assert_eq!(echoed["x_admin_id"], "a-1");
    assert!(echoed["x_request_id"].is_string());

    let req = local_request("GET", "/products")
        .header("x-admin-id", "forged")
        .body(Body::empty())
        .unwrap();
    let echoed = body_json(send(&app, req).await).await;
    assert!(echoed["x_admin_id"].is_null());
}

#[tokio::test]
async fn test_admin_fallback_lookup_through_gate() {
    let upstream = start_echo_upstream().await;
    let config = test_config(upstream);
    let backend = memory_backend(&config);
    backend.insert_admin(admin("a-7", "u-linked"));
    backend.insert_token("provider-token", user("u-other", json!({"role": "admin", "admin_id": "a-7"})));
    let app = app_with(config.clone(), Backends::from_shared(backend));

    let req = local_request("GET", "/api/admin/stats")
        .header(header::AUTHORIZATION, "Bearer provider-token")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["x_admin_id"], "a-7");
}

#[tokio::test]
async fn test_vendor_gating() {
    let upstream = start_echo_upstream().await;
    let config = test_config(upstream);
    let backend = memory_backend(&config);
    backend.insert_token("tok-ok", user("u-ok", json!({})));
    backend.insert_token("tok-pending", user("u-pending", json!({})));
    backend.insert_vendor(vendor("v-ok", "u-ok", true, true));
    backend.insert_vendor(vendor("v-pending", "u-pending", true, false));
    let app = app_with(config.clone(), Backends::from_shared(backend));

    let req = local_request("GET", "/api/vendor/products")
        .header(header::COOKIE, "sb-access-token=tok-ok")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["x_vendor_id"], "v-ok");

    let req = local_request("GET", "/api/vendor/products")
        .header(header::AUTHORIZATION, "Bearer tok-pending")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(res).await["code"], "ACCOUNT_PENDING");

    let req = local_request("GET", "/api/vendor/products").body(Body::empty()).unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(res).await["code"], "AUTH_REQUIRED");

    // Public vendor route needs no credential.
    let req = local_request("POST", "/api/vendor/validate-promo").body(Body::empty()).unwrap();
    assert_eq!(send(&app, req).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_and_static_assets_bypass_gate() {
    let upstream = start_echo_upstream().await;
    let config = test_config(upstream);
    let app = app_with(config.clone(), Backends::from_shared(memory_backend(&config)));

    let res = send(&app, Request::get("/_gate/health").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["breaker_open"], false);

    let res = send(&app, Request::get("/_next/static/app.js").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("x-ratelimit-limit").is_none());
}

#[tokio::test]
async fn test_status_requires_admin() {
    let upstream = start_echo_upstream().await;
    let config = test_config(upstream);
    let backend = memory_backend(&config);
    backend.insert_admin(admin("a-1", "u-1"));
    let app = app_with(config.clone(), Backends::from_shared(backend));

    let res = send(&app, local_request("GET", "/_gate/status").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let req = local_request("GET", "/_gate/status")
        .header(header::AUTHORIZATION, format!("Bearer {}", session_token("a-1", 0)))
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["breaker"]["open"], false);
    assert_eq!(body["geo"]["designated_country"], "MR");
    assert_eq!(body["backend"], "memory");
}

#[tokio::test]
async fn test_dashboard_inactivity_timeout() {
    let upstream = start_echo_upstream().await;
    let config = test_config(upstream);
    let app = app_with(config.clone(), Backends::from_shared(memory_backend(&config)));
    let page = "/fassalapremierprojectbsk/orders";

    let res = send(&app, local_request("GET", page).body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(res.headers()[header::LOCATION], "/fassalapremierprojectbsk/login");

    let stale = Utc::now().timestamp_millis() - 16 * 60 * 1000;
    let req = local_request("GET", page)
        .header(header::COOKIE, format!("sb-admin-token=t; admin-last-activity={stale}"))
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(res.headers()[header::LOCATION], "/fassalapremierprojectbsk/login?timeout=true");
    let cleared: Vec<_> = res
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cleared.len(), 3);
    assert!(cleared.iter().any(|c| c.starts_with("sb-admin-token=")));

    let fresh = Utc::now().timestamp_millis() - 60_000;
    let req = local_request("GET", page)
        .header(header::COOKIE, format!("sb-admin-token=t; admin-last-activity={fresh}"))
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let refreshed = res.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(refreshed.starts_with("admin-last-activity="));
    assert!(refreshed.contains("HttpOnly"));

    // The login page itself is never redirected.
    let res = send(&app, local_request("GET", "/fassalapremierprojectbsk/login").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rejected_dashboard_request_keeps_activity_cookie() {
    let upstream = start_echo_upstream().await;
    let mut config = test_config(upstream);
    config.rate_limit.global_max = 1;
    let app = app_with(config.clone(), Backends::from_shared(memory_backend(&config)));
    let page = "/fassalapremierprojectbsk/orders";
    let fresh = Utc::now().timestamp_millis() - 60_000;
    let cookies = format!("sb-admin-token=t; admin-last-activity={fresh}");

    // Geo-blocked: no country header.
    let req = Request::builder()
        .uri(page)
        .header("x-real-ip", MR_IP)
        .header(header::COOKIE, cookies.as_str())
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(res.headers().get(header::SET_COOKIE).is_none());

    // First local request is admitted and refreshes the cookie.
    let req = local_request("GET", page)
        .header(header::COOKIE, cookies.as_str())
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get(header::SET_COOKIE).is_some());

    // Second one is throttled and must not extend the session.
    let req = local_request("GET", page)
        .header(header::COOKIE, cookies.as_str())
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().get(header::SET_COOKIE).is_none());
}

/// Counter store that always fails, counting how often it is reached.
#[derive(Default)]
struct DownStore {
    calls: AtomicU32,
}

#[async_trait]
impl CounterStore for DownStore {
    async fn check_rate_limit(&self, _: &str, _: &str, _: u32, _: u32) -> BackendResult<CounterReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::Transport("connection refused".into()))
    }

    async fn check_auth_rate_limit(&self, _: &str) -> BackendResult<CounterReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::Transport("connection refused".into()))
    }
}

#[tokio::test]
async fn test_store_outage_fails_closed_and_opens_breaker() {
    let upstream = start_echo_upstream().await;
    let config = test_config(upstream);
    let store = Arc::new(DownStore::default());
    let mut backends = Backends::from_shared(memory_backend(&config));
    backends.counters = store.clone();
    let app = app_with(config.clone(), backends);

    for _ in 0..10 {
        let res = send(&app, local_request("GET", "/shop").body(Body::empty()).unwrap()).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers()["x-ratelimit-remaining"], "0");
    }
    // Only the first five errors reach the store; the rest are short-circuited.
    assert_eq!(store.calls.load(Ordering::SeqCst), 5);

    let res = send(&app, Request::get("/_gate/health").body(Body::empty()).unwrap()).await;
    assert_eq!(body_json(res).await["breaker_open"], true);
}
