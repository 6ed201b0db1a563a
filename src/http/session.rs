//! Admin dashboard inactivity timeout.
//!
//! Dashboard pages (except the login page) require the admin token cookie.
//! An activity cookie records the last page view; once it is older than the
//! inactivity window the session cookies are cleared and the browser is sent
//! back to the login page. Only requests the gate admits refresh the
//! activity cookie.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;

use crate::config::AdminSessionConfig;
use crate::http::gate::{Admitted, ClientIp};
use crate::http::server::AppState;

pub async fn admin_session_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let config = &state.config.admin_session;
    if !config.enabled || !state.routes.is_dashboard_page(req.uri().path()) {
        return next.run(req).await;
    }

    let prefix = config.dashboard_prefix.trim_end_matches('/');
    let login = format!("{prefix}/login");
    let jar = CookieJar::from_headers(req.headers());

    if jar.get(&config.token_cookie).is_none() {
        return Redirect::temporary(&login).into_response();
    }

    let now_ms = Utc::now().timestamp_millis();
    let timeout_ms = i64::try_from(config.inactivity_timeout_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
    let last_activity = jar
        .get(&config.activity_cookie)
        .and_then(|c| c.value().trim().parse::<i64>().ok());

    if let Some(last) = last_activity {
        if now_ms - last > timeout_ms {
            tracing::warn!(
                ip = %ClientIp::of(&req),
                last_activity_ms = last,
                timeout_secs = config.inactivity_timeout_secs,
                "Admin session timed out after inactivity"
            );
            let cleared = CookieJar::new()
                .add(expired(&config.token_cookie, "/"))
                .add(expired(&config.refresh_cookie, "/"))
                .add(expired(&config.activity_cookie, prefix));
            return (cleared, Redirect::temporary(&format!("{login}?timeout=true"))).into_response();
        }
    }

    let response = next.run(req).await;
    if !Admitted::is_set(&response) {
        return response;
    }
    let secure = !state.config.geo.development_mode;
    (CookieJar::new().add(activity_cookie(config, now_ms, secure)), response).into_response()
}

fn activity_cookie(config: &AdminSessionConfig, now_ms: i64, secure: bool) -> Cookie<'static> {
    let max_age = i64::try_from(config.inactivity_timeout_secs).unwrap_or(i64::MAX);
    Cookie::build((config.activity_cookie.clone(), now_ms.to_string()))
        .path(config.dashboard_prefix.trim_end_matches('/').to_string())
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(max_age))
        .build()
}

fn expired(name: &str, path: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path(path.to_string())
        .http_only(true)
        .max_age(time::Duration::ZERO)
        .build()
}
