//! Gate-generated responses.
//!
//! # Responsibilities
//! - 403 geo-block body
//! - 429 body and headers
//! - `X-RateLimit-*` headers on admitted responses

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::security::RateLimitDecision;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

pub const GEO_BLOCKED: &str = "GEO_BLOCKED";
pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";

#[derive(Debug, Serialize)]
struct GeoBlockedBody {
    error: &'static str,
    code: &'static str,
    message_ar: &'static str,
}

#[derive(Debug, Serialize)]
struct RateLimitedBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    message_ar: &'static str,
    limit: u32,
    remaining: u32,
    reset: String,
}

pub fn geo_blocked() -> Response {
    let body = GeoBlockedBody {
        error: "Access denied. This service is only available in Mauritania.",
        code: GEO_BLOCKED,
        message_ar: "تم رفض الوصول. هذه الخدمة متاحة فقط في موريتانيا.",
    };
    (StatusCode::FORBIDDEN, Json(body)).into_response()
}

/// 429 for a denied decision. `code` is set for route-class buckets only.
pub fn rate_limited(decision: &RateLimitDecision, code: Option<&'static str>, now: DateTime<Utc>) -> Response {
    let body = RateLimitedBody {
        error: "Too many requests. Please try again later.",
        code,
        message_ar: "طلبات كثيرة جداً. يرجى المحاولة لاحقاً.",
        limit: decision.limit,
        remaining: 0,
        reset: decision.reset_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(0u32));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_millis()));
    headers.insert(header::RETRY_AFTER, HeaderValue::from(decision.retry_after_secs(now)));
    response
}

/// Attach the admitting decision to a forwarded response.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_millis()));
}
