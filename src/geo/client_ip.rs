//! Best-effort client IP extraction from proxy headers.
//!
//! Priority: `cf-connecting-ip` (CDN) -> `x-real-ip` -> first entry of
//! `x-forwarded-for` -> the literal `"unknown"`. Values are not validated;
//! consumers must tolerate arbitrary text.

use axum::http::HeaderMap;

/// Returned when no proxy header carries an address.
pub const UNKNOWN_IP: &str = "unknown";

const CDN_CONNECTING_IP: &str = "cf-connecting-ip";
const REAL_IP: &str = "x-real-ip";
const FORWARDED_FOR: &str = "x-forwarded-for";

/// Resolve the client IP from a request's headers.
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(ip) = header_str(headers, CDN_CONNECTING_IP) {
        return ip.to_string();
    }
    if let Some(ip) = header_str(headers, REAL_IP) {
        return ip.to_string();
    }
    if let Some(first) = header_str(headers, FORWARDED_FOR)
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return first.to_string();
    }
    UNKNOWN_IP.to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
