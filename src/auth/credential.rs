//! Bearer credential extraction.

use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::CookieJar;

/// Bearer token from `Authorization`, else the first non-empty named cookie.
pub fn extract_token<S: AsRef<str>>(headers: &HeaderMap, cookie_names: &[S]) -> Option<String> {
    if let Some(token) = bearer_token(headers) {
        return Some(token);
    }

    let jar = CookieJar::from_headers(headers);
    cookie_names
        .iter()
        .filter_map(|name| jar.get(name.as_ref()))
        .map(|cookie| cookie.value().trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}
