//! Configuration validation.
//!
//! Semantic checks only; serde has already handled the syntax. Every
//! problem is collected so an operator sees them all at once.

use std::net::SocketAddr;

use crate::config::schema::{BackendKind, GateConfig, GeoConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, returning every error found.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }
    if url::Url::parse(&config.upstream.url).is_err() {
        errors.push(ValidationError::new(
            "upstream.url",
            format!("'{}' is not a URL", config.upstream.url),
        ));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.timeouts.backend_secs == 0 {
        errors.push(ValidationError::new("timeouts.backend_secs", "must be > 0"));
    }

    check_geo(&config.geo, &mut errors);

    let limits = &config.rate_limit;
    for (field, max, window) in [
        ("rate_limit.global", limits.global_max, limits.global_window_minutes),
        ("rate_limit.api", limits.api_max, limits.api_window_minutes),
        ("rate_limit.auth", limits.auth_max, limits.auth_window_minutes),
    ] {
        if max == 0 || window == 0 {
            errors.push(ValidationError::new(field, "max and window must be > 0"));
        }
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_threshold",
            "must be > 0",
        ));
    }
    if config.circuit_breaker.cooldown_secs == 0 {
        errors.push(ValidationError::new("circuit_breaker.cooldown_secs", "must be > 0"));
    }

    if config.backend.kind == BackendKind::Rest {
        if url::Url::parse(&config.backend.url).is_err() {
            errors.push(ValidationError::new(
                "backend.url",
                "a valid URL is required for the rest backend",
            ));
        }
        if config.backend.service_key.is_empty() {
            errors.push(ValidationError::new(
                "backend.service_key",
                "required for the rest backend",
            ));
        }
    }

    if config.auth.admin_cookie_names.is_empty() {
        errors.push(ValidationError::new("auth.admin_cookie_names", "must not be empty"));
    }
    if config.auth.session_max_age_secs == 0 {
        errors.push(ValidationError::new("auth.session_max_age_secs", "must be > 0"));
    }
    if config.admin_session.enabled && !config.admin_session.dashboard_prefix.starts_with('/') {
        errors.push(ValidationError::new(
            "admin_session.dashboard_prefix",
            "must start with '/'",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the geo section alone, for offline territory checks.
pub fn validate_geo_config(geo: &GeoConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_geo(geo, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_geo(geo: &GeoConfig, errors: &mut Vec<ValidationError>) {
    let country = &geo.designated_country;
    if country.len() != 2 || !country.chars().all(|c| c.is_ascii_uppercase()) {
        errors.push(ValidationError::new(
            "geo.designated_country",
            "must be an upper-case ISO 3166-1 alpha-2 code",
        ));
    }
    if geo.country_header.trim().is_empty() {
        errors.push(ValidationError::new("geo.country_header", "must not be empty"));
    }
}
