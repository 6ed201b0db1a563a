//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the admission gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// The marketplace application admitted requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Geographic access control.
    pub geo: GeoConfig,

    /// Rate limiting buckets and route classes.
    pub rate_limit: RateLimitConfig,

    /// Fail-closed breaker around the counter store.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Backing store (counters, auth introspection, principal tables).
    pub backend: BackendConfig,

    /// Privileged route verification.
    pub auth: AuthConfig,

    /// Admin dashboard inactivity tracking.
    pub admin_session: AdminSessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Upstream application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the marketplace web application.
    pub url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Deadline for a single call to the backing store, in seconds.
    pub backend_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            backend_secs: 5,
        }
    }
}

/// Geographic access control configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeoConfig {
    /// Enable the geo-fence at the gate.
    pub enabled: bool,

    /// ISO 3166-1 alpha-2 code of the service territory.
    pub designated_country: String,

    /// Header carrying the edge platform's country signal.
    pub country_header: String,

    /// Additional country codes admitted by the operator.
    pub allowed_countries: Vec<String>,

    /// IPs that bypass the range check in production.
    pub ip_whitelist: Vec<String>,

    /// IPs that bypass the range check outside production.
    pub ip_whitelist_dev: Vec<String>,

    /// Development mode. Only loosens checks together with `allow_localhost`.
    pub development_mode: bool,

    /// Admit absent geo signals and private ranges (development only).
    pub allow_localhost: bool,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            designated_country: "MR".to_string(),
            country_header: "x-vercel-ip-country".to_string(),
            allowed_countries: Vec::new(),
            ip_whitelist: Vec::new(),
            ip_whitelist_dev: Vec::new(),
            development_mode: false,
            allow_localhost: false,
        }
    }
}

impl GeoConfig {
    /// Both development flags must be set for any permissive behavior.
    pub fn local_override(&self) -> bool {
        self.development_mode && self.allow_localhost
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting at the gate.
    pub enabled: bool,

    /// Global bucket: requests per window per IP.
    pub global_max: u32,
    pub global_window_minutes: u32,

    /// API bucket: requests per window per IP.
    pub api_max: u32,
    pub api_window_minutes: u32,

    /// Authentication bucket, enforced by the dedicated auth RPC.
    pub auth_max: u32,
    pub auth_window_minutes: u32,

    /// Paths under this prefix also count against the API bucket.
    pub api_prefix: String,

    /// Login endpoints that count against the authentication bucket.
    pub auth_paths: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global_max: 100,
            global_window_minutes: 1,
            api_max: 30,
            api_window_minutes: 1,
            auth_max: 5,
            auth_window_minutes: 15,
            api_prefix: "/api/".to_string(),
            auth_paths: vec![
                "/api/admin/login".to_string(),
                "/api/vendor/login".to_string(),
            ],
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive counter-store errors before the breaker opens.
    pub failure_threshold: u32,

    /// Seconds the breaker stays open before admission resumes.
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_secs: 60,
        }
    }
}

/// Which backing store implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Hosted backend reached over its REST/RPC interface.
    #[default]
    Rest,
    /// In-process store for local development.
    Memory,
}

/// Backing store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,

    /// Base URL of the hosted backend (e.g., "https://xyz.supabase.co").
    pub url: String,

    /// Service-role key sent as `apikey` and bearer on privileged calls.
    pub service_key: String,
}

/// Privileged route verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Cookies searched for an admin credential, in order.
    pub admin_cookie_names: Vec<String>,

    /// Cookie searched for a vendor credential.
    pub vendor_cookie_name: String,

    /// Freshness window of a custom admin session, in seconds.
    pub session_max_age_secs: u64,

    /// HMAC key for custom admin sessions. Unsigned sessions are refused when set.
    pub admin_session_secret: Option<String>,

    /// Admin API routes verified at the gate.
    pub admin_api_prefix: String,

    /// Vendor API routes verified at the gate.
    pub vendor_api_prefix: String,

    /// Paths under the privileged prefixes that skip verification.
    pub public_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_cookie_names: vec!["sb-admin-token".to_string(), "sb-access-token".to_string()],
            vendor_cookie_name: "sb-access-token".to_string(),
            session_max_age_secs: 3600,
            admin_session_secret: None,
            admin_api_prefix: "/api/admin/".to_string(),
            vendor_api_prefix: "/api/vendor/".to_string(),
            public_paths: vec![
                "/api/admin/login".to_string(),
                "/api/vendor/login".to_string(),
                "/api/vendor/validate-promo".to_string(),
            ],
        }
    }
}

/// Admin dashboard session tracking.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminSessionConfig {
    pub enabled: bool,

    /// Path prefix of the admin dashboard pages.
    pub dashboard_prefix: String,

    pub token_cookie: String,
    pub refresh_cookie: String,
    pub activity_cookie: String,

    /// Inactivity window, in seconds.
    pub inactivity_timeout_secs: u64,
}

impl Default for AdminSessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dashboard_prefix: "/fassalapremierprojectbsk".to_string(),
            token_cookie: "sb-admin-token".to_string(),
            refresh_cookie: "sb-admin-refresh-token".to_string(),
            activity_cookie: "admin-last-activity".to_string(),
            inactivity_timeout_secs: 15 * 60,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_policy() {
        let config = GateConfig::default();
        assert_eq!(config.rate_limit.global_max, 100);
        assert_eq!(config.rate_limit.api_max, 30);
        assert_eq!(config.rate_limit.auth_max, 5);
        assert_eq!(config.rate_limit.auth_window_minutes, 15);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.cooldown_secs, 60);
        assert_eq!(config.auth.session_max_age_secs, 3600);
        assert!(!config.geo.local_override());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: GateConfig = toml::from_str(
            r#"
            [geo]
            allowed_countries = ["SN"]
            development_mode = true

            [backend]
            kind = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.geo.allowed_countries, vec!["SN".to_string()]);
        assert_eq!(config.geo.designated_country, "MR");
        assert!(config.geo.development_mode);
        assert!(!config.geo.local_override());
        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }
}
