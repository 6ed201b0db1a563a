//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (overlay ALLOWED_COUNTRIES, IP_WHITELIST, APP_ENV, ...)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; policy code never reads the environment
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, load_geo_config, ConfigError};
pub use schema::{
    AdminSessionConfig, AuthConfig, BackendConfig, BackendKind, CircuitBreakerConfig, GateConfig,
    GeoConfig, ListenerConfig, LogFormat, ObservabilityConfig, RateLimitConfig, TimeoutConfig,
    UpstreamConfig,
};
