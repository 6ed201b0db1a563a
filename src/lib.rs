//! Request admission gate for the marketplace.
//!
//! Sits in front of the marketplace application and decides, per request,
//! whether it may proceed: territory check, shared rate limits with a
//! fail-closed circuit breaker, and admin/vendor verification on privileged
//! API routes.

pub mod auth;
pub mod backend;
pub mod config;
pub mod geo;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::schema::GateConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
