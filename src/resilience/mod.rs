//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Admission check:
//!     → circuit_breaker.rs (open? deny without calling the store)
//!     → counter store call (bounded by timeouts.backend_secs)
//!     → circuit_breaker.rs (record success / failure, trip at threshold)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - Breaker fails closed: an outage never turns into a rate-limit bypass

pub mod circuit_breaker;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker};
