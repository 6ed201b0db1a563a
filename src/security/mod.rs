//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (after the geo-fence):
//!     → rate_limit.rs (global bucket per IP)
//!     → rate_limit.rs (api / auth buckets for matching route classes)
//!     → Pass to privileged guards and forwarding
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod rate_limit;

pub use rate_limit::{AdmissionController, RateLimitDecision};
