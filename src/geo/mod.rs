//! Geographic access control subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (cf-connecting-ip / x-real-ip / x-forwarded-for)
//!     → fence.rs (country code, or IP range via cidr.rs)
//!     → inside territory, or 403 GEO_BLOCKED at the gate
//! ```
//!
//! # Design Decisions
//! - Fail closed: any ambiguity resolves to "outside territory"
//! - Development loosening needs two independent flags
//! - Range table compiled once at startup

pub mod cidr;
pub mod client_ip;
pub mod fence;

pub use client_ip::{client_ip, UNKNOWN_IP};
pub use fence::GeoFence;
