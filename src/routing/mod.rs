//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (classification)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: exempt? extra bucket? guard? dashboard page?
//! ```

pub mod matcher;
pub mod router;

pub use router::{Guard, RateClass, RouteTable};
