//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout)
//!     → session.rs (admin dashboard inactivity)
//!     → gate.rs (geo-fence, rate limits)
//!     → guards.rs (admin / vendor verification)
//!     → status.rs (gate endpoints) or upstream forwarding
//!     → response.rs (429 / 403 bodies, rate-limit headers)
//! ```

pub mod gate;
pub mod guards;
pub mod response;
pub mod server;
pub mod session;
pub mod status;

pub use gate::{Admitted, ClientIp};
pub use server::{build_router, AppState, GateState, HttpServer, ServerError};
