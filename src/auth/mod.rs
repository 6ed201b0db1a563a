//! Privileged-route verification.
//!
//! # Responsibilities
//! - Extract a bearer credential from the header or cookies
//! - Verify admins (self-issued sessions or provider tokens)
//! - Verify vendors and their account standing
//!
//! # Design Decisions
//! - Verifiers never panic or propagate errors; every path ends in an [`AuthOutcome`]
//! - Backend failures are logged and surface as the matching denial

pub mod admin;
pub mod credential;
pub mod outcome;
pub mod token;
pub mod vendor;

pub use admin::AdminVerifier;
pub use credential::extract_token;
pub use outcome::{AuthErrorCode, AuthOutcome, Rejection};
pub use token::{issue_session, AdminCredential, AdminSessionClaims};
pub use vendor::VendorVerifier;
