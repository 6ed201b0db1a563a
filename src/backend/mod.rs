//! Hosted backend collaborators.
//!
//! # Responsibilities
//! - Atomic rate-limit counters (`CounterStore`)
//! - Bearer token introspection (`AuthProvider`)
//! - Read-only principal lookups (`PrincipalDirectory`)
//!
//! # Design Decisions
//! - The gate never writes principal rows
//! - Counter replies keep every field optional; callers decide the fail-closed defaults
//! - Two implementations: `rest` for the hosted service, `memory` for local runs and tests

pub mod memory;
pub mod rest;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{BackendKind, GateConfig};

pub use memory::MemoryBackend;
pub use rest::RestBackend;

/// Errors that can occur when calling the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Connection or transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Call exceeded its deadline.
    #[error("backend call timed out after {0} seconds")]
    Timeout(u64),

    /// The backend refused the credential being introspected.
    #[error("credential rejected by auth provider")]
    Unauthorized,

    /// Non-success status from the backend.
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not have the expected shape.
    #[error("malformed backend response: {0}")]
    Decode(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Raw verdict of the counter RPC. Fields may be missing on a malformed reply.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CounterReply {
    #[serde(default)]
    pub allowed: Option<bool>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub remaining: Option<i64>,
    #[serde(default)]
    pub reset_at: Option<String>,
}

/// Identity returned by token introspection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl AuthUser {
    /// Role claim embedded in the user's metadata.
    pub fn role(&self) -> Option<&str> {
        self.user_metadata.get("role").and_then(|v| v.as_str())
    }

    /// Admin id claim embedded in the user's metadata.
    pub fn admin_id(&self) -> Option<&str> {
        self.user_metadata
            .get("admin_id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Row of the admins table, as far as the gate reads it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AdminRecord {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Absent on older rows, which are treated as enabled.
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl AdminRecord {
    pub fn is_enabled(&self) -> bool {
        self.is_active.unwrap_or(true)
    }
}

/// Row of the vendors table, as far as the gate reads it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VendorRecord {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub business_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_approved: Option<bool>,
}

/// Atomic check-and-increment counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn check_rate_limit(
        &self,
        identifier: &str,
        endpoint: &str,
        max_requests: u32,
        window_minutes: u32,
    ) -> BackendResult<CounterReply>;

    /// Dedicated RPC for authentication endpoints; the store owns its policy.
    async fn check_auth_rate_limit(&self, identifier: &str) -> BackendResult<CounterReply>;
}

/// Token introspection.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn introspect(&self, token: &str) -> BackendResult<AuthUser>;
}

/// Point reads against the principal tables. `Ok(None)` means no such row.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    async fn admin_by_user_id(&self, user_id: &str) -> BackendResult<Option<AdminRecord>>;

    async fn admin_by_id(&self, admin_id: &str) -> BackendResult<Option<AdminRecord>>;

    async fn admin_by_id_and_email(
        &self,
        admin_id: &str,
        email: &str,
    ) -> BackendResult<Option<AdminRecord>>;

    async fn vendor_by_user_id(&self, user_id: &str) -> BackendResult<Option<VendorRecord>>;
}

/// The three collaborator handles, shared across subsystems.
#[derive(Clone)]
pub struct Backends {
    pub counters: Arc<dyn CounterStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub directory: Arc<dyn PrincipalDirectory>,
}

impl Backends {
    /// Wire one implementation behind all three roles.
    pub fn from_shared<B>(backend: Arc<B>) -> Self
    where
        B: CounterStore + AuthProvider + PrincipalDirectory + 'static,
    {
        Self {
            counters: backend.clone(),
            auth: backend.clone(),
            directory: backend,
        }
    }

    /// Build the configured implementation.
    pub fn from_config(config: &GateConfig) -> BackendResult<Self> {
        match config.backend.kind {
            BackendKind::Rest => {
                let rest = RestBackend::new(&config.backend, &config.timeouts)?;
                Ok(Self::from_shared(Arc::new(rest)))
            }
            BackendKind::Memory => {
                tracing::warn!("Using in-memory backend; counters and principals are not persisted");
                Ok(Self::from_shared(Arc::new(MemoryBackend::new(
                    config.rate_limit.auth_max,
                    config.rate_limit.auth_window_minutes,
                ))))
            }
        }
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}
