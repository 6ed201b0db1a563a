//! In-process backend for local development and tests.
//!
//! Counters are fixed windows keyed by `(identifier, endpoint, window)`,
//! which honors the same contract as the hosted RPC: the first
//! `max_requests` calls in a window are allowed, the next is not. Expired
//! windows are swept every [`SWEEP_EVERY`] counter calls.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::backend::{
    AdminRecord, AuthProvider, AuthUser, BackendError, BackendResult, CounterReply, CounterStore,
    PrincipalDirectory, VendorRecord,
};

const AUTH_ENDPOINT: &str = "auth";
pub const SWEEP_EVERY: u64 = 1024;

#[derive(Debug, Clone)]
struct Window {
    started: DateTime<Utc>,
    count: u32,
}

/// A fully in-memory backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    windows: DashMap<(String, String, u32), Window>,
    tokens: DashMap<String, AuthUser>,
    admins: DashMap<String, AdminRecord>,
    vendors: DashMap<String, VendorRecord>,
    calls: AtomicU64,
    auth_max: u32,
    auth_window_minutes: u32,
}

impl MemoryBackend {
    pub fn new(auth_max: u32, auth_window_minutes: u32) -> Self {
        Self {
            auth_max,
            auth_window_minutes,
            ..Default::default()
        }
    }

    /// Register a bearer token that introspects to `user`.
    pub fn insert_token(&self, token: impl Into<String>, user: AuthUser) {
        self.tokens.insert(token.into(), user);
    }

    pub fn insert_admin(&self, admin: AdminRecord) {
        self.admins.insert(admin.id.clone(), admin);
    }

    pub fn insert_vendor(&self, vendor: VendorRecord) {
        self.vendors.insert(vendor.id.clone(), vendor);
    }

    /// Drop every window that has fully elapsed at `now`.
    pub fn prune_expired(&self, now: DateTime<Utc>) {
        let before = self.windows.len();
        self.windows.retain(|(_, _, minutes), window| {
            now - window.started < chrono::Duration::minutes(i64::from(*minutes))
        });
        let dropped = before.saturating_sub(self.windows.len());
        if dropped > 0 {
            tracing::debug!(dropped, live = self.windows.len(), "Pruned expired counter windows");
        }
    }

    /// Number of counter windows currently held.
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    fn count(
        &self,
        identifier: &str,
        endpoint: &str,
        max_requests: u32,
        window_minutes: u32,
    ) -> CounterReply {
        self.count_at(Utc::now(), identifier, endpoint, max_requests, window_minutes)
    }

    fn count_at(
        &self,
        now: DateTime<Utc>,
        identifier: &str,
        endpoint: &str,
        max_requests: u32,
        window_minutes: u32,
    ) -> CounterReply {
        // Sweep before taking the entry lock; retain locks every shard.
        if self.calls.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.prune_expired(now);
        }

        let window_len = chrono::Duration::minutes(i64::from(window_minutes));

        let key = (identifier.to_string(), endpoint.to_string(), window_minutes);
        let mut entry = self.windows.entry(key).or_insert_with(|| Window {
            started: now,
            count: 0,
        });
        if now - entry.started >= window_len {
            entry.started = now;
            entry.count = 0;
        }

        let allowed = entry.count < max_requests;
        if allowed {
            entry.count += 1;
        }

        CounterReply {
            allowed: Some(allowed),
            limit: Some(i64::from(max_requests)),
            remaining: Some(i64::from(max_requests.saturating_sub(entry.count))),
            reset_at: Some((entry.started + window_len).to_rfc3339()),
        }
    }
}

#[async_trait]
impl CounterStore for MemoryBackend {
    async fn check_rate_limit(
        &self,
        identifier: &str,
        endpoint: &str,
        max_requests: u32,
        window_minutes: u32,
    ) -> BackendResult<CounterReply> {
        Ok(self.count(identifier, endpoint, max_requests, window_minutes))
    }

    async fn check_auth_rate_limit(&self, identifier: &str) -> BackendResult<CounterReply> {
        Ok(self.count(identifier, AUTH_ENDPOINT, self.auth_max, self.auth_window_minutes))
    }
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn introspect(&self, token: &str) -> BackendResult<AuthUser> {
        self.tokens
            .get(token)
            .map(|user| user.value().clone())
            .ok_or(BackendError::Unauthorized)
    }
}

#[async_trait]
impl PrincipalDirectory for MemoryBackend {
    async fn admin_by_user_id(&self, user_id: &str) -> BackendResult<Option<AdminRecord>> {
        Ok(self
            .admins
            .iter()
            .find(|a| a.user_id.as_deref() == Some(user_id))
            .map(|a| a.value().clone()))
    }

    async fn admin_by_id(&self, admin_id: &str) -> BackendResult<Option<AdminRecord>> {
        Ok(self.admins.get(admin_id).map(|a| a.value().clone()))
    }

    async fn admin_by_id_and_email(
        &self,
        admin_id: &str,
        email: &str,
    ) -> BackendResult<Option<AdminRecord>> {
        Ok(self
            .admins
            .get(admin_id)
            .filter(|a| a.email == email)
            .map(|a| a.value().clone()))
    }

    async fn vendor_by_user_id(&self, user_id: &str) -> BackendResult<Option<VendorRecord>> {
        Ok(self
            .vendors
            .iter()
            .find(|v| v.user_id.as_deref() == Some(user_id))
            .map(|v| v.value().clone()))
    }
}
