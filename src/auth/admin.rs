//! Admin verification for privileged routes.
//!
//! # Data Flow
//! ```text
//! credential ─┬─ session shape ─→ signature? ─→ freshness ─→ admin by (id, email)
//!             └─ otherwise ─────→ introspect ─→ role == admin ─→ admin by user_id
//!                                                              └→ admin by metadata admin_id
//! ```

use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::Utc;

use crate::auth::credential::extract_token;
use crate::auth::outcome::{AuthErrorCode, AuthOutcome};
use crate::auth::token::{AdminCredential, Freshness, SessionToken};
use crate::backend::{AdminRecord, AuthProvider, AuthUser, Backends, BackendError, PrincipalDirectory};
use crate::config::AuthConfig;
use crate::observability::metrics;

const ADMIN_ROLE: &str = "admin";

pub struct AdminVerifier {
    auth: Arc<dyn AuthProvider>,
    directory: Arc<dyn PrincipalDirectory>,
    cookie_names: Vec<String>,
    max_age_ms: i64,
    secret: Option<Vec<u8>>,
}

impl AdminVerifier {
    pub fn new(backends: &Backends, config: &AuthConfig) -> Self {
        let secret = config
            .admin_session_secret
            .as_ref()
            .map(|s| s.as_bytes().to_vec());
        if secret.is_none() {
            tracing::warn!("No admin session secret configured; unsigned admin session tokens are accepted");
        }
        Self {
            auth: backends.auth.clone(),
            directory: backends.directory.clone(),
            cookie_names: config.admin_cookie_names.clone(),
            max_age_ms: i64::try_from(config.session_max_age_secs.saturating_mul(1000))
                .unwrap_or(i64::MAX),
            secret,
        }
    }

    /// Authenticate and authorize the admin behind a request.
    pub async fn verify(&self, headers: &HeaderMap, client_ip: &str) -> AuthOutcome<AdminRecord> {
        let Some(token) = extract_token(headers, &self.cookie_names) else {
            tracing::warn!(ip = %client_ip, "Admin access without credentials");
            return deny(AuthErrorCode::AuthRequired);
        };

        match AdminCredential::classify(&token) {
            AdminCredential::Session(session) => self.verify_session(session, client_ip).await,
            AdminCredential::Provider(token) => self.verify_provider(token, client_ip).await,
        }
    }

    async fn verify_session(&self, session: SessionToken, client_ip: &str) -> AuthOutcome<AdminRecord> {
        match (&self.secret, session.is_signed()) {
            (Some(secret), true) if session.verify_signature(secret) => {}
            (None, false) => {}
            (Some(_), _) => {
                tracing::warn!(
                    ip = %client_ip,
                    admin_id = %session.claims.admin_id,
                    "Admin session signature missing or invalid"
                );
                return deny(AuthErrorCode::InvalidToken);
            }
            (None, true) => {
                tracing::warn!(
                    ip = %client_ip,
                    admin_id = %session.claims.admin_id,
                    "Signed admin session presented but no secret configured"
                );
                return deny(AuthErrorCode::InvalidToken);
            }
        }

        match session.freshness(Utc::now().timestamp_millis(), self.max_age_ms) {
            Freshness::Fresh => {}
            Freshness::Expired => {
                tracing::warn!(
                    ip = %client_ip,
                    admin_id = %session.claims.admin_id,
                    timestamp = session.claims.timestamp,
                    "Admin session expired"
                );
                return deny(AuthErrorCode::SessionExpired);
            }
            Freshness::FromFuture => {
                tracing::warn!(
                    ip = %client_ip,
                    admin_id = %session.claims.admin_id,
                    timestamp = session.claims.timestamp,
                    "Admin session issued in the future"
                );
                return deny(AuthErrorCode::InvalidToken);
            }
        }

        let claims = &session.claims;
        let found = self
            .lookup("admin_by_id_and_email", self.directory.admin_by_id_and_email(&claims.admin_id, &claims.email))
            .await;
        match found {
            Some(admin) => self.grant(admin, client_ip),
            None => {
                tracing::warn!(
                    ip = %client_ip,
                    admin_id = %claims.admin_id,
                    email = %claims.email,
                    "Admin session names no admin record"
                );
                deny(AuthErrorCode::AdminNotFound)
            }
        }
    }

    async fn verify_provider(&self, token: &str, client_ip: &str) -> AuthOutcome<AdminRecord> {
        let user = match self.auth.introspect(token).await {
            Ok(user) => user,
            Err(BackendError::Unauthorized) => {
                tracing::warn!(ip = %client_ip, "Admin token rejected by auth provider");
                return deny(AuthErrorCode::InvalidToken);
            }
            Err(e) => {
                tracing::error!(error = %e, ip = %client_ip, "Admin token introspection failed");
                return deny(AuthErrorCode::InvalidToken);
            }
        };

        if user.role() != Some(ADMIN_ROLE) {
            tracing::warn!(
                ip = %client_ip,
                user_id = %user.id,
                role = user.role().unwrap_or("none"),
                "Non-admin principal attempted admin access"
            );
            return deny(AuthErrorCode::Forbidden);
        }

        if let Some(admin) = self.lookup("admin_by_user_id", self.directory.admin_by_user_id(&user.id)).await {
            return self.grant(admin, client_ip);
        }

        if let Some(admin) = self.fallback_lookup(&user).await {
            tracing::info!(
                user_id = %user.id,
                admin_id = %admin.id,
                "Admin resolved through metadata admin_id"
            );
            return self.grant(admin, client_ip);
        }

        tracing::error!(
            ip = %client_ip,
            user_id = %user.id,
            email = user.email.as_deref().unwrap_or(""),
            "SECURITY ALERT: admin role without a matching admin record"
        );
        deny(AuthErrorCode::AdminNotFound)
    }

    async fn fallback_lookup(&self, user: &AuthUser) -> Option<AdminRecord> {
        let admin_id = user.admin_id()?;
        self.lookup("admin_by_id", self.directory.admin_by_id(admin_id)).await
    }

    /// Directory errors read as "no record"; the caller denies either way.
    async fn lookup<F>(&self, op: &'static str, query: F) -> Option<AdminRecord>
    where
        F: std::future::Future<Output = Result<Option<AdminRecord>, BackendError>>,
    {
        match query.await {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(op, error = %e, "Admin directory lookup failed");
                None
            }
        }
    }

    fn grant(&self, admin: AdminRecord, client_ip: &str) -> AuthOutcome<AdminRecord> {
        if !admin.is_enabled() {
            tracing::warn!(ip = %client_ip, admin_id = %admin.id, "Disabled admin attempted access");
            return deny(AuthErrorCode::Forbidden);
        }
        tracing::info!(ip = %client_ip, admin_id = %admin.id, email = %admin.email, "Admin verified");
        AuthOutcome::Authorized(admin)
    }
}

impl std::fmt::Debug for AdminVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminVerifier")
            .field("cookie_names", &self.cookie_names)
            .field("max_age_ms", &self.max_age_ms)
            .field("signed_sessions", &self.secret.is_some())
            .finish()
    }
}

/// Every caller logs the denial with its own context first.
fn deny(code: AuthErrorCode) -> AuthOutcome<AdminRecord> {
    metrics::record_auth_denied("admin", code.as_str());
    code.into()
}
