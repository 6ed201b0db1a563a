//! Vendor verification for vendor-only routes.

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::auth::credential::extract_token;
use crate::auth::outcome::{AuthErrorCode, AuthOutcome};
use crate::backend::{AuthProvider, BackendError, Backends, PrincipalDirectory, VendorRecord};
use crate::config::AuthConfig;
use crate::observability::metrics;

pub struct VendorVerifier {
    auth: Arc<dyn AuthProvider>,
    directory: Arc<dyn PrincipalDirectory>,
    cookie_names: [String; 1],
}

impl VendorVerifier {
    pub fn new(backends: &Backends, config: &AuthConfig) -> Self {
        Self {
            auth: backends.auth.clone(),
            directory: backends.directory.clone(),
            cookie_names: [config.vendor_cookie_name.clone()],
        }
    }

    /// Authenticate the vendor behind a request and check account standing.
    ///
    /// Checks run in a fixed order: credential, token, record, active, approved.
    pub async fn verify(&self, headers: &HeaderMap, client_ip: &str) -> AuthOutcome<VendorRecord> {
        let Some(token) = extract_token(headers, &self.cookie_names) else {
            tracing::warn!(ip = %client_ip, "Vendor access without credentials");
            return deny(AuthErrorCode::AuthRequired);
        };

        let user = match self.auth.introspect(&token).await {
            Ok(user) => user,
            Err(BackendError::Unauthorized) => {
                tracing::warn!(ip = %client_ip, "Vendor token rejected by auth provider");
                return deny(AuthErrorCode::InvalidToken);
            }
            Err(e) => {
                tracing::error!(error = %e, ip = %client_ip, "Vendor token introspection failed");
                return deny(AuthErrorCode::InvalidToken);
            }
        };

        let vendor = match self.directory.vendor_by_user_id(&user.id).await {
            Ok(Some(vendor)) => vendor,
            Ok(None) => {
                tracing::warn!(ip = %client_ip, user_id = %user.id, "No vendor record for user");
                return deny(AuthErrorCode::VendorNotFound);
            }
            Err(e) => {
                tracing::error!(error = %e, ip = %client_ip, user_id = %user.id, "Vendor directory lookup failed");
                return deny(AuthErrorCode::VendorNotFound);
            }
        };

        if vendor.is_active != Some(true) {
            tracing::warn!(ip = %client_ip, user_id = %user.id, vendor_id = %vendor.id, "Inactive vendor account");
            return deny(AuthErrorCode::AccountInactive);
        }
        if vendor.is_approved != Some(true) {
            tracing::warn!(ip = %client_ip, user_id = %user.id, vendor_id = %vendor.id, "Vendor account pending approval");
            return deny(AuthErrorCode::AccountPending);
        }

        tracing::debug!(vendor_id = %vendor.id, "Vendor verified");
        AuthOutcome::Authorized(vendor)
    }
}

impl std::fmt::Debug for VendorVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorVerifier")
            .field("cookie_names", &self.cookie_names)
            .finish_non_exhaustive()
    }
}

fn deny(code: AuthErrorCode) -> AuthOutcome<VendorRecord> {
    metrics::record_auth_denied("vendor", code.as_str());
    code.into()
}
