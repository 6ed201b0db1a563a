//! Verifier results and their prepared HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Stable machine-readable rejection codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthErrorCode {
    AuthRequired,
    SessionExpired,
    InvalidToken,
    AdminNotFound,
    Forbidden,
    AccountInactive,
    AccountPending,
    VendorNotFound,
}

impl AuthErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::AdminNotFound => "ADMIN_NOT_FOUND",
            Self::Forbidden => "FORBIDDEN",
            Self::AccountInactive => "ACCOUNT_INACTIVE",
            Self::AccountPending => "ACCOUNT_PENDING",
            Self::VendorNotFound => "VENDOR_NOT_FOUND",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::AuthRequired | Self::SessionExpired | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            _ => StatusCode::FORBIDDEN,
        }
    }

    /// English and Arabic user-facing text.
    fn messages(&self) -> (&'static str, &'static str) {
        match self {
            Self::AuthRequired => (
                "Authentication required",
                "يجب تسجيل الدخول للوصول إلى هذه الصفحة",
            ),
            Self::SessionExpired => (
                "Session expired, please log in again",
                "انتهت صلاحية الجلسة، يرجى تسجيل الدخول مرة أخرى",
            ),
            Self::InvalidToken => (
                "Invalid or expired session",
                "الجلسة منتهية الصلاحية، يرجى تسجيل الدخول مرة أخرى",
            ),
            Self::AdminNotFound => ("Admin account not found", "حساب المسؤول غير موجود"),
            Self::Forbidden => ("Insufficient permissions", "ليس لديك صلاحية للوصول"),
            Self::AccountInactive => (
                "Vendor account is not active",
                "حسابك غير نشط، يرجى التواصل مع الإدارة",
            ),
            Self::AccountPending => (
                "Vendor account is pending approval",
                "حسابك قيد المراجعة، يرجى الانتظار حتى تتم الموافقة",
            ),
            Self::VendorNotFound => ("Vendor account not found", "حساب البائع غير موجود"),
        }
    }
}

impl std::fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
struct RejectionBody {
    error: &'static str,
    code: AuthErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

/// A prepared 401/403 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub code: AuthErrorCode,
}

impl Rejection {
    pub fn new(code: AuthErrorCode) -> Self {
        Self { code }
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let (error, message_ar) = self.code.messages();
        let body = RejectionBody {
            error,
            code: self.code,
            message: Some(message_ar),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Result of a privileged-route verification.
///
/// Route code branches on [`AuthOutcome::is_success`] and, on failure,
/// returns the prepared response unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome<P> {
    Authorized(P),
    Rejected(Rejection),
}

impl<P> AuthOutcome<P> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Authorized(_))
    }

    pub fn principal(&self) -> Option<&P> {
        match self {
            Self::Authorized(p) => Some(p),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Authorized(_) => None,
            Self::Rejected(r) => Some(*r),
        }
    }

    /// Principal on success, the prepared response otherwise.
    pub fn into_result(self) -> Result<P, Response> {
        match self {
            Self::Authorized(p) => Ok(p),
            Self::Rejected(r) => Err(r.into_response()),
        }
    }
}

impl<P> From<AuthErrorCode> for AuthOutcome<P> {
    fn from(code: AuthErrorCode) -> Self {
        Self::Rejected(Rejection::new(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthErrorCode::AuthRequired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthErrorCode::SessionExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthErrorCode::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthErrorCode::AdminNotFound.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthErrorCode::AccountPending.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_code_serializes_as_wire_string() {
        for code in [
            AuthErrorCode::AccountInactive,
            AuthErrorCode::VendorNotFound,
            AuthErrorCode::SessionExpired,
        ] {
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json, serde_json::Value::String(code.as_str().to_string()));
        }
    }

    #[test]
    fn test_outcome_accessors() {
        let ok: AuthOutcome<u32> = AuthOutcome::Authorized(7);
        assert!(ok.is_success());
        assert_eq!(ok.principal(), Some(&7));

        let denied: AuthOutcome<u32> = AuthErrorCode::Forbidden.into();
        assert!(!denied.is_success());
        assert_eq!(denied.rejection().map(|r| r.code), Some(AuthErrorCode::Forbidden));
        let response = denied.into_result().unwrap_err();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
