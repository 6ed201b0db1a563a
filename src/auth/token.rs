//! Admin credential classification and the self-issued session format.
//!
//! A session token is `base64(json)` or, when a signing secret is
//! configured, `base64(json).base64(hmac_sha256(json))`. Anything that does
//! not decode to the session shape is handed to the auth provider as an
//! opaque bearer token.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Timestamps this far ahead of the local clock are still accepted.
pub const MAX_CLOCK_SKEW_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid signing key")]
    InvalidKey,

    #[error("failed to encode session claims: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Claims carried by a self-issued admin session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSessionClaims {
    pub admin_id: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    /// Issue time, milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Age verdict for a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Expired,
    /// Issued further in the future than clock skew explains.
    FromFuture,
}

/// A decoded session token, signature not yet checked.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub claims: AdminSessionClaims,
    payload: Vec<u8>,
    signature: Option<Vec<u8>>,
}

impl SessionToken {
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Constant-time check of the HMAC over the raw JSON payload.
    pub fn verify_signature(&self, secret: &[u8]) -> bool {
        let Some(signature) = &self.signature else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
            return false;
        };
        mac.update(&self.payload);
        mac.verify_slice(signature).is_ok()
    }

    pub fn freshness(&self, now_ms: i64, max_age_ms: i64) -> Freshness {
        let age = now_ms - self.claims.timestamp;
        if age > max_age_ms {
            Freshness::Expired
        } else if age < -MAX_CLOCK_SKEW_MS {
            Freshness::FromFuture
        } else {
            Freshness::Fresh
        }
    }
}

/// How an admin credential must be verified.
#[derive(Debug, Clone)]
pub enum AdminCredential<'a> {
    Session(SessionToken),
    Provider(&'a str),
}

impl<'a> AdminCredential<'a> {
    pub fn classify(token: &'a str) -> Self {
        match decode_session(token) {
            Some(session) => Self::Session(session),
            None => Self::Provider(token),
        }
    }
}

fn decode_session(token: &str) -> Option<SessionToken> {
    let (payload_b64, signature) = match token.split_once('.') {
        Some((payload, sig)) => (payload, Some(STANDARD.decode(sig).ok()?)),
        None => (token, None),
    };
    let payload = STANDARD.decode(payload_b64).ok()?;
    let claims: AdminSessionClaims = serde_json::from_slice(&payload).ok()?;
    if claims.admin_id.is_empty() || claims.email.is_empty() {
        return None;
    }
    Some(SessionToken {
        claims,
        payload,
        signature,
    })
}

/// Encode a session token, signing it when a secret is given.
pub fn issue_session(claims: &AdminSessionClaims, secret: Option<&[u8]>) -> Result<String, TokenError> {
    let payload = serde_json::to_vec(claims)?;
    let encoded = STANDARD.encode(&payload);
    match secret {
        None => Ok(encoded),
        Some(secret) => {
            let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::InvalidKey)?;
            mac.update(&payload);
            let signature = mac.finalize().into_bytes();
            Ok(format!("{encoded}.{}", STANDARD.encode(signature)))
        }
    }
}
