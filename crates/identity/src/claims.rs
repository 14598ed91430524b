use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use parceltrace_core::AccountId;

use crate::Role;

/// Validity window for issued bearer tokens.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Bearer token claims model (transport-agnostic).
///
/// This is the minimal set of claims the platform expects once a token has
/// been decoded/verified by whatever transport/security layer is in use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    /// Subject / account identifier.
    pub sub: AccountId,

    /// Role granted at issuance time.
    pub role: Role,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

impl AuthClaims {
    /// Claims for a freshly issued token with the standard 7-day window.
    pub fn issue(sub: AccountId, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            sub,
            role,
            issued_at: now,
            expires_at: now + Duration::days(TOKEN_TTL_DAYS),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate token claims.
///
/// Note: this validates the *claims* only. Signature verification / decoding
/// lives in [`crate::token`].
pub fn validate_claims(claims: &AuthClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
