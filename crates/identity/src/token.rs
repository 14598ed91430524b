//! Bearer token issuance and verification (HS256).
//!
//! Signature handling lives here; deterministic claim-window validation lives
//! in [`crate::claims`] so it stays testable without key material.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use parceltrace_core::AccountId;

use crate::{validate_claims, AuthClaims, Role, TokenValidationError};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token encoding failed: {0}")]
    Encode(String),

    #[error("token is malformed or has an invalid signature")]
    Invalid,

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Token boundary used by the transport layer.
pub trait TokenCodec: Send + Sync {
    fn issue(&self, sub: AccountId, role: Role, now: DateTime<Utc>) -> Result<String, TokenError>;

    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<AuthClaims, TokenError>;
}

/// HS256 codec over a shared secret.
pub struct Hs256TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Hs256TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

impl TokenCodec for Hs256TokenCodec {
    fn issue(&self, sub: AccountId, role: Role, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = AuthClaims::issue(sub, role, now);
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<AuthClaims, TokenError> {
        // The claims carry RFC3339 timestamps rather than numeric `exp`/`iat`,
        // so the time window is checked deterministically by `validate_claims`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<AuthClaims>(token, &self.decoding, &validation)
            .map_err(|_| TokenError::Invalid)?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn issue_and_validate_roundtrip() {
        let codec = Hs256TokenCodec::new(b"test-secret");
        let sub = AccountId::new();
        let now = Utc::now();

        let token = codec.issue(sub, Role::Agent, now).unwrap();
        let claims = codec.validate(&token, now + Duration::hours(1)).unwrap();

        assert_eq!(claims.sub, sub);
        assert_eq!(claims.role, Role::Agent);
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = Hs256TokenCodec::new(b"test-secret");
        let now = Utc::now();

        let token = codec.issue(AccountId::new(), Role::User, now).unwrap();
        let err = codec.validate(&token, now + Duration::days(8)).unwrap_err();
        assert!(matches!(err, TokenError::Claims(TokenValidationError::Expired)));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let codec = Hs256TokenCodec::new(b"secret-a");
        let other = Hs256TokenCodec::new(b"secret-b");
        let now = Utc::now();

        let token = codec.issue(AccountId::new(), Role::User, now).unwrap();
        assert!(matches!(
            other.validate(&token, now).unwrap_err(),
            TokenError::Invalid
        ));
    }
}
