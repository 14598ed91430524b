//! `parceltrace-identity` — accounts, credentials and caller identity.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod account;
pub mod claims;
pub mod credentials;
pub mod role;
pub mod token;

pub use account::{
    Account, AccountCommand, AccountEvent, ChangePassword, DeactivateAccount, LoginFailed,
    RecordLoginFailure, RecordLoginSuccess, RegisterAccount, UpdateProfile, LOCK_DURATION_HOURS,
    MAX_FAILED_ATTEMPTS,
};
pub use claims::{validate_claims, AuthClaims, TokenValidationError, TOKEN_TTL_DAYS};
pub use credentials::{BcryptPasswordHasher, CredentialError, PasswordHasher, BCRYPT_COST};
pub use role::Role;
pub use token::{Hs256TokenCodec, TokenCodec, TokenError};
