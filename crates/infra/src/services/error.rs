use chrono::{DateTime, Utc};
use thiserror::Error;

use parceltrace_core::DomainError;

use crate::command_dispatcher::DispatchError;

/// Error surface of the application services.
///
/// Authentication failures are deliberately coarse: a missing account and a
/// wrong secret are indistinguishable. A still-locked account is distinct.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account is locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    #[error("account is deactivated")]
    AccountInactive,

    #[error("credential processing failed: {0}")]
    Credential(String),

    #[error("command dispatch failed: {0:?}")]
    Dispatch(DispatchError),
}

impl From<DispatchError> for ServiceError {
    fn from(value: DispatchError) -> Self {
        ServiceError::Dispatch(value)
    }
}

impl From<parceltrace_identity::CredentialError> for ServiceError {
    fn from(value: parceltrace_identity::CredentialError) -> Self {
        ServiceError::Credential(value.to_string())
    }
}
