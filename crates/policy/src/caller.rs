//! Caller identity as resolved by the transport layer.

use parceltrace_core::AccountId;
use parceltrace_identity::Role;

/// Who is asking.
///
/// The transport layer resolves a bearer token (or its absence) into this
/// before any shipment operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// No token presented.
    Anonymous,
    /// Token resolved to an account.
    Account {
        account_id: AccountId,
        role: Role,
        /// Registered email, used for the sender/recipient association rule.
        email: String,
    },
}

impl Caller {
    pub fn account(account_id: AccountId, role: Role, email: impl Into<String>) -> Self {
        Caller::Account {
            account_id,
            role,
            email: email.into(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Caller::Anonymous)
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Caller::Anonymous => None,
            Caller::Account { role, .. } => Some(*role),
        }
    }

    pub fn account_id(&self) -> Option<AccountId> {
        match self {
            Caller::Anonymous => None,
            Caller::Account { account_id, .. } => Some(*account_id),
        }
    }

    /// Agents and admins.
    pub fn is_operational(&self) -> bool {
        self.role().is_some_and(|r| r.is_operational())
    }
}
