use parceltrace_core::AccountId;
use parceltrace_identity::Role;

/// Authenticated caller context for a request.
///
/// This is immutable and must be present for all protected routes; anonymous
/// routes never see it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AuthContext {
    account_id: AccountId,
    role: Role,
}

impl AuthContext {
    pub fn new(account_id: AccountId, role: Role) -> Self {
        Self { account_id, role }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn role(&self) -> Role {
        self.role
    }
}
