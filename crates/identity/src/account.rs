//! Account aggregate for identity management (event-sourced).
//!
//! This module implements account lifecycle management including the
//! failed-login/lockout state machine.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use parceltrace_core::{Aggregate, AccountId, AggregateRoot, DomainError};
use parceltrace_events::Event;

use crate::Role;

/// Consecutive failed credential checks that trigger a lock.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

/// How long a lock lasts once triggered.
pub const LOCK_DURATION_HOURS: i64 = 2;

// ─────────────────────────────────────────────────────────────────────────────
// Account Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// Account aggregate.
///
/// # Invariants
/// - Email and phone are normalized at registration (email lowercased).
/// - Failed-login counter and lock state are mutated only via
///   `RecordLoginFailure` / `RecordLoginSuccess`.
/// - Accounts are never deleted; deactivation is a soft flag.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub version: u64,
    pub created: bool,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            id: AccountId::new(),
            name: String::new(),
            email: String::new(),
            phone: String::new(),
            password_hash: String::new(),
            role: Role::User,
            active: true,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            version: 0,
            created: false,
        }
    }
}

impl Account {
    pub fn empty(id: AccountId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Whether the account is locked as of `now`.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        matches!(self.locked_until, Some(until) if until > now)
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if !self.active {
            return Err(DomainError::invariant("account is deactivated"));
        }
        Ok(())
    }
}

impl AggregateRoot for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Command to register a new account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAccount {
    pub account_id: AccountId,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// Already hashed; raw secrets never enter the domain layer.
    pub password_hash: String,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

/// Command to update profile fields (name/phone).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub account_id: AccountId,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command to replace the credential hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePassword {
    pub account_id: AccountId,
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command to record a failed credential check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordLoginFailure {
    pub account_id: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Command to record a successful credential check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordLoginSuccess {
    pub account_id: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Command to soft-deactivate an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeactivateAccount {
    pub account_id: AccountId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// All account commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AccountCommand {
    Register(RegisterAccount),
    UpdateProfile(UpdateProfile),
    ChangePassword(ChangePassword),
    RecordLoginFailure(RecordLoginFailure),
    RecordLoginSuccess(RecordLoginSuccess),
    Deactivate(DeactivateAccount),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Event emitted when an account is registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRegistered {
    pub account_id: AccountId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

/// Event emitted when profile fields change (carries resolved values).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdated {
    pub account_id: AccountId,
    pub name: String,
    pub phone: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event emitted when the credential hash is replaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordChanged {
    pub account_id: AccountId,
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event emitted when a credential check fails.
///
/// Carries the post-increment counter and the resulting lock expiry so that
/// replaying the stream reproduces the lock state exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginFailed {
    pub account_id: AccountId,
    pub attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event emitted when a credential check succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginSucceeded {
    pub account_id: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Event emitted when an account is deactivated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDeactivated {
    pub account_id: AccountId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// All account events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AccountEvent {
    Registered(AccountRegistered),
    ProfileUpdated(ProfileUpdated),
    PasswordChanged(PasswordChanged),
    LoginFailed(LoginFailed),
    LoginSucceeded(LoginSucceeded),
    Deactivated(AccountDeactivated),
}

impl Event for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::Registered(_) => "identity.account.registered",
            AccountEvent::ProfileUpdated(_) => "identity.account.profile_updated",
            AccountEvent::PasswordChanged(_) => "identity.account.password_changed",
            AccountEvent::LoginFailed(_) => "identity.account.login_failed",
            AccountEvent::LoginSucceeded(_) => "identity.account.login_succeeded",
            AccountEvent::Deactivated(_) => "identity.account.deactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AccountEvent::Registered(e) => e.occurred_at,
            AccountEvent::ProfileUpdated(e) => e.occurred_at,
            AccountEvent::PasswordChanged(e) => e.occurred_at,
            AccountEvent::LoginFailed(e) => e.occurred_at,
            AccountEvent::LoginSucceeded(e) => e.occurred_at,
            AccountEvent::Deactivated(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Account {
    type Command = AccountCommand;
    type Event = AccountEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AccountEvent::Registered(e) => self.apply_registered(e),
            AccountEvent::ProfileUpdated(e) => self.apply_profile_updated(e),
            AccountEvent::PasswordChanged(e) => self.apply_password_changed(e),
            AccountEvent::LoginFailed(e) => self.apply_login_failed(e),
            AccountEvent::LoginSucceeded(e) => self.apply_login_succeeded(e),
            AccountEvent::Deactivated(e) => self.apply_deactivated(e),
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AccountCommand::Register(cmd) => self.handle_register(cmd),
            AccountCommand::UpdateProfile(cmd) => self.handle_update_profile(cmd),
            AccountCommand::ChangePassword(cmd) => self.handle_change_password(cmd),
            AccountCommand::RecordLoginFailure(cmd) => self.handle_record_login_failure(cmd),
            AccountCommand::RecordLoginSuccess(cmd) => self.handle_record_login_success(cmd),
            AccountCommand::Deactivate(cmd) => self.handle_deactivate(cmd),
        }
    }
}

impl Account {
    // ─────────────────────────────────────────────────────────────────────────
    // Command Handlers
    // ─────────────────────────────────────────────────────────────────────────

    fn handle_register(&self, cmd: &RegisterAccount) -> Result<Vec<AccountEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("account already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.email.trim().is_empty() || !cmd.email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }
        if cmd.phone.trim().is_empty() {
            return Err(DomainError::validation("phone cannot be empty"));
        }
        if cmd.password_hash.is_empty() {
            return Err(DomainError::validation("credential hash cannot be empty"));
        }

        Ok(vec![AccountEvent::Registered(AccountRegistered {
            account_id: cmd.account_id,
            name: cmd.name.trim().to_string(),
            email: cmd.email.trim().to_lowercase(),
            phone: cmd.phone.trim().to_string(),
            password_hash: cmd.password_hash.clone(),
            role: cmd.role,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_profile(&self, cmd: &UpdateProfile) -> Result<Vec<AccountEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        self.ensure_active()?;

        let name = match &cmd.name {
            Some(n) if n.trim().is_empty() => {
                return Err(DomainError::validation("name cannot be empty"));
            }
            Some(n) => n.trim().to_string(),
            None => self.name.clone(),
        };
        let phone = match &cmd.phone {
            Some(p) if p.trim().is_empty() => {
                return Err(DomainError::validation("phone cannot be empty"));
            }
            Some(p) => p.trim().to_string(),
            None => self.phone.clone(),
        };

        if name == self.name && phone == self.phone {
            return Ok(vec![]);
        }

        Ok(vec![AccountEvent::ProfileUpdated(ProfileUpdated {
            account_id: cmd.account_id,
            name,
            phone,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_password(
        &self,
        cmd: &ChangePassword,
    ) -> Result<Vec<AccountEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        self.ensure_active()?;

        if cmd.password_hash.is_empty() {
            return Err(DomainError::validation("credential hash cannot be empty"));
        }

        Ok(vec![AccountEvent::PasswordChanged(PasswordChanged {
            account_id: cmd.account_id,
            password_hash: cmd.password_hash.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Failed-login accounting.
    ///
    /// - If an existing lock has already expired, the counter resets to 1 and
    ///   the lock clears.
    /// - Otherwise the counter increments; reaching [`MAX_FAILED_ATTEMPTS`]
    ///   sets the lock to `occurred_at + 2h`.
    fn handle_record_login_failure(
        &self,
        cmd: &RecordLoginFailure,
    ) -> Result<Vec<AccountEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        self.ensure_active()?;

        let (attempts, locked_until) = match self.locked_until {
            Some(until) if until <= cmd.occurred_at => (1, None),
            _ => {
                let attempts = self.failed_login_attempts + 1;
                let locked_until = if attempts >= MAX_FAILED_ATTEMPTS {
                    Some(
                        self.locked_until
                            .unwrap_or(cmd.occurred_at + Duration::hours(LOCK_DURATION_HOURS)),
                    )
                } else {
                    self.locked_until
                };
                (attempts, locked_until)
            }
        };

        Ok(vec![AccountEvent::LoginFailed(LoginFailed {
            account_id: cmd.account_id,
            attempts,
            locked_until,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_login_success(
        &self,
        cmd: &RecordLoginSuccess,
    ) -> Result<Vec<AccountEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        self.ensure_active()?;

        Ok(vec![AccountEvent::LoginSucceeded(LoginSucceeded {
            account_id: cmd.account_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &DeactivateAccount) -> Result<Vec<AccountEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        if !self.active {
            return Err(DomainError::invariant("account already deactivated"));
        }

        Ok(vec![AccountEvent::Deactivated(AccountDeactivated {
            account_id: cmd.account_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event Appliers
    // ─────────────────────────────────────────────────────────────────────────

    fn apply_registered(&mut self, e: &AccountRegistered) {
        self.id = e.account_id;
        self.name = e.name.clone();
        self.email = e.email.clone();
        self.phone = e.phone.clone();
        self.password_hash = e.password_hash.clone();
        self.role = e.role;
        self.active = true;
        self.failed_login_attempts = 0;
        self.locked_until = None;
        self.last_login_at = None;
        self.created = true;
    }

    fn apply_profile_updated(&mut self, e: &ProfileUpdated) {
        self.name = e.name.clone();
        self.phone = e.phone.clone();
    }

    fn apply_password_changed(&mut self, e: &PasswordChanged) {
        self.password_hash = e.password_hash.clone();
    }

    fn apply_login_failed(&mut self, e: &LoginFailed) {
        self.failed_login_attempts = e.attempts;
        self.locked_until = e.locked_until;
    }

    fn apply_login_succeeded(&mut self, e: &LoginSucceeded) {
        self.failed_login_attempts = 0;
        self.locked_until = None;
        self.last_login_at = Some(e.occurred_at);
    }

    fn apply_deactivated(&mut self, _e: &AccountDeactivated) {
        self.active = false;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn registered_account(id: AccountId) -> Account {
        let mut account = Account::empty(id);
        let cmd = AccountCommand::Register(RegisterAccount {
            account_id: id,
            name: "Asha Verma".to_string(),
            email: "Asha@Example.com".to_string(),
            phone: "+91-9876543210".to_string(),
            password_hash: "$2b$12$abcdefghijklmnopqrstuv".to_string(),
            role: Role::User,
            occurred_at: now(),
        });
        for event in account.handle(&cmd).unwrap() {
            account.apply(&event);
        }
        account
    }

    fn fail_login(account: &mut Account, at: DateTime<Utc>) {
        let cmd = AccountCommand::RecordLoginFailure(RecordLoginFailure {
            account_id: account.id,
            occurred_at: at,
        });
        for event in account.handle(&cmd).unwrap() {
            account.apply(&event);
        }
    }

    #[test]
    fn register_normalizes_email() {
        let account = registered_account(AccountId::new());
        assert_eq!(account.email, "asha@example.com");
        assert!(account.created);
        assert!(account.active);
        assert_eq!(account.failed_login_attempts, 0);
    }

    #[test]
    fn register_invalid_email_rejected() {
        let id = AccountId::new();
        let account = Account::empty(id);
        let cmd = AccountCommand::Register(RegisterAccount {
            account_id: id,
            name: "Asha".to_string(),
            email: "not-an-email".to_string(),
            phone: "123".to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
            occurred_at: now(),
        });
        assert!(account.handle(&cmd).is_err());
    }

    #[test]
    fn three_failures_leave_account_unlocked() {
        let mut account = registered_account(AccountId::new());
        let t = now();
        for i in 0..3 {
            fail_login(&mut account, t + Duration::seconds(i));
        }
        assert_eq!(account.failed_login_attempts, 3);
        assert!(account.locked_until.is_none());
    }

    #[test]
    fn fifth_failure_locks_for_two_hours() {
        let mut account = registered_account(AccountId::new());
        let t = now();
        for i in 0..5 {
            fail_login(&mut account, t + Duration::seconds(i));
        }
        assert_eq!(account.failed_login_attempts, 5);
        let locked_until = account.locked_until.expect("account should be locked");
        assert_eq!(
            locked_until,
            t + Duration::seconds(4) + Duration::hours(LOCK_DURATION_HOURS)
        );
        assert!(account.is_locked(t + Duration::minutes(30)));
        assert!(!account.is_locked(locked_until));
    }

    #[test]
    fn failure_after_lock_expiry_resets_counter() {
        let mut account = registered_account(AccountId::new());
        let t = now();
        for i in 0..5 {
            fail_login(&mut account, t + Duration::seconds(i));
        }

        // Well past the 2h lock window: the next failure starts a fresh streak.
        fail_login(&mut account, t + Duration::hours(3));
        assert_eq!(account.failed_login_attempts, 1);
        assert!(account.locked_until.is_none());
    }

    #[test]
    fn success_resets_counter_and_stamps_last_login() {
        let mut account = registered_account(AccountId::new());
        let t = now();
        for i in 0..3 {
            fail_login(&mut account, t + Duration::seconds(i));
        }

        let login_at = t + Duration::seconds(10);
        let cmd = AccountCommand::RecordLoginSuccess(RecordLoginSuccess {
            account_id: account.id,
            occurred_at: login_at,
        });
        for event in account.handle(&cmd).unwrap() {
            account.apply(&event);
        }

        assert_eq!(account.failed_login_attempts, 0);
        assert!(account.locked_until.is_none());
        assert_eq!(account.last_login_at, Some(login_at));
    }

    #[test]
    fn change_password_replaces_hash() {
        let mut account = registered_account(AccountId::new());
        let cmd = AccountCommand::ChangePassword(ChangePassword {
            account_id: account.id,
            password_hash: "$2b$12$newhash".to_string(),
            occurred_at: now(),
        });
        for event in account.handle(&cmd).unwrap() {
            account.apply(&event);
        }
        assert_eq!(account.password_hash, "$2b$12$newhash");
    }

    #[test]
    fn update_profile_without_changes_is_a_noop() {
        let account = registered_account(AccountId::new());
        let cmd = AccountCommand::UpdateProfile(UpdateProfile {
            account_id: account.id,
            name: None,
            phone: None,
            occurred_at: now(),
        });
        assert!(account.handle(&cmd).unwrap().is_empty());
    }

    #[test]
    fn deactivated_account_rejects_profile_changes() {
        let mut account = registered_account(AccountId::new());
        let cmd = AccountCommand::Deactivate(DeactivateAccount {
            account_id: account.id,
            reason: "requested by owner".to_string(),
            occurred_at: now(),
        });
        for event in account.handle(&cmd).unwrap() {
            account.apply(&event);
        }
        assert!(!account.active);

        let cmd = AccountCommand::UpdateProfile(UpdateProfile {
            account_id: account.id,
            name: Some("New Name".to_string()),
            phone: None,
            occurred_at: now(),
        });
        assert!(account.handle(&cmd).is_err());
    }
}
