//! Identity service: registration, authentication and account maintenance.
//!
//! Raw secrets stop here: they are hashed/verified at this boundary and only
//! opaque hashes flow into the domain layer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use parceltrace_core::{AccountId, DomainError};
use parceltrace_events::{EventBus, EventEnvelope};
use parceltrace_identity::{
    Account, AccountCommand, ChangePassword, PasswordHasher, RecordLoginFailure,
    RecordLoginSuccess, RegisterAccount, Role, UpdateProfile,
};

use crate::command_dispatcher::CommandDispatcher;
use crate::event_store::EventStore;
use crate::projections::accounts::{AccountDirectory, ACCOUNT_AGGREGATE_TYPE};
use crate::read_model::ReadStore;
use crate::services::ServiceError;

/// Registration input (raw secret, hashed here).
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub role: Role,
}

pub struct IdentityService<ES, B, RS>
where
    RS: ReadStore<AccountId, Account>,
{
    dispatcher: Arc<CommandDispatcher<ES, B>>,
    accounts: Arc<AccountDirectory<RS>>,
    hasher: Arc<dyn PasswordHasher>,
}

impl<ES, B, RS> IdentityService<ES, B, RS>
where
    ES: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    RS: ReadStore<AccountId, Account>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<ES, B>>,
        accounts: Arc<AccountDirectory<RS>>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            dispatcher,
            accounts,
            hasher,
        }
    }

    pub fn get(&self, account_id: AccountId) -> Option<Account> {
        self.accounts.get(&account_id)
    }

    /// Register a new account. Email and phone are globally unique; the
    /// conflict error names the offending field.
    pub fn register(
        &self,
        input: NewAccount,
        now: DateTime<Utc>,
    ) -> Result<AccountId, ServiceError> {
        if self.accounts.email_exists(&input.email) {
            return Err(DomainError::conflict("email already registered").into());
        }
        if self.accounts.phone_exists(&input.phone) {
            return Err(DomainError::conflict("phone already registered").into());
        }
        if input.password.len() < 8 {
            return Err(DomainError::validation("password must be at least 8 characters").into());
        }

        let password_hash = self.hasher.hash(&input.password)?;
        let account_id = AccountId::new();

        self.dispatcher.dispatch::<Account>(
            account_id.into(),
            ACCOUNT_AGGREGATE_TYPE,
            AccountCommand::Register(RegisterAccount {
                account_id,
                name: input.name,
                email: input.email,
                phone: input.phone,
                password_hash,
                role: input.role,
                occurred_at: now,
            }),
            |id| Account::empty(id.into()),
        )?;

        Ok(account_id)
    }

    /// Credential check with lockout accounting.
    ///
    /// An absent account and a wrong secret are indistinguishable to the
    /// caller; a still-locked account is reported distinctly and skips the
    /// credential check entirely.
    pub fn authenticate(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<Account, ServiceError> {
        let Some(account) = self.accounts.find_by_email(email) else {
            return Err(ServiceError::InvalidCredentials);
        };

        if !account.active {
            return Err(ServiceError::AccountInactive);
        }
        if let Some(until) = account.locked_until {
            if until > now {
                return Err(ServiceError::AccountLocked { until });
            }
        }

        if !self.hasher.verify(password, &account.password_hash)? {
            // Failure accounting goes through the authoritative stream even
            // when the read model lags.
            if let Err(e) = self.dispatcher.dispatch::<Account>(
                account.id.into(),
                ACCOUNT_AGGREGATE_TYPE,
                AccountCommand::RecordLoginFailure(RecordLoginFailure {
                    account_id: account.id,
                    occurred_at: now,
                }),
                |id| Account::empty(id.into()),
            ) {
                tracing::warn!("failed to record login failure: {e:?}");
            }
            return Err(ServiceError::InvalidCredentials);
        }

        self.dispatcher.dispatch::<Account>(
            account.id.into(),
            ACCOUNT_AGGREGATE_TYPE,
            AccountCommand::RecordLoginSuccess(RecordLoginSuccess {
                account_id: account.id,
                occurred_at: now,
            }),
            |id| Account::empty(id.into()),
        )?;

        Ok(account)
    }

    /// Change the credential; requires the current secret.
    pub fn change_password(
        &self,
        account_id: AccountId,
        current_password: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let account = self
            .accounts
            .get(&account_id)
            .ok_or(DomainError::NotFound)?;

        if !self.hasher.verify(current_password, &account.password_hash)? {
            return Err(ServiceError::InvalidCredentials);
        }
        if new_password.len() < 8 {
            return Err(DomainError::validation("password must be at least 8 characters").into());
        }

        let password_hash = self.hasher.hash(new_password)?;
        self.dispatcher.dispatch::<Account>(
            account_id.into(),
            ACCOUNT_AGGREGATE_TYPE,
            AccountCommand::ChangePassword(ChangePassword {
                account_id,
                password_hash,
                occurred_at: now,
            }),
            |id| Account::empty(id.into()),
        )?;

        Ok(())
    }

    pub fn update_profile(
        &self,
        account_id: AccountId,
        name: Option<String>,
        phone: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let account = self
            .accounts
            .get(&account_id)
            .ok_or(DomainError::NotFound)?;

        if let Some(phone) = &phone {
            if phone.trim() != account.phone && self.accounts.phone_exists(phone) {
                return Err(DomainError::conflict("phone already registered").into());
            }
        }

        self.dispatcher.dispatch::<Account>(
            account_id.into(),
            ACCOUNT_AGGREGATE_TYPE,
            AccountCommand::UpdateProfile(UpdateProfile {
                account_id,
                name,
                phone,
                occurred_at: now,
            }),
            |id| Account::empty(id.into()),
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use parceltrace_events::{InMemoryEventBus, Subscription};
    use parceltrace_identity::BcryptPasswordHasher;
    use parceltrace_identity::MAX_FAILED_ATTEMPTS;

    use crate::event_store::InMemoryEventStore;
    use crate::read_model::InMemoryReadStore;

    type Store = Arc<InMemoryEventStore>;
    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
    type Accounts = AccountDirectory<Arc<InMemoryReadStore<AccountId, Account>>>;

    struct Harness {
        service: IdentityService<Store, Bus, Arc<InMemoryReadStore<AccountId, Account>>>,
        accounts: Arc<Accounts>,
        sub: Subscription<EventEnvelope<JsonValue>>,
    }

    impl Harness {
        fn new() -> Self {
            let store: Store = Arc::new(InMemoryEventStore::new());
            let bus: Bus = Arc::new(InMemoryEventBus::new());
            let sub = bus.subscribe();
            let dispatcher = Arc::new(CommandDispatcher::new(store, bus));
            let accounts = Arc::new(AccountDirectory::new(Arc::new(InMemoryReadStore::new())));
            let service = IdentityService::new(
                dispatcher,
                accounts.clone(),
                Arc::new(BcryptPasswordHasher::with_cost(4)),
            );
            Self {
                service,
                accounts,
                sub,
            }
        }

        /// Apply everything published so far to the read model (the API does
        /// this on a background subscriber).
        fn drain(&self) {
            while let Ok(env) = self.sub.try_recv() {
                self.accounts.apply_envelope(&env).unwrap();
            }
        }
    }

    fn new_account(email: &str, phone: &str) -> NewAccount {
        NewAccount {
            name: "Asha Verma".to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            password: "correct-horse".to_string(),
            role: Role::User,
        }
    }

    #[test]
    fn register_then_authenticate() {
        let h = Harness::new();
        let now = Utc::now();

        let id = h
            .service
            .register(new_account("asha@example.com", "+91-1"), now)
            .unwrap();
        h.drain();

        let account = h
            .service
            .authenticate("ASHA@example.com", "correct-horse", now)
            .unwrap();
        assert_eq!(account.id, id);
    }

    #[test]
    fn duplicate_email_conflicts_naming_the_field() {
        let h = Harness::new();
        let now = Utc::now();

        h.service
            .register(new_account("asha@example.com", "+91-1"), now)
            .unwrap();
        h.drain();

        let err = h
            .service
            .register(new_account("asha@example.com", "+91-2"), now)
            .unwrap_err();
        match err {
            ServiceError::Domain(DomainError::Conflict(msg)) => assert!(msg.contains("email")),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn unknown_account_and_wrong_secret_are_indistinguishable() {
        let h = Harness::new();
        let now = Utc::now();

        h.service
            .register(new_account("asha@example.com", "+91-1"), now)
            .unwrap();
        h.drain();

        let absent = h
            .service
            .authenticate("nobody@example.com", "whatever-pass", now)
            .unwrap_err();
        let wrong = h
            .service
            .authenticate("asha@example.com", "wrong-password", now)
            .unwrap_err();

        assert_eq!(absent.to_string(), wrong.to_string());
    }

    #[test]
    fn five_failures_lock_even_against_correct_credentials() {
        let h = Harness::new();
        let now = Utc::now();

        h.service
            .register(new_account("asha@example.com", "+91-1"), now)
            .unwrap();
        h.drain();

        for i in 0..MAX_FAILED_ATTEMPTS {
            let err = h
                .service
                .authenticate(
                    "asha@example.com",
                    "wrong-password",
                    now + Duration::seconds(i as i64),
                )
                .unwrap_err();
            assert!(matches!(err, ServiceError::InvalidCredentials));
            h.drain();
        }

        // Correct credentials are rejected with the distinct locked error.
        let err = h
            .service
            .authenticate(
                "asha@example.com",
                "correct-horse",
                now + Duration::minutes(5),
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::AccountLocked { .. }));

        // After the 2h window, the lock expires and login resets the counter.
        let later = now + Duration::hours(3);
        let account = h
            .service
            .authenticate("asha@example.com", "correct-horse", later)
            .unwrap();
        h.drain();
        let refreshed = h.service.get(account.id).unwrap();
        assert_eq!(refreshed.failed_login_attempts, 0);
        assert_eq!(refreshed.last_login_at, Some(later));
    }

    #[test]
    fn three_failures_leave_counter_at_three_unlocked() {
        let h = Harness::new();
        let now = Utc::now();

        let id = h
            .service
            .register(new_account("asha@example.com", "+91-1"), now)
            .unwrap();
        h.drain();

        for _ in 0..3 {
            let _ = h
                .service
                .authenticate("asha@example.com", "wrong-password", now);
            h.drain();
        }

        let account = h.service.get(id).unwrap();
        assert_eq!(account.failed_login_attempts, 3);
        assert!(account.locked_until.is_none());
    }

    #[test]
    fn change_password_requires_current_secret() {
        let h = Harness::new();
        let now = Utc::now();

        let id = h
            .service
            .register(new_account("asha@example.com", "+91-1"), now)
            .unwrap();
        h.drain();

        let err = h
            .service
            .change_password(id, "wrong-password", "next-password", now)
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));

        h.service
            .change_password(id, "correct-horse", "next-password", now)
            .unwrap();
        h.drain();

        h.service
            .authenticate("asha@example.com", "next-password", now)
            .unwrap();
    }
}
