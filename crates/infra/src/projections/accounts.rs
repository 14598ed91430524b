//! Account directory: query-side view of the identity store.
//!
//! Maintains unique indexes on email (lowercased) and phone; both cover
//! active and deactivated accounts, matching the registration uniqueness
//! rule.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use parceltrace_core::{AccountId, Aggregate, AggregateId};
use parceltrace_events::EventEnvelope;
use parceltrace_identity::{Account, AccountEvent};

use crate::projections::ProjectionError;
use crate::read_model::ReadStore;

/// Aggregate type tag for account streams.
pub const ACCOUNT_AGGREGATE_TYPE: &str = "identity.account";

#[derive(Debug)]
pub struct AccountDirectory<S>
where
    S: ReadStore<AccountId, Account>,
{
    store: S,
    email_index: RwLock<HashMap<String, AccountId>>,
    phone_index: RwLock<HashMap<String, AccountId>>,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> AccountDirectory<S>
where
    S: ReadStore<AccountId, Account>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            email_index: RwLock::new(HashMap::new()),
            phone_index: RwLock::new(HashMap::new()),
            cursors: RwLock::new(HashMap::new()),
        }
    }

    fn get_cursor(&self, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => *cursors.get(&aggregate_id).unwrap_or(&0),
            Err(_) => 0,
        }
    }

    fn update_cursor(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(aggregate_id, seq);
        }
    }

    pub fn get(&self, account_id: &AccountId) -> Option<Account> {
        self.store.get(account_id)
    }

    /// Case-insensitive email lookup.
    pub fn find_by_email(&self, email: &str) -> Option<Account> {
        let key = email.trim().to_lowercase();
        let id = {
            let index = self.email_index.read().ok()?;
            *index.get(&key)?
        };
        self.store.get(&id)
    }

    pub fn email_exists(&self, email: &str) -> bool {
        let key = email.trim().to_lowercase();
        self.email_index
            .read()
            .map(|index| index.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn phone_exists(&self, phone: &str) -> bool {
        let key = phone.trim().to_string();
        self.phone_index
            .read()
            .map(|index| index.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != ACCOUNT_AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.get_cursor(aggregate_id);
        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: AccountEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let account_id = event_account_id(&ev);
        if AggregateId::from(account_id) != aggregate_id {
            return Err(ProjectionError::IdentityMismatch(
                "event account_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match &ev {
            AccountEvent::Registered(e) => {
                self.index_email(&e.email, account_id)?;
                self.index_phone(&e.phone, account_id)?;
            }
            AccountEvent::ProfileUpdated(e) => {
                if let Some(previous) = self.store.get(&account_id) {
                    if previous.phone != e.phone {
                        self.index_phone(&e.phone, account_id)?;
                        if let Ok(mut index) = self.phone_index.write() {
                            index.remove(&previous.phone);
                        }
                    }
                }
            }
            _ => {}
        }

        let mut account = self
            .store
            .get(&account_id)
            .unwrap_or_else(|| Account::empty(account_id));
        account.apply(&ev);
        self.store.upsert(account_id, account);

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }

    fn index_email(&self, email: &str, account_id: AccountId) -> Result<(), ProjectionError> {
        let key = email.trim().to_lowercase();
        let mut index = self
            .email_index
            .write()
            .map_err(|_| ProjectionError::IdentityMismatch("email index lock poisoned".to_string()))?;
        match index.get(&key) {
            Some(existing) if *existing != account_id => Err(ProjectionError::UniqueViolation(
                "email already registered".to_string(),
            )),
            _ => {
                index.insert(key, account_id);
                Ok(())
            }
        }
    }

    fn index_phone(&self, phone: &str, account_id: AccountId) -> Result<(), ProjectionError> {
        let key = phone.trim().to_string();
        let mut index = self
            .phone_index
            .write()
            .map_err(|_| ProjectionError::IdentityMismatch("phone index lock poisoned".to_string()))?;
        match index.get(&key) {
            Some(existing) if *existing != account_id => Err(ProjectionError::UniqueViolation(
                "phone already registered".to_string(),
            )),
            _ => {
                index.insert(key, account_id);
                Ok(())
            }
        }
    }
}

fn event_account_id(event: &AccountEvent) -> AccountId {
    match event {
        AccountEvent::Registered(e) => e.account_id,
        AccountEvent::ProfileUpdated(e) => e.account_id,
        AccountEvent::PasswordChanged(e) => e.account_id,
        AccountEvent::LoginFailed(e) => e.account_id,
        AccountEvent::LoginSucceeded(e) => e.account_id,
        AccountEvent::Deactivated(e) => e.account_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parceltrace_identity::{AccountCommand, RegisterAccount, Role, UpdateProfile};
    use std::sync::Arc;
    use uuid::Uuid;

    use crate::read_model::InMemoryReadStore;

    type TestDirectory = AccountDirectory<Arc<InMemoryReadStore<AccountId, Account>>>;

    fn directory() -> TestDirectory {
        AccountDirectory::new(Arc::new(InMemoryReadStore::new()))
    }

    fn register_events(id: AccountId, email: &str, phone: &str) -> Vec<AccountEvent> {
        let account = Account::empty(id);
        account
            .handle(&AccountCommand::Register(RegisterAccount {
                account_id: id,
                name: "Asha Verma".to_string(),
                email: email.to_string(),
                phone: phone.to_string(),
                password_hash: "$2b$12$hash".to_string(),
                role: Role::User,
                occurred_at: Utc::now(),
            }))
            .unwrap()
    }

    fn envelope(id: AccountId, seq: u64, event: &AccountEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            id.into(),
            ACCOUNT_AGGREGATE_TYPE,
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    #[test]
    fn registered_account_is_indexed_case_insensitively() {
        let directory = directory();
        let id = AccountId::new();
        let events = register_events(id, "Asha@Example.com", "+91-9876543210");

        directory.apply_envelope(&envelope(id, 1, &events[0])).unwrap();

        assert!(directory.email_exists("ASHA@example.COM"));
        assert!(directory.phone_exists("+91-9876543210"));
        let account = directory.find_by_email("asha@example.com").unwrap();
        assert_eq!(account.id, id);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let directory = directory();
        let a = AccountId::new();
        let b = AccountId::new();

        let events = register_events(a, "asha@example.com", "+91-1111111111");
        directory.apply_envelope(&envelope(a, 1, &events[0])).unwrap();

        let events = register_events(b, "asha@example.com", "+91-2222222222");
        let err = directory
            .apply_envelope(&envelope(b, 1, &events[0]))
            .unwrap_err();
        assert!(matches!(err, ProjectionError::UniqueViolation(_)));
    }

    #[test]
    fn phone_change_reindexes() {
        let directory = directory();
        let id = AccountId::new();

        let events = register_events(id, "asha@example.com", "+91-1111111111");
        directory.apply_envelope(&envelope(id, 1, &events[0])).unwrap();

        let mut account = Account::empty(id);
        account.apply(&events[0]);
        let events = account
            .handle(&AccountCommand::UpdateProfile(UpdateProfile {
                account_id: id,
                name: None,
                phone: Some("+91-3333333333".to_string()),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        directory.apply_envelope(&envelope(id, 2, &events[0])).unwrap();

        assert!(!directory.phone_exists("+91-1111111111"));
        assert!(directory.phone_exists("+91-3333333333"));
    }
}
