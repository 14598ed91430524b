//! Sender/recipient parties and postal addresses.

use serde::{Deserialize, Serialize};

use parceltrace_core::{DomainError, DomainResult, ValueObject};

/// Postal address of a party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl Address {
    /// "City, State" rendering used for synthetic tracking-event locations.
    pub fn city_state(&self) -> String {
        format!("{}, {}", self.city, self.state)
    }
}

impl ValueObject for Address {}

/// A shipment party (sender or recipient): name, contact and address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Party {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Address,
}

impl Party {
    /// Basic shape validation; `label` names the party in error messages
    /// ("sender" / "recipient").
    pub fn validate(&self, label: &str) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "{label} name cannot be empty"
            )));
        }
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(DomainError::validation(format!(
                "{label} email is invalid"
            )));
        }
        if self.address.city.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "{label} address requires a city"
            )));
        }
        Ok(())
    }

    /// Case-insensitive email comparison (used for ownership association).
    pub fn email_matches(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email.trim())
    }
}

impl ValueObject for Party {}

#[cfg(test)]
mod tests {
    use super::*;

    fn party() -> Party {
        Party {
            name: "Asha Verma".to_string(),
            email: "asha@example.com".to_string(),
            phone: "+91-9876543210".to_string(),
            address: Address {
                street: "14 MG Road".to_string(),
                city: "Mumbai".to_string(),
                state: "MH".to_string(),
                postal_code: "400001".to_string(),
                country: "IN".to_string(),
            },
        }
    }

    #[test]
    fn valid_party_passes() {
        assert!(party().validate("sender").is_ok());
    }

    #[test]
    fn missing_city_is_rejected() {
        let mut p = party();
        p.address.city = " ".to_string();
        assert!(p.validate("sender").is_err());
    }

    #[test]
    fn email_match_is_case_insensitive() {
        assert!(party().email_matches("ASHA@Example.COM"));
        assert!(!party().email_matches("other@example.com"));
    }

    #[test]
    fn city_state_rendering() {
        assert_eq!(party().address.city_state(), "Mumbai, MH");
    }
}
