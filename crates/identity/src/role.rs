use core::str::FromStr;

use serde::{Deserialize, Serialize};

use parceltrace_core::DomainError;

/// Account role.
///
/// Roles are a closed set: access decisions key off this enum rather than
/// comparing strings at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular customer: creates shipments, sees shipments associated with them.
    #[default]
    User,
    /// Courier staff: appends tracking events, records delivery attempts.
    Agent,
    /// Operations admin: everything an agent can do, plus account management.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
            Role::Admin => "admin",
        }
    }

    /// Agents and admins share the operational capability set.
    pub fn is_operational(&self) -> bool {
        matches!(self, Role::Agent | Role::Admin)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "agent" => Ok(Role::Agent),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::validation(format!("unknown role: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        for role in [Role::User, Role::Agent, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn operational_roles() {
        assert!(!Role::User.is_operational());
        assert!(Role::Agent.is_operational());
        assert!(Role::Admin.is_operational());
    }
}
