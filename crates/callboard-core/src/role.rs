//! User roles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of roles a user can hold.
///
/// Roles govern resource limits (see the quota engine in `callboard-control`)
/// and access to admin operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access, no limits.
    Admin,
    /// Paying user: unlimited agents, large batches.
    Subscriber,
    /// Regular user. New accounts start here.
    #[default]
    User,
    /// Trial access with the smallest limits.
    Guest,
}

impl Role {
    /// Every role, most privileged first.
    pub const ALL: [Self; 4] = [Self::Admin, Self::Subscriber, Self::User, Self::Guest];

    /// The role with the fewest privileges.
    pub const LEAST_PRIVILEGED: Self = Self::Guest;

    /// Parse the stored/wire representation of a role.
    ///
    /// Matching is exact; callers decide how to treat unknown values.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "subscriber" => Some(Self::Subscriber),
            "user" => Some(Self::User),
            "guest" => Some(Self::Guest),
            _ => None,
        }
    }

    /// The stored/wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Subscriber => "subscriber",
            Self::User => "user",
            Self::Guest => "guest",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_role() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn parse_is_exact() {
        assert_eq!(Role::parse("Admin"), None);
        assert_eq!(Role::parse(" user"), None);
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(
            serde_json::to_string(&Role::Subscriber).unwrap(),
            "\"subscriber\""
        );
        let role: Role = serde_json::from_str("\"guest\"").unwrap();
        assert_eq!(role, Role::Guest);
    }

    #[test]
    fn new_accounts_default_to_user() {
        assert_eq!(Role::default(), Role::User);
    }
}
