//! Virtual identifier types for callboard.
//!
//! The backing record store has no integer keys of its own, so every entity is
//! addressed by a process-assigned sequential integer (a *virtual ID*). Each entity
//! kind gets its own newtype so an agent ID can never be passed where a batch ID is
//! expected.
//!
//! Virtual IDs start at 1. Zero is never assigned and is rejected by parsing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The string is not a base-10 integer.
    #[error("invalid integer identifier: {0:?}")]
    NotAnInteger(String),

    /// Zero is reserved and never assigned.
    #[error("identifier must be positive")]
    Zero,
}

macro_rules! virtual_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw virtual ID.
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Return the raw integer value.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw: u64 = s
                    .trim()
                    .parse()
                    .map_err(|_| IdError::NotAnInteger(s.to_string()))?;
                if raw == 0 {
                    return Err(IdError::Zero);
                }
                Ok(Self(raw))
            }
        }
    };
}

virtual_id! {
    /// Virtual ID of a user.
    ///
    /// Settings records share their owner's user ID.
    UserId
}

virtual_id! {
    /// Virtual ID of a voice agent.
    AgentId
}

virtual_id! {
    /// Virtual ID of a call campaign (batch).
    BatchId
}

virtual_id! {
    /// Virtual ID of a single call placed by the external worker.
    CallId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let id: AgentId = "42".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(format!("{id:?}"), "AgentId(42)");
    }

    #[test]
    fn parse_rejects_zero_and_garbage() {
        assert_eq!("0".parse::<UserId>(), Err(IdError::Zero));
        assert!(matches!(
            "abc".parse::<BatchId>(),
            Err(IdError::NotAnInteger(_))
        ));
        assert!("-3".parse::<CallId>().is_err());
    }

    #[test]
    fn serializes_as_plain_number() {
        let json = serde_json::to_string(&BatchId::new(9)).unwrap();
        assert_eq!(json, "9");

        let back: BatchId = serde_json::from_str("9").unwrap();
        assert_eq!(back, BatchId::new(9));
    }

    #[test]
    fn ordering_follows_raw_value() {
        assert!(UserId::new(2) > UserId::new(1));
    }
}
