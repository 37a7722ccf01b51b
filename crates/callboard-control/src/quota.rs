//! Role-scoped resource quotas.
//!
//! ```text
//!   role        │ agents    │ batch records │ delete agents
//!   ────────────┼───────────┼───────────────┼──────────────
//!   admin       │ unlimited │ unlimited     │ yes
//!   subscriber  │ unlimited │ 1000          │ no
//!   user        │ 2         │ 100           │ no
//!   guest       │ 1         │ 10            │ no
//! ```
//!
//! Counts are taken live by the caller. Checks are not atomic with the creation
//! that follows them, so concurrent requests can overshoot a limit.

use std::fmt;

use callboard_core::Role;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// An upper bound on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// No bound.
    Unlimited,
    /// At most this many.
    AtMost(u32),
}

impl Limit {
    /// Whether holding `count` stays within the limit.
    #[must_use]
    pub fn allows(self, count: usize) -> bool {
        match self {
            Self::Unlimited => true,
            Self::AtMost(max) => u32::try_from(count).is_ok_and(|count| count <= max),
        }
    }

    /// The bound, if any.
    #[must_use]
    pub const fn max(self) -> Option<u32> {
        match self {
            Self::Unlimited => None,
            Self::AtMost(max) => Some(max),
        }
    }
}

// Serialized as a number, or null when unlimited.
impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.max().serialize(serializer)
    }
}

/// The limits attached to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleLimits {
    /// Maximum number of agents a user may own.
    pub max_agents: Limit,
    /// Maximum number of records in one batch.
    pub max_batch_records: Limit,
    /// Whether the role may delete agents.
    pub can_delete_agents: bool,
}

/// Limits for `role`.
#[must_use]
pub const fn limits_for(role: Role) -> RoleLimits {
    match role {
        Role::Admin => RoleLimits {
            max_agents: Limit::Unlimited,
            max_batch_records: Limit::Unlimited,
            can_delete_agents: true,
        },
        Role::Subscriber => RoleLimits {
            max_agents: Limit::Unlimited,
            max_batch_records: Limit::AtMost(1000),
            can_delete_agents: false,
        },
        Role::User => RoleLimits {
            max_agents: Limit::AtMost(2),
            max_batch_records: Limit::AtMost(100),
            can_delete_agents: false,
        },
        Role::Guest => RoleLimits {
            max_agents: Limit::AtMost(1),
            max_batch_records: Limit::AtMost(10),
            can_delete_agents: false,
        },
    }
}

/// The resource a quota applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Agents owned by one user.
    Agents,
    /// Records in one batch.
    BatchRecords,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agents => f.write_str("agent"),
            Self::BatchRecords => f.write_str("batch record"),
        }
    }
}

/// A creation was refused because it would exceed a role limit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{resource} limit for role {role} is {limit}, attempted {attempted}")]
pub struct QuotaExceeded {
    /// The limited resource.
    pub resource: Resource,
    /// The caller's role.
    pub role: Role,
    /// The limit in force.
    pub limit: u32,
    /// The count the creation would have reached.
    pub attempted: usize,
}

/// Check that a user holding `current` agents may create another.
///
/// # Errors
///
/// Returns `QuotaExceeded` iff `current >= max_agents`.
pub fn check_create_agent(role: Role, current: usize) -> Result<(), QuotaExceeded> {
    let Limit::AtMost(limit) = limits_for(role).max_agents else {
        return Ok(());
    };
    let attempted = current.saturating_add(1);
    if Limit::AtMost(limit).allows(attempted) {
        return Ok(());
    }
    Err(QuotaExceeded {
        resource: Resource::Agents,
        role,
        limit,
        attempted,
    })
}

/// Check that a batch of `records` records fits the role's batch size.
///
/// # Errors
///
/// Returns `QuotaExceeded` iff `records > max_batch_records`.
pub fn check_create_batch(role: Role, records: usize) -> Result<(), QuotaExceeded> {
    let Limit::AtMost(limit) = limits_for(role).max_batch_records else {
        return Ok(());
    };
    if Limit::AtMost(limit).allows(records) {
        return Ok(());
    }
    Err(QuotaExceeded {
        resource: Resource::BatchRecords,
        role,
        limit,
        attempted: records,
    })
}
