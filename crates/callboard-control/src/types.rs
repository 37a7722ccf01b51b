//! Request and response types for control plane operations.

use callboard_core::{AgentId, DatasetSummary, Role, UserId};
use callboard_store::{Agent, AgentVariable, Batch, Call, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::quota::{limits_for, Limit, RoleLimits};

/// The authenticated principal behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// The caller's user ID.
    pub user_id: UserId,
    /// The caller's role, read when the session was resolved.
    pub role: Role,
}

impl Caller {
    /// Whether the caller is an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The caller's limits.
    #[must_use]
    pub const fn limits(&self) -> RoleLimits {
        limits_for(self.role)
    }
}

/// A freshly opened session. The token is only ever returned here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSession {
    /// Opaque bearer token.
    pub token: String,
    /// When the session stops being valid.
    pub expires_at: DateTime<Utc>,
}

/// The result of a successful login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    /// The new session.
    #[serde(flatten)]
    pub session: IssuedSession,
    /// The logged-in user, created on first login.
    pub user: User,
}

/// A user together with the limits of their role.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// The user.
    #[serde(flatten)]
    pub user: User,
    /// Limits of the user's role.
    pub limits: RoleLimits,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        let limits = limits_for(user.role);
        Self { user, limits }
    }
}

/// Channel subscription state and bonus eligibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatus {
    /// The channel that grants the bonus.
    pub channel: String,
    /// Whether the user is subscribed.
    pub is_member: bool,
    /// Whether the bonus can be claimed right now.
    pub can_claim: bool,
}

/// A batch with its calls.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDetail {
    /// The batch.
    #[serde(flatten)]
    pub batch: Batch,
    /// Its calls, newest first.
    pub calls: Vec<Call>,
}

/// Request for an advisory dataset check.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetCheck {
    /// Agent whose variables the dataset must carry. None checks only the shape.
    #[serde(default)]
    pub agent_id: Option<AgentId>,
    /// Raw dataset.
    pub dataset: String,
}

/// Result of an advisory dataset check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReport {
    /// Shape of the dataset.
    #[serde(flatten)]
    pub summary: DatasetSummary,
    /// The caller's batch size limit.
    pub max_records: Limit,
    /// Whether the dataset fits that limit.
    pub within_limit: bool,
}

/// Request to check voice platform credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCheck {
    /// Voice platform API key.
    pub voice_api_key: String,
    /// Agent identifier on the voice platform.
    pub voice_agent_id: String,
    /// Agent to store the discovered variables on. None only checks.
    #[serde(default)]
    pub agent_id: Option<AgentId>,
}

/// Result of a successful voice platform check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionReport {
    /// Always true; failures are errors.
    pub success: bool,
    /// Agent name on the platform.
    pub agent_name: Option<String>,
    /// Variables the platform agent expects.
    pub variables: Vec<AgentVariable>,
    /// The updated agent, when one was named in the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<Agent>,
}

/// Request to change a user's role.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RoleChange {
    /// The new role.
    pub role: Role,
}

/// Configuration for the control plane service.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// How long a session stays valid, in days.
    pub session_ttl_days: u32,
    /// Calls granted by the channel bonus.
    pub bonus_calls: u64,
    /// Channel whose subscribers may claim the bonus.
    pub bonus_channel: String,
    /// Maximum age of a login payload, in seconds.
    pub login_max_age_seconds: i64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            session_ttl_days: 30,
            bonus_calls: 50,
            bonus_channel: "@nartautomates".to_string(),
            login_max_age_seconds: 86_400,
        }
    }
}

impl ControlConfig {
    /// Session lifetime.
    #[must_use]
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.session_ttl_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_config_defaults() {
        let config = ControlConfig::default();
        assert_eq!(config.session_ttl(), chrono::Duration::days(30));
        assert_eq!(config.bonus_calls, 50);
        assert_eq!(config.bonus_channel, "@nartautomates");
        assert_eq!(config.login_max_age_seconds, 86_400);
    }

    #[test]
    fn role_change_parses_wire_role() {
        let change: RoleChange = serde_json::from_str(r#"{"role": "subscriber"}"#).unwrap();
        assert_eq!(change.role, Role::Subscriber);
        assert!(serde_json::from_str::<RoleChange>(r#"{"role": "owner"}"#).is_err());
    }

    #[test]
    fn dataset_check_agent_is_optional() {
        let check: DatasetCheck = serde_json::from_str(r#"{"dataset": "phone\n+1"}"#).unwrap();
        assert!(check.agent_id.is_none());
        let check: DatasetCheck =
            serde_json::from_str(r#"{"agentId": 3, "dataset": "phone\n+1"}"#).unwrap();
        assert_eq!(check.agent_id, Some(AgentId::new(3)));
    }

    #[test]
    fn caller_limits_follow_role() {
        let caller = Caller {
            user_id: UserId::new(1),
            role: Role::Guest,
        };
        assert!(!caller.is_admin());
        assert_eq!(caller.limits().max_agents, Limit::AtMost(1));
    }
}
