//! Domain entities and the inputs that create or change them.
//!
//! Entities serialize as camelCase JSON for the HTTP API. Their mapping to and from
//! stored fields lives in [`convert`](crate::convert).

use std::fmt;

use callboard_core::{AgentId, BatchId, CallId, Role, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user account, created on first login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Virtual ID.
    pub id: UserId,
    /// External (Telegram) identity. Immutable and unique.
    pub telegram_id: String,
    /// Display name.
    pub username: Option<String>,
    /// Role, which drives quotas.
    pub role: Role,
    /// Maximum total call attempts.
    pub usage: u64,
    /// Whether the one-time channel bonus was granted.
    pub channel_bonus_received: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// The telephony provider an agent is wired to. Only one is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Voximplant.
    #[default]
    Voximplant,
}

impl Provider {
    /// The stored/wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Voximplant => "voximplant",
        }
    }
}

/// A named variable an agent expects from every dataset record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentVariable {
    /// Name, matched case-sensitively against dataset fields.
    pub name: String,
    /// Optional default or description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A voice agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Virtual ID.
    pub id: AgentId,
    /// Owner.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Voice platform API key.
    pub voice_api_key: String,
    /// Agent identifier on the voice platform.
    pub voice_agent_id: String,
    /// Outbound caller number.
    pub phone_number: Option<String>,
    /// Telephony provider.
    pub provider: Provider,
    /// Provider application identifier.
    pub application_id: Option<String>,
    /// Provider routing rule identifier.
    pub rule_id: Option<String>,
    /// Variables every dataset record must carry.
    pub variables: Option<Vec<AgentVariable>>,
    /// Generated provider integration script.
    pub integration_script: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Names of the variables a dataset must provide for this agent.
    #[must_use]
    pub fn variable_names(&self) -> Vec<&str> {
        self.variables
            .iter()
            .flatten()
            .map(|v| v.name.as_str())
            .collect()
    }
}

/// Campaign processing state, advanced only by the external worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Waiting for the worker.
    #[default]
    Pending,
    /// Calls are being placed.
    Processing,
    /// All calls placed.
    Completed,
}

impl BatchStatus {
    /// Parse the stored representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// The stored/wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A call campaign over an uploaded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    /// Virtual ID.
    pub id: BatchId,
    /// Owner.
    pub user_id: UserId,
    /// Agent placing the calls.
    pub agent_id: AgentId,
    /// Display name.
    pub name: String,
    /// Raw dataset as uploaded.
    pub dataset: String,
    /// Processing state.
    pub status: BatchStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A single call placed by the external worker. Read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    /// Virtual ID.
    pub id: CallId,
    /// Campaign the call belongs to.
    pub batch_id: Option<BatchId>,
    /// Number dialled.
    pub phone_number: String,
    /// Worker-defined status.
    pub status: String,
    /// Call identifier on the voice platform.
    pub external_call_id: Option<String>,
    /// Recording locator.
    pub recording_url: Option<String>,
    /// Transcript.
    pub transcript: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Per-user integration settings. At most one per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Virtual ID, always equal to `user_id`.
    pub id: UserId,
    /// Owner.
    pub user_id: UserId,
    /// External table API key.
    pub airtable_api_key: Option<String>,
    /// External table base.
    pub airtable_base_id: Option<String>,
    /// External table name.
    pub airtable_table_name: Option<String>,
    /// Workflow webhook URL.
    pub webhook_url: Option<String>,
    /// Telephony account.
    pub telephony_account_id: Option<String>,
    /// Telephony API key.
    pub telephony_api_key: Option<String>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// External (Telegram) identity.
    pub telegram_id: String,
    /// Display name.
    pub username: Option<String>,
}

/// Input for creating an agent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgent {
    /// Display name.
    pub name: String,
    /// Voice platform API key.
    pub voice_api_key: String,
    /// Agent identifier on the voice platform.
    pub voice_agent_id: String,
    /// Outbound caller number.
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Provider application identifier.
    #[serde(default)]
    pub application_id: Option<String>,
    /// Provider routing rule identifier.
    #[serde(default)]
    pub rule_id: Option<String>,
    /// Variables every dataset record must carry.
    #[serde(default)]
    pub variables: Option<Vec<AgentVariable>>,
    /// Generated provider integration script.
    #[serde(default)]
    pub integration_script: Option<String>,
}

/// Partial update of an agent. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentPatch {
    /// Display name.
    pub name: Option<String>,
    /// Voice platform API key.
    pub voice_api_key: Option<String>,
    /// Agent identifier on the voice platform.
    pub voice_agent_id: Option<String>,
    /// Outbound caller number. An empty string clears it.
    pub phone_number: Option<String>,
    /// Provider application identifier.
    pub application_id: Option<String>,
    /// Provider routing rule identifier.
    pub rule_id: Option<String>,
    /// Variables every dataset record must carry.
    pub variables: Option<Vec<AgentVariable>>,
    /// Generated provider integration script.
    pub integration_script: Option<String>,
}

/// Input for creating a batch. The owner is supplied separately.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBatch {
    /// Agent placing the calls.
    pub agent_id: AgentId,
    /// Display name.
    pub name: String,
    /// Raw dataset (JSON array or comma separated text).
    pub dataset: String,
}

/// Settings fields to write. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsUpdate {
    /// External table API key.
    pub airtable_api_key: Option<String>,
    /// External table base.
    pub airtable_base_id: Option<String>,
    /// External table name.
    pub airtable_table_name: Option<String>,
    /// Workflow webhook URL.
    pub webhook_url: Option<String>,
    /// Telephony account.
    pub telephony_account_id: Option<String>,
    /// Telephony API key.
    pub telephony_api_key: Option<String>,
}
