//! Table and field names of the external record store.

/// The entity kinds persisted in the record store.
///
/// Each kind lives in its own table and gets its own virtual ID sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// `Users` table.
    User,
    /// `Agents` table.
    Agent,
    /// `Batches` table.
    Batch,
    /// `Calls` table.
    Call,
    /// `Settings` table.
    Settings,
}

impl EntityKind {
    /// Every kind, in startup-scan order.
    pub const ALL: [Self; 5] = [
        Self::User,
        Self::Agent,
        Self::Batch,
        Self::Call,
        Self::Settings,
    ];

    /// The table holding records of this kind.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::User => table::USERS,
            Self::Agent => table::AGENTS,
            Self::Batch => table::BATCHES,
            Self::Call => table::CALLS,
            Self::Settings => table::SETTINGS,
        }
    }

    /// The stored field holding the virtual ID.
    #[must_use]
    pub const fn id_field(self) -> &'static str {
        match self {
            Self::User | Self::Settings => field::USER_ID,
            Self::Agent => field::AGENT_NUMERIC_ID,
            Self::Batch => field::BATCH_ID,
            Self::Call => field::CALL_ID,
        }
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

/// Table names.
pub mod table {
    /// User accounts.
    pub const USERS: &str = "Users";
    /// Voice agents.
    pub const AGENTS: &str = "Agents";
    /// Call campaigns.
    pub const BATCHES: &str = "Batches";
    /// Individual calls, written by the external worker.
    pub const CALLS: &str = "Calls";
    /// Per-user integration settings.
    pub const SETTINGS: &str = "Settings";
}

/// Field names.
pub mod field {
    // shared
    /// Owning or own user ID.
    pub const USER_ID: &str = "userId";
    /// Creation timestamp (RFC 3339).
    pub const CREATED_AT: &str = "createdAt";
    /// Last update timestamp (RFC 3339).
    pub const UPDATED_AT: &str = "updatedAt";

    // Users
    /// External (Telegram) identity.
    pub const TELEGRAM_ID: &str = "telegramId";
    /// Display name.
    pub const USERNAME: &str = "username";
    /// Role.
    pub const ACCESS: &str = "access";
    /// Call allowance.
    pub const USAGE: &str = "usage";
    /// One-time bonus flag.
    pub const CHANNEL_BONUS_RECEIVED: &str = "channelBonusReceived";

    // Agents
    /// Virtual agent ID.
    pub const AGENT_NUMERIC_ID: &str = "agentNumericId";
    /// Agent display name, also used for batches.
    pub const NAME: &str = "name";
    /// Voice platform API key.
    pub const ELEVENLABS_API_KEY: &str = "elevenLabsApiKey";
    /// Voice platform agent identifier on agents; virtual agent ID on batches.
    pub const AGENT_ID: &str = "agentId";
    /// Phone number, on agents and calls.
    pub const PHONE_NUMBER: &str = "phoneNumber";
    /// Telephony provider tag.
    pub const TELEPHONY_PROVIDER: &str = "telephonyProvider";
    /// Telephony application.
    pub const VOXIMPLANT_APPLICATION_ID: &str = "voximplantApplicationId";
    /// Telephony routing rule.
    pub const VOXIMPLANT_RULE_ID: &str = "voximplantRuleId";
    /// Serialized variable list.
    pub const AGENT_VARIABLES: &str = "agentVariables";
    /// Generated integration script.
    pub const VOXIMPLANT_CODE: &str = "voximplantCode";

    // Batches
    /// Virtual batch ID, on batches and calls.
    pub const BATCH_ID: &str = "batchId";
    /// Raw uploaded dataset.
    pub const CSV_CONTENT: &str = "csvContent";
    /// Batch or call status.
    pub const STATUS: &str = "status";

    // Calls
    /// Virtual call ID.
    pub const CALL_ID: &str = "callId";
    /// Voice platform call identifier.
    pub const ELEVENLABS_CALL_ID: &str = "elevenLabsCallId";
    /// Recording locator.
    pub const RECORDING_URL: &str = "recordingUrl";
    /// Call transcript.
    pub const TRANSCRIPT: &str = "transcript";

    // Settings
    /// External table API key.
    pub const AIRTABLE_API_KEY: &str = "airtableApiKey";
    /// External table base.
    pub const AIRTABLE_BASE_ID: &str = "airtableBaseId";
    /// External table name.
    pub const AIRTABLE_TABLE_NAME: &str = "airtableTableName";
    /// Workflow webhook.
    pub const N8N_WEBHOOK_URL: &str = "n8nWebhookUrl";
    /// Telephony account.
    pub const VOXIMPLANT_ACCOUNT_ID: &str = "voximplantAccountId";
    /// Telephony API key.
    pub const VOXIMPLANT_API_KEY: &str = "voximplantApiKey";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_distinct() {
        let mut seen: Vec<usize> = EntityKind::ALL.iter().map(|k| k.index()).collect();
        seen.dedup();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn settings_are_keyed_by_owner() {
        assert_eq!(EntityKind::Settings.id_field(), field::USER_ID);
        assert_eq!(EntityKind::Settings.table(), "Settings");
    }
}
