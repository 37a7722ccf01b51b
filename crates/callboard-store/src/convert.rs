//! Mapping between stored record fields and domain entities.
//!
//! Reading is lenient: the table is edited by hand and by an external worker, so
//! missing or malformed fields are defaulted (and logged) rather than rejected.
//!
//! | field              | absent / empty | malformed                 |
//! |--------------------|----------------|---------------------------|
//! | optional text      | `None`         | `None`                    |
//! | role               | `user`         | `guest`                   |
//! | batch status       | `pending`      | `pending`                 |
//! | provider           | `voximplant`   | `voximplant`              |
//! | variables (JSON)   | `None`         | `None`                    |
//! | timestamp          | Unix epoch     | Unix epoch                |
//!
//! Numbers may arrive as integers or integral floats.

use callboard_core::{AgentId, BatchId, CallId, Role, UserId};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::error::{Result, StoreError};
use crate::record::{Fields, Record};
use crate::schema::{field, EntityKind};
use crate::types::{
    Agent, AgentPatch, AgentVariable, Batch, BatchStatus, Call, NewAgent, NewBatch, NewUser,
    Provider, Settings, SettingsUpdate, User,
};

/// An entity kind the repository can read from records.
pub trait Entity: Sized + Send {
    /// Typed virtual ID.
    type Id: Copy + From<u64> + Into<u64> + std::fmt::Display + Send + Sync;

    /// Which table and ID sequence this entity uses.
    const KIND: EntityKind;

    /// Stored timestamp field used for newest-first ordering.
    const TIMESTAMP_FIELD: &'static str = field::CREATED_AT;

    /// Build the entity from a stored record, defaulting bad fields.
    fn from_record(id: Self::Id, record: &Record) -> Self;

    /// Timestamp used for newest-first ordering.
    fn created_at(&self) -> DateTime<Utc>;
}

/// An entity that carries its owning user's ID as a stored field.
pub trait Owned: Entity {
    /// The field holding the owner's user ID.
    const OWNER_FIELD: &'static str;
}

// =============================================================================
// Field readers
// =============================================================================

pub(crate) fn text(fields: &Fields, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]
pub(crate) fn integer(fields: &Fields, name: &str) -> Option<u64> {
    match fields.get(name)? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The virtual ID stored on the record itself, if any. Zero counts as absent.
pub(crate) fn stored_id(kind: EntityKind, fields: &Fields) -> Option<u64> {
    integer(fields, kind.id_field()).filter(|id| *id > 0)
}

fn flag(fields: &Fields, name: &str) -> bool {
    matches!(fields.get(name), Some(Value::Bool(true)))
}

fn timestamp(record: &Record, name: &str) -> DateTime<Utc> {
    let Some(raw) = text(&record.fields, name) else {
        tracing::debug!(record = %record.id, field = name, "Missing timestamp, using epoch");
        return DateTime::UNIX_EPOCH;
    };
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(parsed) => parsed.with_timezone(&Utc),
        Err(e) => {
            tracing::warn!(record = %record.id, field = name, value = %raw, error = %e, "Unparseable timestamp, using epoch");
            DateTime::UNIX_EPOCH
        }
    }
}

fn role(record: &Record) -> Role {
    match text(&record.fields, field::ACCESS) {
        None => Role::default(),
        Some(raw) => Role::parse(&raw).unwrap_or_else(|| {
            tracing::warn!(record = %record.id, value = %raw, "Unknown role, treating as least privileged");
            Role::LEAST_PRIVILEGED
        }),
    }
}

fn batch_status(record: &Record) -> BatchStatus {
    text(&record.fields, field::STATUS)
        .and_then(|raw| BatchStatus::parse(&raw))
        .unwrap_or_default()
}

fn variables(record: &Record) -> Option<Vec<AgentVariable>> {
    let raw = text(&record.fields, field::AGENT_VARIABLES)?;
    match serde_json::from_str(&raw) {
        Ok(vars) => Some(vars),
        Err(e) => {
            tracing::warn!(record = %record.id, error = %e, "Malformed agent variables, ignoring");
            None
        }
    }
}

fn now_string() -> String {
    Utc::now().to_rfc3339()
}

fn into_fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

fn put_some(fields: &mut Fields, name: &str, value: Option<&String>) {
    if let Some(v) = value {
        fields.insert(name.to_string(), Value::String(v.clone()));
    }
}

fn encode_variables(vars: &[AgentVariable]) -> Result<String> {
    serde_json::to_string(vars).map_err(|e| StoreError::Serialization(e.to_string()))
}

// =============================================================================
// Entities
// =============================================================================

impl Entity for User {
    type Id = UserId;
    const KIND: EntityKind = EntityKind::User;

    fn from_record(id: UserId, record: &Record) -> Self {
        let f = &record.fields;
        Self {
            id,
            telegram_id: text(f, field::TELEGRAM_ID).unwrap_or_default(),
            username: text(f, field::USERNAME),
            role: role(record),
            usage: integer(f, field::USAGE).unwrap_or(0),
            channel_bonus_received: flag(f, field::CHANNEL_BONUS_RECEIVED),
            created_at: timestamp(record, field::CREATED_AT),
        }
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Agent {
    type Id = AgentId;
    const KIND: EntityKind = EntityKind::Agent;

    fn from_record(id: AgentId, record: &Record) -> Self {
        let f = &record.fields;
        Self {
            id,
            user_id: UserId::new(integer(f, field::USER_ID).unwrap_or(0)),
            name: text(f, field::NAME).unwrap_or_default(),
            voice_api_key: text(f, field::ELEVENLABS_API_KEY).unwrap_or_default(),
            voice_agent_id: text(f, field::AGENT_ID).unwrap_or_default(),
            phone_number: text(f, field::PHONE_NUMBER),
            provider: Provider::Voximplant,
            application_id: text(f, field::VOXIMPLANT_APPLICATION_ID),
            rule_id: text(f, field::VOXIMPLANT_RULE_ID),
            variables: variables(record),
            integration_script: text(f, field::VOXIMPLANT_CODE),
            created_at: timestamp(record, field::CREATED_AT),
        }
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Owned for Agent {
    const OWNER_FIELD: &'static str = field::USER_ID;
}

impl Entity for Batch {
    type Id = BatchId;
    const KIND: EntityKind = EntityKind::Batch;

    fn from_record(id: BatchId, record: &Record) -> Self {
        let f = &record.fields;
        Self {
            id,
            user_id: UserId::new(integer(f, field::USER_ID).unwrap_or(0)),
            agent_id: AgentId::new(integer(f, field::AGENT_ID).unwrap_or(0)),
            name: text(f, field::NAME).unwrap_or_default(),
            dataset: text(f, field::CSV_CONTENT).unwrap_or_default(),
            status: batch_status(record),
            created_at: timestamp(record, field::CREATED_AT),
        }
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Owned for Batch {
    const OWNER_FIELD: &'static str = field::USER_ID;
}

impl Entity for Call {
    type Id = CallId;
    const KIND: EntityKind = EntityKind::Call;

    fn from_record(id: CallId, record: &Record) -> Self {
        let f = &record.fields;
        Self {
            id,
            batch_id: integer(f, field::BATCH_ID)
                .filter(|n| *n > 0)
                .map(BatchId::new),
            phone_number: text(f, field::PHONE_NUMBER).unwrap_or_default(),
            status: text(f, field::STATUS).unwrap_or_default(),
            external_call_id: text(f, field::ELEVENLABS_CALL_ID),
            recording_url: text(f, field::RECORDING_URL),
            transcript: text(f, field::TRANSCRIPT),
            created_at: timestamp(record, field::CREATED_AT),
        }
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Settings {
    type Id = UserId;
    const KIND: EntityKind = EntityKind::Settings;
    const TIMESTAMP_FIELD: &'static str = field::UPDATED_AT;

    fn from_record(id: UserId, record: &Record) -> Self {
        let f = &record.fields;
        Self {
            id,
            user_id: id,
            airtable_api_key: text(f, field::AIRTABLE_API_KEY),
            airtable_base_id: text(f, field::AIRTABLE_BASE_ID),
            airtable_table_name: text(f, field::AIRTABLE_TABLE_NAME),
            webhook_url: text(f, field::N8N_WEBHOOK_URL),
            telephony_account_id: text(f, field::VOXIMPLANT_ACCOUNT_ID),
            telephony_api_key: text(f, field::VOXIMPLANT_API_KEY),
            updated_at: timestamp(record, field::UPDATED_AT),
        }
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Owned for Settings {
    const OWNER_FIELD: &'static str = field::USER_ID;
}

// =============================================================================
// Writers
// =============================================================================

impl NewUser {
    pub(crate) fn to_fields(&self) -> Fields {
        let mut fields = into_fields(json!({
            (field::TELEGRAM_ID): self.telegram_id,
            (field::ACCESS): Role::default().as_str(),
            (field::USAGE): 0,
            (field::CHANNEL_BONUS_RECEIVED): false,
            (field::CREATED_AT): now_string(),
        }));
        put_some(&mut fields, field::USERNAME, self.username.as_ref());
        fields
    }
}

impl NewAgent {
    pub(crate) fn to_fields(&self, owner: UserId) -> Result<Fields> {
        let mut fields = into_fields(json!({
            (field::USER_ID): owner.get(),
            (field::NAME): self.name,
            (field::ELEVENLABS_API_KEY): self.voice_api_key,
            (field::AGENT_ID): self.voice_agent_id,
            (field::TELEPHONY_PROVIDER): Provider::Voximplant.as_str(),
            (field::CREATED_AT): now_string(),
        }));
        put_some(&mut fields, field::PHONE_NUMBER, self.phone_number.as_ref());
        put_some(
            &mut fields,
            field::VOXIMPLANT_APPLICATION_ID,
            self.application_id.as_ref(),
        );
        put_some(&mut fields, field::VOXIMPLANT_RULE_ID, self.rule_id.as_ref());
        put_some(
            &mut fields,
            field::VOXIMPLANT_CODE,
            self.integration_script.as_ref(),
        );
        if let Some(vars) = &self.variables {
            fields.insert(
                field::AGENT_VARIABLES.to_string(),
                Value::String(encode_variables(vars)?),
            );
        }
        Ok(fields)
    }
}

impl AgentPatch {
    pub(crate) fn to_fields(&self) -> Result<Fields> {
        let mut fields = Fields::new();
        put_some(&mut fields, field::NAME, self.name.as_ref());
        put_some(
            &mut fields,
            field::ELEVENLABS_API_KEY,
            self.voice_api_key.as_ref(),
        );
        put_some(&mut fields, field::AGENT_ID, self.voice_agent_id.as_ref());
        put_some(&mut fields, field::PHONE_NUMBER, self.phone_number.as_ref());
        put_some(
            &mut fields,
            field::VOXIMPLANT_APPLICATION_ID,
            self.application_id.as_ref(),
        );
        put_some(&mut fields, field::VOXIMPLANT_RULE_ID, self.rule_id.as_ref());
        put_some(
            &mut fields,
            field::VOXIMPLANT_CODE,
            self.integration_script.as_ref(),
        );
        if let Some(vars) = &self.variables {
            fields.insert(
                field::AGENT_VARIABLES.to_string(),
                Value::String(encode_variables(vars)?),
            );
        }
        Ok(fields)
    }
}

impl NewBatch {
    pub(crate) fn to_fields(&self, owner: UserId) -> Fields {
        into_fields(json!({
            (field::USER_ID): owner.get(),
            (field::AGENT_ID): self.agent_id.get(),
            (field::NAME): self.name,
            (field::CSV_CONTENT): self.dataset,
            (field::STATUS): BatchStatus::Pending.as_str(),
            (field::CREATED_AT): now_string(),
        }))
    }
}

impl SettingsUpdate {
    pub(crate) fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        put_some(&mut fields, field::AIRTABLE_API_KEY, self.airtable_api_key.as_ref());
        put_some(&mut fields, field::AIRTABLE_BASE_ID, self.airtable_base_id.as_ref());
        put_some(
            &mut fields,
            field::AIRTABLE_TABLE_NAME,
            self.airtable_table_name.as_ref(),
        );
        put_some(&mut fields, field::N8N_WEBHOOK_URL, self.webhook_url.as_ref());
        put_some(
            &mut fields,
            field::VOXIMPLANT_ACCOUNT_ID,
            self.telephony_account_id.as_ref(),
        );
        put_some(
            &mut fields,
            field::VOXIMPLANT_API_KEY,
            self.telephony_api_key.as_ref(),
        );
        fields.insert(field::UPDATED_AT.to_string(), Value::String(now_string()));
        fields
    }
}
