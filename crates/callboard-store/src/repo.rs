//! Integer-keyed entity repository over the external record store.
//!
//! ```text
//!   caller ──(AgentId 7)──▶ Repository ──resolve──▶ IdentityMap ──▶ "recXyz"
//!                               │
//!                               └──find("Agents", "recXyz")──▶ RecordStore
//! ```
//!
//! Virtual IDs are recovered from scan results in this order:
//!
//! 1. the numeric ID stored on the record (trusted, and bound into the map)
//! 2. a reverse lookup of the record handle
//! 3. the record's position in the scan result plus one
//!
//! The last fallback is only stable while nobody inserts or deletes records between
//! the startup scan and the listing; it exists for records written before IDs were
//! stored on them.

use callboard_core::{AgentId, BatchId, Role, UserId};
use futures::future::join_all;
use serde_json::Value;

use crate::convert::{stored_id, Entity, Owned};
use crate::error::{Result, StoreError};
use crate::identity::IdentityMap;
use crate::record::{Fields, Filter, Record, RecordStore, ScanQuery, Sort};
use crate::schema::{field, EntityKind};
use crate::types::{
    Agent, AgentPatch, Batch, Call, NewAgent, NewBatch, NewUser, Settings, SettingsUpdate, User,
};

/// Entity repository backed by a [`RecordStore`].
pub struct Repository<R: RecordStore> {
    store: R,
    identities: IdentityMap,
}

impl<R: RecordStore> Repository<R> {
    /// Create a repository with an empty identity map.
    ///
    /// Call [`load_identities`](Self::load_identities) to populate it.
    #[must_use]
    pub fn new(store: R) -> Self {
        Self {
            store,
            identities: IdentityMap::new(),
        }
    }

    /// The underlying record store.
    #[must_use]
    pub const fn store(&self) -> &R {
        &self.store
    }

    /// The identity map.
    #[must_use]
    pub const fn identities(&self) -> &IdentityMap {
        &self.identities
    }

    // =========================================================================
    // Startup
    // =========================================================================

    /// Scan every table once and bind every record's virtual ID.
    ///
    /// Best effort: a failing table is logged and skipped, and the others still load.
    /// Returns the number of tables that loaded.
    pub async fn load_identities(&self) -> usize {
        let results = join_all(EntityKind::ALL.into_iter().map(|kind| async move {
            (kind, self.load_kind(kind).await)
        }))
        .await;

        let mut loaded = 0;
        for (kind, result) in results {
            match result {
                Ok(count) => {
                    loaded += 1;
                    tracing::info!(table = kind.table(), records = count, "Loaded identities");
                }
                Err(e) => {
                    tracing::error!(
                        table = kind.table(),
                        error = %e,
                        "Failed to load identities; check the API key, the base ID, and that the table exists"
                    );
                }
            }
        }
        loaded
    }

    async fn load_kind(&self, kind: EntityKind) -> Result<usize> {
        let records = self.store.scan(kind.table(), &ScanQuery::all()).await?;

        // Stored IDs are trusted and bound first so no ordinal can take them.
        let mut unstored = Vec::new();
        for (position, record) in records.iter().enumerate() {
            match stored_id(kind, &record.fields) {
                Some(id) => self.identities.observe(kind, id, record.id.clone()),
                None => unstored.push((position, record)),
            }
        }

        let mut displaced = Vec::new();
        for (position, record) in unstored {
            let id = ordinal(position);
            if self.identities.resolve(kind, id).is_some() {
                displaced.push(record);
            } else {
                self.identities.observe(kind, id, record.id.clone());
            }
        }
        for record in displaced {
            let id = self.identities.adopt(kind, &record.id);
            tracing::warn!(
                table = kind.table(),
                handle = %record.id,
                id,
                "Ordinal ID already taken; issued a fresh one"
            );
        }

        self.identities.mark_loaded(kind);
        Ok(records.len())
    }

    // =========================================================================
    // Generic operations
    // =========================================================================

    /// Fetch an entity by virtual ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the ID is unbound or the record is gone.
    pub async fn get<E: Entity>(&self, id: E::Id) -> Result<E> {
        let Some(handle) = self.identities.resolve(E::KIND, id.into()) else {
            if !self.identities.is_loaded(E::KIND) {
                tracing::debug!(
                    table = E::KIND.table(),
                    id = %id,
                    "Lookup before identities finished loading"
                );
            }
            return Err(StoreError::NotFound);
        };
        let record = self.store.find(E::KIND.table(), &handle).await?;
        Ok(E::from_record(id, &record))
    }

    /// List an owner's entities, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub async fn list_by_owner<E: Owned>(&self, owner: UserId) -> Result<Vec<E>> {
        self.list_where(Some(Filter::eq(E::OWNER_FIELD, owner.get())))
            .await
    }

    /// Create an entity under a freshly issued virtual ID.
    ///
    /// The ID is written into the record and bound only after the store confirms
    /// the write.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the write fails; nothing is bound in that case.
    pub async fn create<E: Entity>(&self, fields: Fields) -> Result<E> {
        let id = self.identities.next_id(E::KIND);
        self.insert(id, fields).await
    }

    /// Write the given fields to an existing entity.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the ID is unbound.
    pub async fn update<E: Entity>(&self, id: E::Id, fields: Fields) -> Result<E> {
        let handle = self
            .identities
            .resolve(E::KIND, id.into())
            .ok_or(StoreError::NotFound)?;
        let record = self
            .store
            .update(E::KIND.table(), &handle, fields)
            .await
            .inspect_err(|e| {
                tracing::error!(table = E::KIND.table(), id = %id, error = %e, "Update failed");
            })?;
        Ok(E::from_record(id, &record))
    }

    /// Delete an entity. Deleting an unbound ID is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the delete fails for a reason other than the
    /// record already being gone.
    pub async fn delete<E: Entity>(&self, id: E::Id) -> Result<()> {
        let raw = id.into();
        let Some(handle) = self.identities.resolve(E::KIND, raw) else {
            tracing::debug!(table = E::KIND.table(), id = %id, "Delete of unbound ID ignored");
            return Ok(());
        };
        match self.store.destroy(E::KIND.table(), &handle).await {
            Ok(()) | Err(StoreError::NotFound) => {}
            Err(e) => {
                tracing::error!(table = E::KIND.table(), id = %id, error = %e, "Delete failed");
                return Err(e);
            }
        }
        self.identities.unbind(E::KIND, raw);
        tracing::info!(table = E::KIND.table(), id = %id, "Deleted record");
        Ok(())
    }

    async fn insert<E: Entity>(&self, id: u64, mut fields: Fields) -> Result<E> {
        fields.insert(E::KIND.id_field().to_string(), Value::from(id));
        let record = self
            .store
            .create(E::KIND.table(), fields)
            .await
            .inspect_err(|e| {
                tracing::error!(table = E::KIND.table(), id, error = %e, "Create failed");
            })?;
        self.identities.bind(E::KIND, id, record.id.clone());
        Ok(E::from_record(E::Id::from(id), &record))
    }

    async fn list_where<E: Entity>(&self, filter: Option<Filter>) -> Result<Vec<E>> {
        let mut query = ScanQuery::all().sort(Sort::descending(E::TIMESTAMP_FIELD));
        query.filter = filter;

        let records = self
            .store
            .scan(E::KIND.table(), &query)
            .await
            .inspect_err(|e| {
                tracing::error!(table = E::KIND.table(), error = %e, "Scan failed");
            })?;

        let mut items: Vec<E> = records
            .iter()
            .enumerate()
            .map(|(position, record)| {
                let id = self.recover_id(E::KIND, record, position);
                E::from_record(E::Id::from(id), record)
            })
            .collect();
        items.sort_by_key(|item| std::cmp::Reverse(item.created_at()));
        Ok(items)
    }

    async fn first_where(&self, kind: EntityKind, filter: Filter) -> Result<Option<Record>> {
        let query = ScanQuery::all().filter(filter).max_records(1);
        let records = self
            .store
            .scan(kind.table(), &query)
            .await
            .inspect_err(|e| {
                tracing::error!(table = kind.table(), error = %e, "Scan failed");
            })?;
        Ok(records.into_iter().next())
    }

    fn recover_id(&self, kind: EntityKind, record: &Record, position: usize) -> u64 {
        if let Some(id) = stored_id(kind, &record.fields) {
            self.identities.observe(kind, id, record.id.clone());
            return id;
        }
        self.identities
            .reverse_lookup(kind, &record.id)
            .unwrap_or_else(|| ordinal(position))
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Find the user with the given external (Telegram) identity.
    ///
    /// A matching record without a recoverable ID is adopted under a fresh virtual
    /// ID for the lifetime of the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub async fn find_user_by_external_id(&self, telegram_id: &str) -> Result<Option<User>> {
        let Some(record) = self
            .first_where(EntityKind::User, Filter::eq(field::TELEGRAM_ID, telegram_id))
            .await?
        else {
            return Ok(None);
        };

        let id = if let Some(id) = stored_id(EntityKind::User, &record.fields) {
            self.identities.observe(EntityKind::User, id, record.id.clone());
            id
        } else {
            let id = self.identities.adopt(EntityKind::User, &record.id);
            tracing::info!(record = %record.id, user_id = id, "Adopted user record without stored ID");
            id
        };
        Ok(Some(User::from_record(UserId::new(id), &record)))
    }

    /// Create a user with the default role, zero usage, and no bonus.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the write fails.
    pub async fn create_user(&self, input: &NewUser) -> Result<User> {
        let user: User = self.create(input.to_fields()).await?;
        tracing::info!(user_id = %user.id, telegram_id = %user.telegram_id, "Created user");
        Ok(user)
    }

    /// Fetch a user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user is unknown.
    pub async fn get_user(&self, id: UserId) -> Result<User> {
        self.get(id).await
    }

    /// List every user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.list_where(None).await
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user is unknown.
    pub async fn update_user_role(&self, id: UserId, role: Role) -> Result<User> {
        let mut fields = Fields::new();
        fields.insert(field::ACCESS.to_string(), Value::from(role.as_str()));
        self.update(id, fields).await
    }

    /// Add `calls` to a user's usage allowance and set the bonus flag.
    ///
    /// Callers are responsible for checking the flag first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user is unknown.
    pub async fn grant_bonus(&self, id: UserId, calls: u64) -> Result<User> {
        let user = self.get_user(id).await?;
        let mut fields = Fields::new();
        fields.insert(
            field::USAGE.to_string(),
            Value::from(user.usage.saturating_add(calls)),
        );
        fields.insert(field::CHANNEL_BONUS_RECEIVED.to_string(), Value::Bool(true));
        self.update(id, fields).await
    }

    // =========================================================================
    // Agents
    // =========================================================================

    /// List an owner's agents, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub async fn list_agents(&self, owner: UserId) -> Result<Vec<Agent>> {
        self.list_by_owner(owner).await
    }

    /// Count an owner's agents, live.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub async fn count_agents(&self, owner: UserId) -> Result<usize> {
        Ok(self.list_agents(owner).await?.len())
    }

    /// Fetch an agent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the agent is unknown.
    pub async fn get_agent(&self, id: AgentId) -> Result<Agent> {
        self.get(id).await
    }

    /// Create an agent for `owner`.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the write fails.
    pub async fn create_agent(&self, owner: UserId, input: &NewAgent) -> Result<Agent> {
        let agent: Agent = self.create(input.to_fields(owner)?).await?;
        tracing::info!(agent_id = %agent.id, user_id = %owner, name = %agent.name, "Created agent");
        Ok(agent)
    }

    /// Apply a partial update to an agent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the agent is unknown.
    pub async fn update_agent(&self, id: AgentId, patch: &AgentPatch) -> Result<Agent> {
        let fields = patch.to_fields()?;
        if fields.is_empty() {
            return self.get(id).await;
        }
        self.update(id, fields).await
    }

    /// Delete an agent. Unknown IDs are ignored.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the delete fails.
    pub async fn delete_agent(&self, id: AgentId) -> Result<()> {
        self.delete::<Agent>(id).await
    }

    // =========================================================================
    // Batches and calls
    // =========================================================================

    /// List an owner's batches, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub async fn list_batches(&self, owner: UserId) -> Result<Vec<Batch>> {
        self.list_by_owner(owner).await
    }

    /// Fetch a batch.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the batch is unknown.
    pub async fn get_batch(&self, id: BatchId) -> Result<Batch> {
        self.get(id).await
    }

    /// Create a pending batch for `owner`. The dataset must already be validated.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the write fails.
    pub async fn create_batch(&self, owner: UserId, input: &NewBatch) -> Result<Batch> {
        let batch: Batch = self.create(input.to_fields(owner)).await?;
        tracing::info!(batch_id = %batch.id, user_id = %owner, agent_id = %batch.agent_id, "Created batch");
        Ok(batch)
    }

    /// List the calls of one batch, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub async fn list_calls_by_batch(&self, batch: BatchId) -> Result<Vec<Call>> {
        self.list_where(Some(Filter::eq(field::BATCH_ID, batch.get())))
            .await
    }

    /// List the calls of every batch `owner` has, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if either scan fails.
    pub async fn list_calls_for_owner(&self, owner: UserId) -> Result<Vec<Call>> {
        let batches = self.list_batches(owner).await?;
        if batches.is_empty() {
            return Ok(Vec::new());
        }
        let filter = Filter::any(
            batches
                .iter()
                .map(|b| Filter::eq(field::BATCH_ID, b.id.get()))
                .collect(),
        );
        self.list_where(Some(filter)).await
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Fetch an owner's settings, if any were saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub async fn get_settings(&self, owner: UserId) -> Result<Option<Settings>> {
        let Some(record) = self
            .first_where(EntityKind::Settings, Filter::eq(field::USER_ID, owner.get()))
            .await?
        else {
            return Ok(None);
        };
        self.identities
            .bind(EntityKind::Settings, owner.get(), record.id.clone());
        Ok(Some(Settings::from_record(owner, &record)))
    }

    /// Update an owner's settings in place, or create them under the owner's ID.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the scan or the write fails.
    pub async fn upsert_settings(&self, owner: UserId, update: &SettingsUpdate) -> Result<Settings> {
        let fields = update.to_fields();
        let existing = self
            .first_where(EntityKind::Settings, Filter::eq(field::USER_ID, owner.get()))
            .await?;

        let settings = if let Some(record) = existing {
            self.identities
                .bind(EntityKind::Settings, owner.get(), record.id.clone());
            self.update::<Settings>(owner, fields).await?
        } else {
            self.insert::<Settings>(owner.get(), fields).await?
        };
        tracing::info!(user_id = %owner, "Saved settings");
        Ok(settings)
    }
}

fn ordinal(position: usize) -> u64 {
    u64::try_from(position).map_or(u64::MAX, |p| p.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::memory::MemoryRecordStore;
    use crate::schema::table;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    fn new_agent(name: &str) -> NewAgent {
        NewAgent {
            name: name.to_string(),
            voice_api_key: "key".to_string(),
            voice_agent_id: "agent_abc".to_string(),
            phone_number: None,
            application_id: None,
            rule_id: None,
            variables: None,
            integration_script: None,
        }
    }

    fn new_user(telegram_id: &str) -> NewUser {
        NewUser {
            telegram_id: telegram_id.to_string(),
            username: Some("ann".to_string()),
        }
    }

    #[tokio::test]
    async fn create_then_get() {
        let repo = Repository::new(MemoryRecordStore::new());
        let user = repo.create_user(&new_user("100")).await.unwrap();
        assert_eq!(user.id, UserId::new(1));
        assert_eq!(user.role, Role::User);
        assert_eq!(user.usage, 0);

        let agent = repo.create_agent(user.id, &new_agent("Sales")).await.unwrap();
        let fetched = repo.get_agent(agent.id).await.unwrap();
        assert_eq!(fetched.name, "Sales");
        assert_eq!(fetched.user_id, user.id);
    }

    #[tokio::test]
    async fn create_stores_numeric_id() {
        let repo = Repository::new(MemoryRecordStore::new());
        let agent = repo
            .create_agent(UserId::new(1), &new_agent("a"))
            .await
            .unwrap();
        let records = repo
            .store()
            .scan(table::AGENTS, &ScanQuery::all())
            .await
            .unwrap();
        assert_eq!(records[0].fields["agentNumericId"], agent.id.get());
    }

    #[tokio::test]
    async fn failed_create_binds_nothing() {
        let repo = Repository::new(MemoryRecordStore::new());
        repo.store().set_unavailable(true);

        let result = repo.create_agent(UserId::new(1), &new_agent("a")).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(repo.identities().is_empty(EntityKind::Agent));
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let repo = Repository::new(MemoryRecordStore::new());
        assert!(matches!(
            repo.get_batch(BatchId::new(42)).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn delete_unknown_is_noop() {
        let repo = Repository::new(MemoryRecordStore::new());
        repo.delete_agent(AgentId::new(99)).await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_record_and_binding() {
        let repo = Repository::new(MemoryRecordStore::new());
        let agent = repo
            .create_agent(UserId::new(1), &new_agent("a"))
            .await
            .unwrap();

        repo.delete_agent(agent.id).await.unwrap();
        assert!(repo.store().is_empty(table::AGENTS));
        assert!(matches!(
            repo.get_agent(agent.id).await,
            Err(StoreError::NotFound)
        ));

        let next = repo
            .create_agent(UserId::new(1), &new_agent("b"))
            .await
            .unwrap();
        assert_ne!(next.id, agent.id);
    }

    #[tokio::test]
    async fn list_by_owner_is_newest_first_regardless_of_store_order() {
        let store = MemoryRecordStore::unordered();
        for (id, created) in [
            (1, "2024-01-02T00:00:00Z"),
            (2, "2024-01-03T00:00:00Z"),
            (3, "2024-01-01T00:00:00Z"),
        ] {
            store.insert_raw(
                table::BATCHES,
                fields(json!({"batchId": id, "userId": 5, "agentId": 1, "createdAt": created})),
            );
        }
        store.insert_raw(
            table::BATCHES,
            fields(json!({"batchId": 4, "userId": 6, "createdAt": "2024-02-01T00:00:00Z"})),
        );
        let repo = Repository::new(store);

        let batches = repo.list_batches(UserId::new(5)).await.unwrap();
        let ids: Vec<u64> = batches.iter().map(|b| b.id.get()).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[tokio::test]
    async fn listing_binds_stored_ids() {
        let store = MemoryRecordStore::new();
        store.insert_raw(
            table::BATCHES,
            fields(json!({"batchId": 12, "userId": 5, "createdAt": "2024-01-01T00:00:00Z"})),
        );
        let repo = Repository::new(store);

        repo.list_batches(UserId::new(5)).await.unwrap();
        let batch = repo.get_batch(BatchId::new(12)).await.unwrap();
        assert_eq!(batch.user_id, UserId::new(5));
        assert_eq!(repo.identities().next_id(EntityKind::Batch), 13);
    }

    #[tokio::test]
    async fn load_identities_prefers_stored_ids_then_ordinal() {
        let store = MemoryRecordStore::new();
        store.insert_raw(table::AGENTS, fields(json!({"agentNumericId": 10, "userId": 1})));
        let legacy = store.insert_raw(table::AGENTS, fields(json!({"userId": 1})));
        let repo = Repository::new(store);

        assert_eq!(repo.load_identities().await, EntityKind::ALL.len());

        assert_eq!(
            repo.identities().reverse_lookup(EntityKind::Agent, &legacy),
            Some(2)
        );
        assert!(repo.identities().is_loaded(EntityKind::Agent));
        let created = repo
            .create_agent(UserId::new(1), &new_agent("fresh"))
            .await
            .unwrap();
        assert_eq!(created.id, AgentId::new(11));
    }

    #[tokio::test]
    async fn load_identities_keeps_stored_id_over_colliding_ordinal() {
        let store = MemoryRecordStore::new();
        let legacy = store.insert_raw(table::AGENTS, fields(json!({"userId": 1})));
        let trusted = store.insert_raw(
            table::AGENTS,
            fields(json!({"agentNumericId": 1, "userId": 1})),
        );
        store.insert_raw(
            table::AGENTS,
            fields(json!({"agentNumericId": 4, "userId": 1})),
        );
        let repo = Repository::new(store);

        repo.load_identities().await;

        let ids = repo.identities();
        assert_eq!(ids.resolve(EntityKind::Agent, 1), Some(trusted));
        let legacy_id = ids.reverse_lookup(EntityKind::Agent, &legacy).unwrap();
        assert_eq!(legacy_id, 5);
        assert_eq!(ids.len(EntityKind::Agent), 3);
        assert_eq!(ids.next_id(EntityKind::Agent), 6);
    }

    #[tokio::test]
    async fn load_identities_counter_ends_past_max_observed() {
        let store = MemoryRecordStore::new();
        for id in [3, 42, 7] {
            store.insert_raw(
                table::USERS,
                fields(json!({"userId": id, "telegramId": id.to_string()})),
            );
        }
        store.insert_raw(table::USERS, fields(json!({"telegramId": "legacy"})));
        let repo = Repository::new(store);

        repo.load_identities().await;

        let ids = repo.identities();
        assert_eq!(ids.len(EntityKind::User), 4);
        let issued = ids.next_id(EntityKind::User);
        assert!(issued > 42);
        for bound in [3, 42, 7, 4] {
            assert!(ids.resolve(EntityKind::User, bound).is_some());
        }
    }

    #[tokio::test]
    async fn load_identities_survives_failure() {
        let repo = Repository::new(MemoryRecordStore::new());
        repo.store().set_unavailable(true);

        assert_eq!(repo.load_identities().await, 0);
        assert!(!repo.identities().is_loaded(EntityKind::User));
    }

    #[tokio::test]
    async fn find_user_by_external_id_adopts_legacy_records() {
        let store = MemoryRecordStore::new();
        store.insert_raw(
            table::USERS,
            fields(json!({"telegramId": "777", "access": "subscriber"})),
        );
        let repo = Repository::new(store);

        let first = repo.find_user_by_external_id("777").await.unwrap().unwrap();
        let again = repo.find_user_by_external_id("777").await.unwrap().unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(first.role, Role::Subscriber);
        assert_eq!(repo.get_user(first.id).await.unwrap().telegram_id, "777");

        assert!(repo.find_user_by_external_id("888").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn grant_bonus_adds_calls_and_sets_flag() {
        let repo = Repository::new(MemoryRecordStore::new());
        let user = repo.create_user(&new_user("1")).await.unwrap();

        let user = repo.grant_bonus(user.id, 50).await.unwrap();
        assert_eq!(user.usage, 50);
        assert!(user.channel_bonus_received);
    }

    #[tokio::test]
    async fn update_user_role_persists() {
        let repo = Repository::new(MemoryRecordStore::new());
        let user = repo.create_user(&new_user("1")).await.unwrap();

        repo.update_user_role(user.id, Role::Admin).await.unwrap();
        assert_eq!(repo.get_user(user.id).await.unwrap().role, Role::Admin);
        assert!(matches!(
            repo.update_user_role(UserId::new(99), Role::Admin).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn update_agent_writes_only_patch() {
        let repo = Repository::new(MemoryRecordStore::new());
        let mut input = new_agent("a");
        input.phone_number = Some("+1".to_string());
        let agent = repo.create_agent(UserId::new(1), &input).await.unwrap();

        let patch = AgentPatch {
            name: Some("renamed".to_string()),
            ..AgentPatch::default()
        };
        let updated = repo.update_agent(agent.id, &patch).await.unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.phone_number.as_deref(), Some("+1"));
    }

    #[tokio::test]
    async fn calls_for_owner_spans_all_batches() {
        let repo = Repository::new(MemoryRecordStore::new());
        let owner = UserId::new(1);
        let input = NewBatch {
            agent_id: AgentId::new(1),
            name: "b".to_string(),
            dataset: "phone\n+1".to_string(),
        };
        let b1 = repo.create_batch(owner, &input).await.unwrap();
        let b2 = repo.create_batch(owner, &input).await.unwrap();
        let other = repo.create_batch(UserId::new(2), &input).await.unwrap();

        for (batch, phone) in [(b1.id, "+1"), (b2.id, "+2"), (other.id, "+3")] {
            repo.store().insert_raw(
                table::CALLS,
                fields(json!({"batchId": batch.get(), "phoneNumber": phone, "status": "done"})),
            );
        }

        let calls = repo.list_calls_for_owner(owner).await.unwrap();
        let mut phones: Vec<&str> = calls.iter().map(|c| c.phone_number.as_str()).collect();
        phones.sort_unstable();
        assert_eq!(phones, vec!["+1", "+2"]);

        let just_b2 = repo.list_calls_by_batch(b2.id).await.unwrap();
        assert_eq!(just_b2.len(), 1);
    }

    #[tokio::test]
    async fn calls_for_owner_without_batches_is_empty() {
        let repo = Repository::new(MemoryRecordStore::new());
        repo.store().insert_raw(
            table::CALLS,
            fields(json!({"batchId": 1, "phoneNumber": "+1", "status": "done"})),
        );
        assert!(repo
            .list_calls_for_owner(UserId::new(1))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn settings_upsert_creates_then_updates() {
        let repo = Repository::new(MemoryRecordStore::new());
        let owner = UserId::new(3);
        assert!(repo.get_settings(owner).await.unwrap().is_none());

        let created = repo
            .upsert_settings(
                owner,
                &SettingsUpdate {
                    webhook_url: Some("https://hooks.example/x".to_string()),
                    ..SettingsUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(created.id, owner);

        let updated = repo
            .upsert_settings(
                owner,
                &SettingsUpdate {
                    telephony_account_id: Some("acc".to_string()),
                    ..SettingsUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.webhook_url.as_deref(), Some("https://hooks.example/x"));
        assert_eq!(updated.telephony_account_id.as_deref(), Some("acc"));
        assert_eq!(repo.store().len(table::SETTINGS), 1);

        let fetched = repo.get_settings(owner).await.unwrap().unwrap();
        assert_eq!(fetched, updated);
    }
}
