//! Control plane service implementation.
//!
//! This module provides the `CampaignControl` trait and `CampaignService`
//! implementation that ties sessions, quotas, and dataset validation to the
//! entity repository.

use std::sync::Arc;

use async_trait::async_trait;
use callboard_auth::{ChannelMembership, LoginVerifier, TelegramLogin};
use callboard_core::{dataset, AgentId, BatchId, Role, UserId};
use callboard_store::{
    Agent, AgentPatch, Batch, Call, NewAgent, NewBatch, NewUser, RecordStore, Repository,
    SessionStore, Settings, SettingsUpdate, StoreError, User,
};

use crate::error::{ControlError, Result};
use crate::gate::AccessGate;
use crate::quota::{check_create_agent, check_create_batch};
use crate::types::{
    BatchDetail, Caller, ChannelStatus, ConnectionCheck, ConnectionReport, ControlConfig,
    DatasetCheck, DatasetReport, LoginOutcome, UserProfile,
};
use crate::voice::VoicePlatform;

/// Trait defining the control plane operations.
///
/// Every operation except login takes the [`Caller`] resolved by
/// [`authenticate`](Self::authenticate).
#[async_trait]
pub trait CampaignControl: Send + Sync {
    // =========================================================================
    // Authentication
    // =========================================================================

    /// Verify a Telegram login, creating the user on first login, and open a session.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Auth` if the payload does not verify.
    async fn login(&self, login: &TelegramLogin) -> Result<LoginOutcome>;

    /// Close the session behind `token`.
    async fn logout(&self, token: &str) -> Result<()>;

    /// Resolve a bearer token to a caller.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Unauthorized` if there is no valid session.
    async fn authenticate(&self, token: Option<&str>) -> Result<Caller>;

    /// Resolve a bearer token and require the admin role.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Forbidden` if the caller is not an admin.
    async fn authenticate_admin(&self, token: Option<&str>) -> Result<Caller>;

    /// The caller's account and limits.
    async fn current_user(&self, caller: &Caller) -> Result<UserProfile>;

    /// Whether the caller follows the bonus channel and may claim the bonus.
    async fn channel_status(&self, caller: &Caller) -> Result<ChannelStatus>;

    /// Grant the one-time channel bonus.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Conflict` if it was already claimed or the caller
    /// is not subscribed.
    async fn claim_bonus(&self, caller: &Caller) -> Result<User>;

    // =========================================================================
    // Agents
    // =========================================================================

    /// List the caller's agents, newest first.
    async fn list_agents(&self, caller: &Caller) -> Result<Vec<Agent>>;

    /// Create an agent under the caller's agent quota.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::QuotaExceeded` if the caller owns the maximum already.
    async fn create_agent(&self, caller: &Caller, input: NewAgent) -> Result<Agent>;

    /// Update one of the caller's agents.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the agent does not exist or belongs to
    /// someone else.
    async fn update_agent(&self, caller: &Caller, id: AgentId, patch: AgentPatch) -> Result<Agent>;

    /// Delete an agent. Requires a role that may delete agents.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Forbidden` for roles without delete rights.
    async fn delete_agent(&self, caller: &Caller, id: AgentId) -> Result<()>;

    /// Check voice platform credentials and discover the agent's variables.
    ///
    /// When the check names one of the caller's agents, the discovered variables
    /// replace that agent's variables.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ConnectionRejected` if the platform refuses the key
    /// or agent, and `ControlError::NotFound` if the named agent is not visible.
    async fn check_connection(
        &self,
        caller: &Caller,
        check: ConnectionCheck,
    ) -> Result<ConnectionReport>;

    // =========================================================================
    // Batches and calls
    // =========================================================================

    /// List the caller's batches, newest first.
    async fn list_batches(&self, caller: &Caller) -> Result<Vec<Batch>>;

    /// Validate a dataset against an agent and the caller's batch limit and
    /// create a pending batch.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Dataset` if the dataset does not fit the agent and
    /// `ControlError::QuotaExceeded` if it has too many records.
    async fn create_batch(&self, caller: &Caller, input: NewBatch) -> Result<Batch>;

    /// Advisory dataset check. Never fails on the batch limit; reports it instead.
    async fn validate_dataset(&self, caller: &Caller, check: DatasetCheck) -> Result<DatasetReport>;

    /// One of the caller's batches with its calls.
    async fn get_batch(&self, caller: &Caller, id: BatchId) -> Result<BatchDetail>;

    /// Calls across all of the caller's batches, newest first.
    async fn list_calls(&self, caller: &Caller) -> Result<Vec<Call>>;

    // =========================================================================
    // Settings
    // =========================================================================

    /// The caller's settings, if saved.
    async fn get_settings(&self, caller: &Caller) -> Result<Option<Settings>>;

    /// Create or update the caller's settings.
    async fn save_settings(&self, caller: &Caller, update: SettingsUpdate) -> Result<Settings>;

    // =========================================================================
    // Administration
    // =========================================================================

    /// Every user, newest first.
    async fn list_users(&self, caller: &Caller) -> Result<Vec<User>>;

    /// Change a user's role.
    async fn set_user_role(&self, caller: &Caller, user_id: UserId, role: Role) -> Result<User>;

    /// Any user's agents.
    async fn list_user_agents(&self, caller: &Caller, user_id: UserId) -> Result<Vec<Agent>>;

    /// Update any agent.
    async fn admin_update_agent(
        &self,
        caller: &Caller,
        id: AgentId,
        patch: AgentPatch,
    ) -> Result<Agent>;

    /// Delete any agent. Unknown IDs are ignored.
    async fn admin_delete_agent(&self, caller: &Caller, id: AgentId) -> Result<()>;
}

/// The main control plane service implementation.
pub struct CampaignService<R: RecordStore, S: SessionStore> {
    repo: Arc<Repository<R>>,
    gate: AccessGate<R, S>,
    verifier: Arc<dyn LoginVerifier>,
    membership: Arc<dyn ChannelMembership>,
    voice: Arc<dyn VoicePlatform>,
    config: ControlConfig,
}

impl<R: RecordStore, S: SessionStore> CampaignService<R, S> {
    /// Create a new service.
    #[must_use]
    pub fn new(
        repo: Arc<Repository<R>>,
        sessions: Arc<S>,
        verifier: Arc<dyn LoginVerifier>,
        membership: Arc<dyn ChannelMembership>,
        voice: Arc<dyn VoicePlatform>,
        config: ControlConfig,
    ) -> Self {
        let gate = AccessGate::new(Arc::clone(&repo), sessions, config.session_ttl());
        Self {
            repo,
            gate,
            verifier,
            membership,
            voice,
            config,
        }
    }

    /// The entity repository.
    #[must_use]
    pub fn repo(&self) -> &Repository<R> {
        &self.repo
    }

    /// The access gate.
    #[must_use]
    pub const fn gate(&self) -> &AccessGate<R, S> {
        &self.gate
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ControlConfig {
        &self.config
    }

    fn require_admin(caller: &Caller) -> Result<()> {
        if caller.is_admin() {
            Ok(())
        } else {
            Err(ControlError::Forbidden("admin only".to_string()))
        }
    }

    /// Fetch an agent the caller may act on. Other users' agents look missing,
    /// except to admins.
    async fn visible_agent(&self, caller: &Caller, id: AgentId) -> Result<Agent> {
        let agent = self
            .repo
            .get_agent(id)
            .await
            .map_err(|e| not_found(e, format!("agent {id}")))?;
        if agent.user_id != caller.user_id && !caller.is_admin() {
            tracing::debug!(agent_id = %id, user_id = %caller.user_id, "Agent owned by another user");
            return Err(ControlError::NotFound(format!("agent {id}")));
        }
        Ok(agent)
    }

    async fn caller_user(&self, caller: &Caller) -> Result<User> {
        self.repo
            .get_user(caller.user_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => ControlError::Unauthorized("user not found".to_string()),
                other => other.into(),
            })
    }
}

fn not_found(err: StoreError, what: String) -> ControlError {
    match err {
        StoreError::NotFound => ControlError::NotFound(what),
        other => other.into(),
    }
}

fn require_text(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ControlError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

#[async_trait]
impl<R: RecordStore + 'static, S: SessionStore + 'static> CampaignControl for CampaignService<R, S> {
    // =========================================================================
    // Authentication
    // =========================================================================

    async fn login(&self, login: &TelegramLogin) -> Result<LoginOutcome> {
        let verified = self.verifier.verify(login)?;

        let user = match self.repo.find_user_by_external_id(&verified.telegram_id).await? {
            Some(user) => user,
            None => {
                self.repo
                    .create_user(&NewUser {
                        telegram_id: verified.telegram_id.clone(),
                        username: Some(verified.display_name.clone()),
                    })
                    .await?
            }
        };

        let session = self.gate.open_session(user.id)?;
        tracing::info!(user_id = %user.id, telegram_id = %user.telegram_id, "User logged in");
        Ok(LoginOutcome { session, user })
    }

    async fn logout(&self, token: &str) -> Result<()> {
        self.gate.close_session(token)
    }

    async fn authenticate(&self, token: Option<&str>) -> Result<Caller> {
        self.gate.require_authenticated(token).await
    }

    async fn authenticate_admin(&self, token: Option<&str>) -> Result<Caller> {
        self.gate.require_role(token, Role::Admin).await
    }

    async fn current_user(&self, caller: &Caller) -> Result<UserProfile> {
        Ok(self.caller_user(caller).await?.into())
    }

    async fn channel_status(&self, caller: &Caller) -> Result<ChannelStatus> {
        let user = self.caller_user(caller).await?;
        let channel = self.config.bonus_channel.clone();

        // A granted bonus implies membership at claim time.
        if user.channel_bonus_received {
            return Ok(ChannelStatus {
                channel,
                is_member: true,
                can_claim: false,
            });
        }

        let is_member = self.membership.is_member(&user.telegram_id).await?;
        Ok(ChannelStatus {
            channel,
            is_member,
            can_claim: is_member,
        })
    }

    async fn claim_bonus(&self, caller: &Caller) -> Result<User> {
        let user = self.caller_user(caller).await?;
        if user.channel_bonus_received {
            return Err(ControlError::Conflict("bonus already claimed".to_string()));
        }
        if !self.membership.is_member(&user.telegram_id).await? {
            return Err(ControlError::Conflict(format!(
                "subscribe to {} to claim the bonus",
                self.config.bonus_channel
            )));
        }

        let user = self.repo.grant_bonus(user.id, self.config.bonus_calls).await?;
        tracing::info!(user_id = %user.id, calls = self.config.bonus_calls, "Granted channel bonus");
        Ok(user)
    }

    // =========================================================================
    // Agents
    // =========================================================================

    async fn list_agents(&self, caller: &Caller) -> Result<Vec<Agent>> {
        Ok(self.repo.list_agents(caller.user_id).await?)
    }

    async fn create_agent(&self, caller: &Caller, input: NewAgent) -> Result<Agent> {
        require_text(&input.name, "name")?;
        require_text(&input.voice_api_key, "voiceApiKey")?;
        require_text(&input.voice_agent_id, "voiceAgentId")?;

        let count = self.repo.count_agents(caller.user_id).await?;
        check_create_agent(caller.role, count).inspect_err(|e| {
            tracing::info!(user_id = %caller.user_id, error = %e, "Agent quota reached");
        })?;

        Ok(self.repo.create_agent(caller.user_id, &input).await?)
    }

    async fn update_agent(&self, caller: &Caller, id: AgentId, patch: AgentPatch) -> Result<Agent> {
        if let Some(name) = &patch.name {
            require_text(name, "name")?;
        }
        self.visible_agent(caller, id).await?;
        self.repo
            .update_agent(id, &patch)
            .await
            .map_err(|e| not_found(e, format!("agent {id}")))
    }

    async fn delete_agent(&self, caller: &Caller, id: AgentId) -> Result<()> {
        if !caller.limits().can_delete_agents {
            return Err(ControlError::Forbidden(
                "only administrators can delete agents".to_string(),
            ));
        }
        self.repo.delete_agent(id).await?;
        Ok(())
    }

    async fn check_connection(
        &self,
        caller: &Caller,
        check: ConnectionCheck,
    ) -> Result<ConnectionReport> {
        require_text(&check.voice_api_key, "voiceApiKey")?;
        require_text(&check.voice_agent_id, "voiceAgentId")?;
        if let Some(id) = check.agent_id {
            self.visible_agent(caller, id).await?;
        }

        let info = self
            .voice
            .fetch_agent(check.voice_api_key.trim(), check.voice_agent_id.trim())
            .await?;

        let agent = match check.agent_id {
            Some(id) => {
                let patch = AgentPatch {
                    variables: Some(info.variables.clone()),
                    ..AgentPatch::default()
                };
                let agent = self
                    .repo
                    .update_agent(id, &patch)
                    .await
                    .map_err(|e| not_found(e, format!("agent {id}")))?;
                tracing::info!(
                    agent_id = %id,
                    variables = info.variables.len(),
                    "Stored variables from voice platform"
                );
                Some(agent)
            }
            None => None,
        };

        Ok(ConnectionReport {
            success: true,
            agent_name: info.name,
            variables: info.variables,
            agent,
        })
    }

    // =========================================================================
    // Batches and calls
    // =========================================================================

    async fn list_batches(&self, caller: &Caller) -> Result<Vec<Batch>> {
        Ok(self.repo.list_batches(caller.user_id).await?)
    }

    async fn create_batch(&self, caller: &Caller, input: NewBatch) -> Result<Batch> {
        require_text(&input.name, "name")?;

        let agent = self.visible_agent(caller, input.agent_id).await?;
        let summary = dataset::validate(&input.dataset, &agent.variable_names())?;
        check_create_batch(caller.role, summary.record_count)?;

        let batch = self.repo.create_batch(caller.user_id, &input).await?;
        tracing::info!(
            batch_id = %batch.id,
            records = summary.record_count,
            format = %summary.format,
            "Accepted dataset"
        );
        Ok(batch)
    }

    async fn validate_dataset(&self, caller: &Caller, check: DatasetCheck) -> Result<DatasetReport> {
        let summary = match check.agent_id {
            Some(id) => {
                let agent = self.visible_agent(caller, id).await?;
                dataset::validate(&check.dataset, &agent.variable_names())?
            }
            None => dataset::validate::<&str>(&check.dataset, &[])?,
        };

        let max_records = caller.limits().max_batch_records;
        let within_limit = max_records.allows(summary.record_count);
        Ok(DatasetReport {
            summary,
            max_records,
            within_limit,
        })
    }

    async fn get_batch(&self, caller: &Caller, id: BatchId) -> Result<BatchDetail> {
        let batch = self
            .repo
            .get_batch(id)
            .await
            .map_err(|e| not_found(e, format!("batch {id}")))?;
        if batch.user_id != caller.user_id && !caller.is_admin() {
            return Err(ControlError::NotFound(format!("batch {id}")));
        }
        let calls = self.repo.list_calls_by_batch(id).await?;
        Ok(BatchDetail { batch, calls })
    }

    async fn list_calls(&self, caller: &Caller) -> Result<Vec<Call>> {
        Ok(self.repo.list_calls_for_owner(caller.user_id).await?)
    }

    // =========================================================================
    // Settings
    // =========================================================================

    async fn get_settings(&self, caller: &Caller) -> Result<Option<Settings>> {
        Ok(self.repo.get_settings(caller.user_id).await?)
    }

    async fn save_settings(&self, caller: &Caller, update: SettingsUpdate) -> Result<Settings> {
        Ok(self.repo.upsert_settings(caller.user_id, &update).await?)
    }

    // =========================================================================
    // Administration
    // =========================================================================

    async fn list_users(&self, caller: &Caller) -> Result<Vec<User>> {
        Self::require_admin(caller)?;
        Ok(self.repo.list_users().await?)
    }

    async fn set_user_role(&self, caller: &Caller, user_id: UserId, role: Role) -> Result<User> {
        Self::require_admin(caller)?;
        let user = self
            .repo
            .update_user_role(user_id, role)
            .await
            .map_err(|e| not_found(e, format!("user {user_id}")))?;
        tracing::info!(user_id = %user_id, role = %role, admin_id = %caller.user_id, "Changed user role");
        Ok(user)
    }

    async fn list_user_agents(&self, caller: &Caller, user_id: UserId) -> Result<Vec<Agent>> {
        Self::require_admin(caller)?;
        Ok(self.repo.list_agents(user_id).await?)
    }

    async fn admin_update_agent(
        &self,
        caller: &Caller,
        id: AgentId,
        patch: AgentPatch,
    ) -> Result<Agent> {
        Self::require_admin(caller)?;
        self.update_agent(caller, id, patch).await
    }

    async fn admin_delete_agent(&self, caller: &Caller, id: AgentId) -> Result<()> {
        Self::require_admin(caller)?;
        self.repo.delete_agent(id).await?;
        tracing::info!(agent_id = %id, admin_id = %caller.user_id, "Admin deleted agent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use callboard_auth::{compute_hash, MockMembership, TelegramVerifier, UnverifiedLogin};
    use callboard_core::DatasetError;
    use callboard_store::{AgentVariable, MemoryRecordStore, RocksSessionStore};
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::voice::{MockVoicePlatform, VoiceAgentInfo};

    const BOT_TOKEN: &str = "123:test";

    type Service = CampaignService<MemoryRecordStore, RocksSessionStore>;

    struct Fixture {
        service: Service,
        membership: Arc<MockMembership>,
        voice: Arc<MockVoicePlatform>,
        _dir: TempDir,
    }

    fn setup_with(verifier: Arc<dyn LoginVerifier>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let sessions = Arc::new(RocksSessionStore::open(dir.path()).unwrap());
        let repo = Arc::new(Repository::new(MemoryRecordStore::new()));
        let membership = Arc::new(MockMembership::new());
        let voice = Arc::new(MockVoicePlatform::new());
        let service = CampaignService::new(
            repo,
            sessions,
            verifier,
            membership.clone(),
            voice.clone(),
            ControlConfig::default(),
        );
        Fixture {
            service,
            membership,
            voice,
            _dir: dir,
        }
    }

    fn setup() -> Fixture {
        setup_with(Arc::new(UnverifiedLogin))
    }

    fn widget_login(id: i64) -> TelegramLogin {
        TelegramLogin {
            id,
            first_name: Some("Test".to_string()),
            last_name: None,
            username: Some(format!("user{id}")),
            photo_url: None,
            auth_date: Utc::now().timestamp(),
            hash: String::new(),
        }
    }

    async fn login_as(f: &Fixture, telegram_id: i64, role: Role) -> Caller {
        let outcome = f.service.login(&widget_login(telegram_id)).await.unwrap();
        if role != Role::User {
            f.service
                .repo()
                .update_user_role(outcome.user.id, role)
                .await
                .unwrap();
        }
        f.service
            .authenticate(Some(outcome.session.token.as_str()))
            .await
            .unwrap()
    }

    fn new_agent(name: &str, variables: &[&str]) -> NewAgent {
        NewAgent {
            name: name.to_string(),
            voice_api_key: "sk".to_string(),
            voice_agent_id: "agent".to_string(),
            phone_number: None,
            application_id: None,
            rule_id: None,
            variables: Some(
                variables
                    .iter()
                    .map(|v| AgentVariable {
                        name: (*v).to_string(),
                        value: None,
                    })
                    .collect(),
            ),
            integration_script: None,
        }
    }

    fn new_batch(agent_id: AgentId, dataset: String) -> NewBatch {
        NewBatch {
            agent_id,
            name: "campaign".to_string(),
            dataset,
        }
    }

    fn tabular(rows: usize) -> String {
        let mut text = "phone,name".to_string();
        for i in 0..rows {
            text.push_str(&format!("\n+1{i},n{i}"));
        }
        text
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    #[tokio::test]
    async fn first_login_creates_user_and_second_reuses_it() {
        let f = setup();
        let first = f.service.login(&widget_login(42)).await.unwrap();
        let second = f.service.login(&widget_login(42)).await.unwrap();

        assert_eq!(first.user.id, second.user.id);
        assert_eq!(first.user.role, Role::User);
        assert_eq!(first.user.username.as_deref(), Some("user42"));
        assert_ne!(first.session.token, second.session.token);
        assert_eq!(f.service.repo().list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn forged_login_is_rejected_without_creating_a_user() {
        let f = setup_with(Arc::new(TelegramVerifier::new(BOT_TOKEN)));
        let mut login = widget_login(42);
        login.hash = "00".repeat(32);

        let result = f.service.login(&login).await;
        assert!(matches!(result, Err(ControlError::Auth(_))));
        assert!(f.service.repo().list_users().await.unwrap().is_empty());

        login.hash = compute_hash(&login, BOT_TOKEN).unwrap();
        assert!(f.service.login(&login).await.is_ok());
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let f = setup();
        let outcome = f.service.login(&widget_login(1)).await.unwrap();
        f.service.logout(&outcome.session.token).await.unwrap();
        assert!(matches!(
            f.service.authenticate(Some(outcome.session.token.as_str())).await,
            Err(ControlError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn current_user_carries_limits() {
        let f = setup();
        let caller = login_as(&f, 1, Role::Guest).await;
        let profile = f.service.current_user(&caller).await.unwrap();
        assert_eq!(profile.user.role, Role::Guest);
        assert_eq!(profile.limits.max_agents.max(), Some(1));
    }

    // =========================================================================
    // Bonus
    // =========================================================================

    #[tokio::test]
    async fn bonus_requires_membership_and_is_granted_once() {
        let f = setup();
        let caller = login_as(&f, 5, Role::User).await;

        let status = f.service.channel_status(&caller).await.unwrap();
        assert!(!status.is_member);
        assert!(!status.can_claim);
        assert!(matches!(
            f.service.claim_bonus(&caller).await,
            Err(ControlError::Conflict(_))
        ));

        f.membership.add_member("5");
        assert!(f.service.channel_status(&caller).await.unwrap().can_claim);

        let user = f.service.claim_bonus(&caller).await.unwrap();
        assert_eq!(user.usage, 50);
        assert!(user.channel_bonus_received);

        assert!(matches!(
            f.service.claim_bonus(&caller).await,
            Err(ControlError::Conflict(_))
        ));
        let status = f.service.channel_status(&caller).await.unwrap();
        assert!(status.is_member);
        assert!(!status.can_claim);
        assert_eq!(f.service.current_user(&caller).await.unwrap().user.usage, 50);
    }

    // =========================================================================
    // Agents
    // =========================================================================

    #[tokio::test]
    async fn agent_quota_is_checked_live() {
        let f = setup();
        let caller = login_as(&f, 1, Role::User).await;

        f.service.create_agent(&caller, new_agent("a", &[])).await.unwrap();
        f.service.create_agent(&caller, new_agent("b", &[])).await.unwrap();
        let err = f
            .service
            .create_agent(&caller, new_agent("c", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::QuotaExceeded(ref q) if q.limit == 2 && q.attempted == 3));
        assert_eq!(f.service.list_agents(&caller).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn admin_has_no_agent_limit() {
        let f = setup();
        let admin = login_as(&f, 1, Role::Admin).await;
        for i in 0..5 {
            f.service
                .create_agent(&admin, new_agent(&format!("a{i}"), &[]))
                .await
                .unwrap();
        }
        assert_eq!(f.service.list_agents(&admin).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn empty_agent_name_is_invalid() {
        let f = setup();
        let caller = login_as(&f, 1, Role::User).await;
        assert!(matches!(
            f.service.create_agent(&caller, new_agent("  ", &[])).await,
            Err(ControlError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn other_users_agents_look_missing() {
        let f = setup();
        let owner = login_as(&f, 1, Role::User).await;
        let other = login_as(&f, 2, Role::User).await;
        let agent = f.service.create_agent(&owner, new_agent("a", &[])).await.unwrap();

        let patch = AgentPatch {
            name: Some("stolen".to_string()),
            ..AgentPatch::default()
        };
        assert!(matches!(
            f.service.update_agent(&other, agent.id, patch.clone()).await,
            Err(ControlError::NotFound(_))
        ));

        let updated = f.service.update_agent(&owner, agent.id, patch).await.unwrap();
        assert_eq!(updated.name, "stolen");
    }

    #[tokio::test]
    async fn only_admin_deletes_agents() {
        let f = setup();
        let owner = login_as(&f, 1, Role::Subscriber).await;
        let admin = login_as(&f, 2, Role::Admin).await;
        let agent = f.service.create_agent(&owner, new_agent("a", &[])).await.unwrap();

        assert!(matches!(
            f.service.delete_agent(&owner, agent.id).await,
            Err(ControlError::Forbidden(_))
        ));
        f.service.delete_agent(&admin, agent.id).await.unwrap();
        assert!(f.service.list_agents(&owner).await.unwrap().is_empty());

        // Unknown IDs are a no-op.
        f.service.delete_agent(&admin, AgentId::new(999)).await.unwrap();
    }

    fn platform_agent(variables: &[&str]) -> VoiceAgentInfo {
        VoiceAgentInfo {
            name: Some("Sales bot".to_string()),
            variables: variables
                .iter()
                .map(|v| AgentVariable {
                    name: (*v).to_string(),
                    value: None,
                })
                .collect(),
        }
    }

    fn connection(agent_id: Option<AgentId>) -> ConnectionCheck {
        ConnectionCheck {
            voice_api_key: "sk".to_string(),
            voice_agent_id: "agent".to_string(),
            agent_id,
        }
    }

    #[tokio::test]
    async fn check_connection_reports_platform_variables() {
        let f = setup();
        let caller = login_as(&f, 1, Role::User).await;
        f.voice.add_agent("sk", "agent", platform_agent(&["name", "city"]));

        let report = f.service.check_connection(&caller, connection(None)).await.unwrap();

        assert!(report.success);
        assert_eq!(report.agent_name.as_deref(), Some("Sales bot"));
        let names: Vec<&str> = report.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["name", "city"]);
        assert!(report.agent.is_none());
    }

    #[tokio::test]
    async fn check_connection_stores_variables_used_by_batch_validation() {
        let f = setup();
        let caller = login_as(&f, 1, Role::User).await;
        let agent = f.service.create_agent(&caller, new_agent("a", &[])).await.unwrap();
        f.voice.add_agent("sk", "agent", platform_agent(&["city"]));

        let report = f
            .service
            .check_connection(&caller, connection(Some(agent.id)))
            .await
            .unwrap();
        let stored = report.agent.unwrap();
        assert_eq!(stored.variable_names(), vec!["city"]);

        let result = f
            .service
            .create_batch(&caller, new_batch(agent.id, tabular(2)))
            .await;
        assert!(matches!(
            result,
            Err(ControlError::Dataset(DatasetError::MissingVariables { .. }))
        ));
    }

    #[tokio::test]
    async fn check_connection_with_refused_key_changes_nothing() {
        let f = setup();
        let caller = login_as(&f, 1, Role::User).await;
        let agent = f.service.create_agent(&caller, new_agent("a", &["name"])).await.unwrap();

        let result = f.service.check_connection(&caller, connection(Some(agent.id))).await;
        assert!(matches!(result, Err(ControlError::ConnectionRejected(_))));

        let listed = f.service.list_agents(&caller).await.unwrap();
        assert_eq!(listed[0].variable_names(), vec!["name"]);
    }

    #[tokio::test]
    async fn check_connection_on_another_users_agent_is_not_found() {
        let f = setup();
        let owner = login_as(&f, 1, Role::User).await;
        let other = login_as(&f, 2, Role::User).await;
        let agent = f.service.create_agent(&owner, new_agent("a", &[])).await.unwrap();
        f.voice.add_agent("sk", "agent", platform_agent(&["city"]));

        let result = f.service.check_connection(&other, connection(Some(agent.id))).await;
        assert!(matches!(result, Err(ControlError::NotFound(_))));
    }

    // =========================================================================
    // Batches
    // =========================================================================

    #[tokio::test]
    async fn batch_at_the_limit_succeeds_and_one_more_fails() {
        let f = setup();
        let caller = login_as(&f, 1, Role::Guest).await;
        let agent = f.service.create_agent(&caller, new_agent("a", &["name"])).await.unwrap();

        let batch = f
            .service
            .create_batch(&caller, new_batch(agent.id, tabular(10)))
            .await
            .unwrap();
        assert_eq!(batch.status, callboard_store::BatchStatus::Pending);

        let err = f
            .service
            .create_batch(&caller, new_batch(agent.id, tabular(11)))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::QuotaExceeded(ref q) if q.limit == 10 && q.attempted == 11));
        assert_eq!(f.service.list_batches(&caller).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn batch_dataset_must_carry_agent_variables() {
        let f = setup();
        let caller = login_as(&f, 1, Role::User).await;
        let agent = f
            .service
            .create_agent(&caller, new_agent("a", &["name", "city"]))
            .await
            .unwrap();

        let err = f
            .service
            .create_batch(&caller, new_batch(agent.id, tabular(2)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "missing_variables");
        assert!(err.to_string().contains("city"));

        let err = f
            .service
            .create_batch(&caller, new_batch(agent.id, r#"[{"name":"A"}]"#.to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "missing_phone_field");
    }

    #[tokio::test]
    async fn batch_requires_an_existing_visible_agent() {
        let f = setup();
        let owner = login_as(&f, 1, Role::User).await;
        let other = login_as(&f, 2, Role::User).await;
        let agent = f.service.create_agent(&owner, new_agent("a", &[])).await.unwrap();

        assert!(matches!(
            f.service.create_batch(&owner, new_batch(AgentId::new(99), tabular(1))).await,
            Err(ControlError::NotFound(_))
        ));
        assert!(matches!(
            f.service.create_batch(&other, new_batch(agent.id, tabular(1))).await,
            Err(ControlError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn advisory_check_reports_limit_instead_of_failing() {
        let f = setup();
        let caller = login_as(&f, 1, Role::Guest).await;

        let report = f
            .service
            .validate_dataset(
                &caller,
                DatasetCheck {
                    agent_id: None,
                    dataset: tabular(20),
                },
            )
            .await
            .unwrap();
        assert_eq!(report.summary.record_count, 20);
        assert!(!report.within_limit);
        assert_eq!(report.max_records.max(), Some(10));
    }

    #[tokio::test]
    async fn batch_detail_includes_calls_and_hides_other_users() {
        let f = setup();
        let owner = login_as(&f, 1, Role::User).await;
        let other = login_as(&f, 2, Role::User).await;
        let agent = f.service.create_agent(&owner, new_agent("a", &[])).await.unwrap();
        let batch = f
            .service
            .create_batch(&owner, new_batch(agent.id, tabular(1)))
            .await
            .unwrap();

        let mut fields = callboard_store::Fields::new();
        fields.insert("callId".into(), 1.into());
        fields.insert("batchId".into(), batch.id.get().into());
        fields.insert("phoneNumber".into(), "+10".into());
        fields.insert("status".into(), "completed".into());
        f.service.repo().store().insert_raw("Calls", fields);

        let detail = f.service.get_batch(&owner, batch.id).await.unwrap();
        assert_eq!(detail.calls.len(), 1);
        assert_eq!(f.service.list_calls(&owner).await.unwrap().len(), 1);

        assert!(matches!(
            f.service.get_batch(&other, batch.id).await,
            Err(ControlError::NotFound(_))
        ));
        assert!(f.service.list_calls(&other).await.unwrap().is_empty());
    }

    // =========================================================================
    // Settings and administration
    // =========================================================================

    #[tokio::test]
    async fn settings_round_trip() {
        let f = setup();
        let caller = login_as(&f, 1, Role::User).await;
        assert!(f.service.get_settings(&caller).await.unwrap().is_none());

        let update = SettingsUpdate {
            webhook_url: Some("https://hooks.example/x".to_string()),
            ..SettingsUpdate::default()
        };
        let saved = f.service.save_settings(&caller, update).await.unwrap();
        assert_eq!(saved.id, caller.user_id);

        let loaded = f.service.get_settings(&caller).await.unwrap().unwrap();
        assert_eq!(loaded.webhook_url.as_deref(), Some("https://hooks.example/x"));
    }

    #[tokio::test]
    async fn admin_operations_require_admin() {
        let f = setup();
        let user = login_as(&f, 1, Role::User).await;
        let admin = login_as(&f, 2, Role::Admin).await;

        assert!(matches!(
            f.service.list_users(&user).await,
            Err(ControlError::Forbidden(_))
        ));
        assert_eq!(f.service.list_users(&admin).await.unwrap().len(), 2);

        let promoted = f
            .service
            .set_user_role(&admin, user.user_id, Role::Subscriber)
            .await
            .unwrap();
        assert_eq!(promoted.role, Role::Subscriber);

        assert!(matches!(
            f.service.set_user_role(&admin, UserId::new(404), Role::Guest).await,
            Err(ControlError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn admin_manages_any_agent() {
        let f = setup();
        let owner = login_as(&f, 1, Role::User).await;
        let admin = login_as(&f, 2, Role::Admin).await;
        let agent = f.service.create_agent(&owner, new_agent("a", &[])).await.unwrap();

        let agents = f.service.list_user_agents(&admin, owner.user_id).await.unwrap();
        assert_eq!(agents.len(), 1);

        let patch = AgentPatch {
            phone_number: Some("+100".to_string()),
            ..AgentPatch::default()
        };
        let updated = f.service.admin_update_agent(&admin, agent.id, patch).await.unwrap();
        assert_eq!(updated.phone_number.as_deref(), Some("+100"));
        assert_eq!(updated.user_id, owner.user_id);

        f.service.admin_delete_agent(&admin, agent.id).await.unwrap();
        assert!(f.service.list_agents(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn storage_outage_surfaces_as_unavailable() {
        let f = setup();
        let caller = login_as(&f, 1, Role::User).await;
        f.service.repo().store().set_unavailable(true);

        let err = f.service.list_agents(&caller).await.unwrap_err();
        assert_eq!(err.http_status_code(), 503);
        assert_eq!(err.code(), "storage_unavailable");
    }
}
