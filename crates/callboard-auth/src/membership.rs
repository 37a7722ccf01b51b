//! Channel membership checks through the Telegram Bot API.
//!
//! ```text
//! ChannelMembership::is_member("42")
//!     └──▶ GET {api}/bot{token}/getChatMember?chat_id=@channel&user_id=42
//!              └──▶ {"ok": true, "result": {"status": "member", ...}}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AuthError, Result};

/// Default Telegram Bot API root.
pub const DEFAULT_BOT_API_URL: &str = "https://api.telegram.org";

/// A user's status in a chat, as reported by `getChatMember`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    /// Channel owner.
    Creator,
    /// Channel administrator.
    Administrator,
    /// Regular subscriber.
    Member,
    /// Restricted user.
    Restricted,
    /// Not subscribed anymore.
    Left,
    /// Banned.
    Kicked,
    /// A status this client does not know.
    #[serde(other)]
    Unknown,
}

impl MemberStatus {
    /// Whether the status counts as being subscribed.
    #[must_use]
    pub const fn is_member(self) -> bool {
        matches!(self, Self::Creator | Self::Administrator | Self::Member)
    }
}

/// Trait for checking whether a Telegram user follows the bonus channel.
#[async_trait]
pub trait ChannelMembership: Send + Sync {
    /// Whether `telegram_id` is currently subscribed.
    ///
    /// # Errors
    ///
    /// Returns an error if the Bot API cannot be reached or is not configured.
    async fn is_member(&self, telegram_id: &str) -> Result<bool>;
}

/// Settings for [`TelegramBotClient`].
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// API root, e.g. [`DEFAULT_BOT_API_URL`].
    pub api_url: String,
    /// Bot token; the bot must be an administrator of the channel.
    pub bot_token: String,
    /// Channel to check, e.g. `@nartautomates`.
    pub channel: String,
}

impl BotConfig {
    /// Settings for the public Bot API.
    #[must_use]
    pub fn new(bot_token: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_BOT_API_URL.to_string(),
            bot_token: bot_token.into(),
            channel: channel.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_url.trim_end_matches('/'),
            self.bot_token,
            method
        )
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<ChatMember>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMember {
    status: MemberStatus,
}

/// Bot API client answering membership questions for one channel.
pub struct TelegramBotClient {
    config: BotConfig,
    client: reqwest::Client,
}

impl TelegramBotClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the HTTP client cannot be built.
    pub fn new(config: BotConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::Internal(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    /// The channel this client checks.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.config.channel
    }
}

#[async_trait]
impl ChannelMembership for TelegramBotClient {
    async fn is_member(&self, telegram_id: &str) -> Result<bool> {
        let response = self
            .client
            .get(self.config.method_url("getChatMember"))
            .query(&[
                ("chat_id", self.config.channel.as_str()),
                ("user_id", telegram_id),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Upstream(format!("request failed: {e}")))?;

        // Errors such as "user not found" come back as non-2xx with ok=false.
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Upstream(format!("invalid response: {e}")))?;

        if !body.ok {
            tracing::warn!(
                telegram_id,
                channel = %self.config.channel,
                description = body.description.as_deref().unwrap_or_default(),
                "getChatMember refused"
            );
            return Ok(false);
        }

        Ok(body.result.is_some_and(|member| member.status.is_member()))
    }
}

/// Membership checks for deployments without a bot token. Always fails.
#[derive(Debug, Default)]
pub struct MembershipUnavailable;

#[async_trait]
impl ChannelMembership for MembershipUnavailable {
    async fn is_member(&self, _telegram_id: &str) -> Result<bool> {
        Err(AuthError::NotConfigured(
            "TELEGRAM_BOT_TOKEN is not set".to_string(),
        ))
    }
}

/// A membership source with a fixed member list, for tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockMembership {
    members: parking_lot::Mutex<std::collections::HashSet<String>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockMembership {
    /// Create a source with no members.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `telegram_id` as subscribed.
    pub fn add_member(&self, telegram_id: impl Into<String>) {
        self.members.lock().insert(telegram_id.into());
    }

    /// Mark `telegram_id` as unsubscribed.
    pub fn remove_member(&self, telegram_id: &str) {
        self.members.lock().remove(telegram_id);
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl ChannelMembership for MockMembership {
    async fn is_member(&self, telegram_id: &str) -> Result<bool> {
        Ok(self.members.lock().contains(telegram_id))
    }
}
