//! Telegram Login Widget verification.
//!
//! The widget hands the browser a set of profile fields plus `hash`, the hex
//! HMAC-SHA256 of the sorted `key=value` lines of every other field, keyed with
//! the SHA-256 digest of the bot token. Verification recomputes that MAC and
//! rejects payloads older than the freshness window.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AuthError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Default freshness window for `auth_date`, in seconds (one day).
pub const DEFAULT_MAX_AUTH_AGE_SECONDS: i64 = 86_400;

/// Display name used when the widget sends neither a username nor a first name.
pub const ANONYMOUS: &str = "Anonymous";

/// Fields posted by the Telegram Login Widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramLogin {
    /// Telegram user ID.
    pub id: i64,
    /// First name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Last name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Telegram username, without the `@`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Profile photo URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Unix time the widget signed the payload.
    pub auth_date: i64,
    /// Hex HMAC-SHA256 over the other fields.
    pub hash: String,
}

impl TelegramLogin {
    /// The newline-joined, key-sorted `key=value` lines the hash is computed over.
    ///
    /// Absent optional fields are left out.
    #[must_use]
    pub fn data_check_string(&self) -> String {
        let id = self.id.to_string();
        let auth_date = self.auth_date.to_string();
        // Keys in lexicographic order.
        let pairs = [
            ("auth_date", Some(auth_date.as_str())),
            ("first_name", self.first_name.as_deref()),
            ("id", Some(id.as_str())),
            ("last_name", self.last_name.as_deref()),
            ("photo_url", self.photo_url.as_deref()),
            ("username", self.username.as_deref()),
        ];
        pairs
            .iter()
            .filter_map(|(key, value)| value.map(|v| format!("{key}={v}")))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The name a new account is created with.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.username
            .as_deref()
            .or(self.first_name.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or(ANONYMOUS)
            .to_string()
    }
}

/// Identity established from a login payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedLogin {
    /// Telegram user ID as stored on the user record.
    pub telegram_id: String,
    /// Display name for a newly created user.
    pub display_name: String,
}

impl From<&TelegramLogin> for VerifiedLogin {
    fn from(login: &TelegramLogin) -> Self {
        Self {
            telegram_id: login.id.to_string(),
            display_name: login.display_name(),
        }
    }
}

/// Compute the widget hash for `login` under `bot_token`, as lowercase hex.
///
/// The `hash` field of `login` itself is ignored.
///
/// # Errors
///
/// Returns `AuthError::Internal` if the MAC cannot be keyed.
pub fn compute_hash(login: &TelegramLogin, bot_token: &str) -> Result<String> {
    Ok(hex::encode(mac_for(login, bot_token)?.finalize().into_bytes()))
}

fn mac_for(login: &TelegramLogin, bot_token: &str) -> Result<HmacSha256> {
    let secret = Sha256::digest(bot_token.as_bytes());
    let mut mac = <HmacSha256 as Mac>::new_from_slice(&secret)
        .map_err(|e| AuthError::Internal(format!("invalid HMAC key: {e}")))?;
    mac.update(login.data_check_string().as_bytes());
    Ok(mac)
}

/// Check a login payload's signature and freshness at `now` (Unix seconds).
///
/// A payload is fresh while `now - auth_date < max_age_seconds`.
///
/// # Errors
///
/// - `AuthError::InvalidPayload` for a non-positive user ID
/// - `AuthError::InvalidSignature` if the hash does not verify
/// - `AuthError::Expired` if the payload is stale
pub fn verify_login(
    login: &TelegramLogin,
    bot_token: &str,
    now: i64,
    max_age_seconds: i64,
) -> Result<VerifiedLogin> {
    if login.id <= 0 {
        return Err(AuthError::InvalidPayload(format!(
            "invalid Telegram user id: {}",
            login.id
        )));
    }

    let expected = hex::decode(login.hash.trim()).map_err(|_| AuthError::InvalidSignature)?;
    mac_for(login, bot_token)?
        .verify_slice(&expected)
        .map_err(|_| AuthError::InvalidSignature)?;

    if now.saturating_sub(login.auth_date) >= max_age_seconds {
        return Err(AuthError::Expired);
    }

    Ok(VerifiedLogin::from(login))
}

/// Trait for turning a widget payload into a trusted identity.
pub trait LoginVerifier: Send + Sync {
    /// Verify a login payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is forged, stale, or malformed.
    fn verify(&self, login: &TelegramLogin) -> Result<VerifiedLogin>;
}

/// Verifies payloads against a bot token.
pub struct TelegramVerifier {
    bot_token: String,
    max_age_seconds: i64,
}

impl TelegramVerifier {
    /// Create a verifier with the default one-day freshness window.
    #[must_use]
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            max_age_seconds: DEFAULT_MAX_AUTH_AGE_SECONDS,
        }
    }

    /// Override the freshness window.
    #[must_use]
    pub const fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age_seconds = seconds;
        self
    }
}

impl LoginVerifier for TelegramVerifier {
    fn verify(&self, login: &TelegramLogin) -> Result<VerifiedLogin> {
        verify_login(
            login,
            &self.bot_token,
            Utc::now().timestamp(),
            self.max_age_seconds,
        )
        .inspect_err(|e| {
            tracing::warn!(telegram_id = login.id, error = %e, "Rejected Telegram login");
        })
    }
}

/// Accepts every payload without checking it.
///
/// Only for deployments without a bot token. Anyone can log in as anyone.
#[derive(Debug, Default)]
pub struct UnverifiedLogin;

impl LoginVerifier for UnverifiedLogin {
    fn verify(&self, login: &TelegramLogin) -> Result<VerifiedLogin> {
        if login.id <= 0 {
            return Err(AuthError::InvalidPayload(format!(
                "invalid Telegram user id: {}",
                login.id
            )));
        }
        tracing::warn!(telegram_id = login.id, "Accepting unverified Telegram login");
        Ok(VerifiedLogin::from(login))
    }
}
