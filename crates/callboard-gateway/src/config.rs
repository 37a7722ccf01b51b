//! Gateway configuration types.
//!
//! Configuration is read from the environment at startup. Every variable except
//! the Airtable credentials has a default.

use std::time::Duration;

use callboard_control::ControlConfig;
use callboard_store::AirtableConfig;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable is set to something unparseable.
    #[error("{name} has an invalid value: {value:?}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Configuration for the gateway service.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Airtable personal access token.
    #[serde(default)]
    pub airtable_api_key: Option<String>,

    /// Airtable base holding the entity tables.
    #[serde(default)]
    pub airtable_base_id: Option<String>,

    /// Airtable REST endpoint.
    #[serde(default = "GatewayConfig::default_airtable_api_url")]
    pub airtable_api_url: String,

    /// Directory of the session database.
    #[serde(default = "GatewayConfig::default_session_dir")]
    pub session_dir: String,

    /// Session lifetime in days.
    #[serde(default = "GatewayConfig::default_session_ttl_days")]
    pub session_ttl_days: u32,

    /// Telegram bot token. Without it logins are not verified.
    #[serde(default)]
    pub telegram_bot_token: Option<String>,

    /// Voice platform API root, used for connection checks.
    #[serde(default = "GatewayConfig::default_voice_api_url")]
    pub voice_api_url: String,

    /// Channel whose subscribers may claim the bonus.
    #[serde(default = "GatewayConfig::default_bonus_channel")]
    pub bonus_channel: String,

    /// Calls granted by the bonus.
    #[serde(default = "GatewayConfig::default_bonus_calls")]
    pub bonus_calls: u64,

    /// Allowed CORS origins.
    #[serde(default = "GatewayConfig::default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    fn default_airtable_api_url() -> String {
        callboard_store::airtable::DEFAULT_API_URL.to_string()
    }

    fn default_voice_api_url() -> String {
        callboard_control::DEFAULT_VOICE_API_URL.to_string()
    }

    fn default_session_dir() -> String {
        "/data/callboard-sessions".to_string()
    }

    const fn default_session_ttl_days() -> u32 {
        30
    }

    fn default_bonus_channel() -> String {
        "@nartautomates".to_string()
    }

    const fn default_bonus_calls() -> u64 {
        50
    }

    fn default_cors_origins() -> Vec<String> {
        vec!["*".to_string()]
    }

    const fn default_max_body() -> usize {
        5 * 1024 * 1024 // datasets are uploaded inline
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a numeric variable does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            listen_addr: get("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            airtable_api_key: get("AIRTABLE_API_KEY"),
            airtable_base_id: get("AIRTABLE_BASE_ID"),
            airtable_api_url: get("AIRTABLE_API_URL").unwrap_or(defaults.airtable_api_url),
            session_dir: get("SESSION_DIR").unwrap_or(defaults.session_dir),
            session_ttl_days: parse(
                "SESSION_TTL_DAYS",
                get("SESSION_TTL_DAYS"),
                defaults.session_ttl_days,
            )?,
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN"),
            voice_api_url: get("VOICE_API_URL").unwrap_or(defaults.voice_api_url),
            bonus_channel: get("BONUS_CHANNEL").unwrap_or(defaults.bonus_channel),
            bonus_calls: parse("BONUS_CALLS", get("BONUS_CALLS"), defaults.bonus_calls)?,
            cors_origins: get("CORS_ORIGINS").map_or(defaults.cors_origins, |v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
            max_body_bytes: parse(
                "MAX_BODY_BYTES",
                get("MAX_BODY_BYTES"),
                defaults.max_body_bytes,
            )?,
            request_timeout_seconds: parse(
                "REQUEST_TIMEOUT_SECONDS",
                get("REQUEST_TIMEOUT_SECONDS"),
                defaults.request_timeout_seconds,
            )?,
        })
    }

    /// Airtable connection settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the API key or base ID is unset.
    pub fn airtable(&self) -> Result<AirtableConfig, ConfigError> {
        let api_key = self
            .airtable_api_key
            .clone()
            .ok_or(ConfigError::Missing("AIRTABLE_API_KEY"))?;
        let base_id = self
            .airtable_base_id
            .clone()
            .ok_or(ConfigError::Missing("AIRTABLE_BASE_ID"))?;

        let mut config = AirtableConfig::new(base_id, api_key);
        config.api_url.clone_from(&self.airtable_api_url);
        Ok(config)
    }

    /// Control plane settings derived from this configuration.
    #[must_use]
    pub fn control(&self) -> ControlConfig {
        ControlConfig {
            session_ttl_days: self.session_ttl_days,
            bonus_calls: self.bonus_calls,
            bonus_channel: self.bonus_channel.clone(),
            ..ControlConfig::default()
        }
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn parse<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            airtable_api_key: None,
            airtable_base_id: None,
            airtable_api_url: Self::default_airtable_api_url(),
            session_dir: Self::default_session_dir(),
            session_ttl_days: Self::default_session_ttl_days(),
            telegram_bot_token: None,
            voice_api_url: Self::default_voice_api_url(),
            bonus_channel: Self::default_bonus_channel(),
            bonus_calls: Self::default_bonus_calls(),
            cors_origins: Self::default_cors_origins(),
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn default_config() {
        let config = GatewayConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.session_ttl_days, 30);
        assert_eq!(config.bonus_calls, 50);
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(config.max_body_bytes, 5 * 1024 * 1024);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.telegram_bot_token.is_none());
        assert_eq!(config.voice_api_url, "https://api.elevenlabs.io");
    }

    #[test]
    fn env_overrides() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("LISTEN_ADDR", "127.0.0.1:9000"),
            ("SESSION_TTL_DAYS", "7"),
            ("BONUS_CHANNEL", "@other"),
            ("CORS_ORIGINS", "https://a.example, https://b.example,"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("VOICE_API_URL", "http://voice.local"),
        ]))
        .unwrap();
        assert_eq!(config.voice_api_url, "http://voice.local");
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(config.telegram_bot_token.as_deref(), Some("123:abc"));

        let control = config.control();
        assert_eq!(control.session_ttl(), chrono::Duration::days(7));
        assert_eq!(control.bonus_channel, "@other");
        assert_eq!(control.login_max_age_seconds, 86_400);
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config =
            GatewayConfig::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", " "), ("BONUS_CALLS", "")]))
                .unwrap();
        assert!(config.telegram_bot_token.is_none());
        assert_eq!(config.bonus_calls, 50);
    }

    #[test]
    fn invalid_number_is_rejected() {
        let err = GatewayConfig::from_lookup(lookup(&[("MAX_BODY_BYTES", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "MAX_BODY_BYTES", .. }));
    }

    #[test]
    fn airtable_requires_credentials() {
        let config = GatewayConfig::from_lookup(lookup(&[("AIRTABLE_API_KEY", "key")])).unwrap();
        assert!(matches!(
            config.airtable(),
            Err(ConfigError::Missing("AIRTABLE_BASE_ID"))
        ));

        let config = GatewayConfig::from_lookup(lookup(&[
            ("AIRTABLE_API_KEY", "key"),
            ("AIRTABLE_BASE_ID", "app123"),
            ("AIRTABLE_API_URL", "http://localhost:9999/v0"),
        ]))
        .unwrap();
        let airtable = config.airtable().unwrap();
        assert_eq!(airtable.base_id, "app123");
        assert_eq!(airtable.api_url, "http://localhost:9999/v0");
    }
}
