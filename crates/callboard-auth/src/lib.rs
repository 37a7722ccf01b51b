//! Telegram authentication for callboard.
//!
//! This crate provides:
//!
//! - Login Widget signature and freshness verification
//! - Channel membership checks through the Bot API
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   Control plane  │────▶│  LoginVerifier   │──▶ TelegramVerifier (HMAC)
//! │                  │     │  (trait)         │──▶ UnverifiedLogin (no bot token)
//! │                  │     └──────────────────┘
//! │                  │     ┌──────────────────┐
//! │                  │────▶│ ChannelMembership│──▶ TelegramBotClient ──HTTPS──▶ Bot API
//! └──────────────────┘     │  (trait)         │──▶ MembershipUnavailable
//!                          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use callboard_auth::{LoginVerifier, TelegramLogin, TelegramVerifier};
//!
//! # fn example(payload: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let verifier = TelegramVerifier::new("123456:bot-token");
//! let login: TelegramLogin = serde_json::from_str(payload)?;
//! let verified = verifier.verify(&login)?;
//!
//! println!("Telegram ID: {}", verified.telegram_id);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod membership;
pub mod telegram;

pub use error::{AuthError, Result};
pub use membership::{
    BotConfig, ChannelMembership, MemberStatus, MembershipUnavailable, TelegramBotClient,
    DEFAULT_BOT_API_URL,
};
pub use telegram::{
    compute_hash, verify_login, LoginVerifier, TelegramLogin, TelegramVerifier, UnverifiedLogin,
    VerifiedLogin, DEFAULT_MAX_AUTH_AGE_SECONDS,
};

#[cfg(any(test, feature = "test-utils"))]
pub use membership::MockMembership;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_status_codes() {
        assert_eq!(AuthError::InvalidSignature.http_status_code(), 401);
        assert_eq!(AuthError::Expired.http_status_code(), 401);
        assert_eq!(AuthError::InvalidPayload("x".into()).http_status_code(), 400);
        assert_eq!(AuthError::Upstream("x".into()).http_status_code(), 502);
        assert_eq!(AuthError::NotConfigured("x".into()).http_status_code(), 503);
    }

    #[test]
    fn auth_error_retriable() {
        assert!(AuthError::Expired.is_retriable());
        assert!(AuthError::Upstream("timeout".into()).is_retriable());
        assert!(!AuthError::InvalidSignature.is_retriable());
        assert!(!AuthError::NotConfigured("x".into()).is_retriable());
    }

    #[test]
    fn bot_config_defaults_to_public_api() {
        let config = BotConfig::new("t", "@c");
        assert_eq!(config.api_url, DEFAULT_BOT_API_URL);
        assert_eq!(config.channel, "@c");
    }
}
