//! Authentication error types.

use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur during authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The login payload's hash does not match its fields.
    #[error("invalid Telegram authentication data")]
    InvalidSignature,

    /// The login payload is older than the accepted window.
    #[error("authentication data is too old, please log in again")]
    Expired,

    /// The login payload is structurally unusable.
    #[error("invalid login payload: {0}")]
    InvalidPayload(String),

    /// A check needs a bot token that was never configured.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// The Telegram Bot API could not be reached or answered garbage.
    #[error("Telegram API error: {0}")]
    Upstream(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Returns `true` if the client may succeed by trying again.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Expired | Self::Upstream(_))
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidSignature | Self::Expired => 401,
            Self::InvalidPayload(_) => 400,
            Self::Upstream(_) => 502,
            Self::NotConfigured(_) => 503,
            Self::Internal(_) => 500,
        }
    }
}
