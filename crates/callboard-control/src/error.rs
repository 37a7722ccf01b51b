//! Error types for the control plane.

use callboard_auth::AuthError;
use callboard_core::DatasetError;
use callboard_store::StoreError;
use thiserror::Error;

use crate::quota::QuotaExceeded;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in control plane operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// No valid session.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller's role does not allow the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The entity does not exist, or is not visible to the caller.
    #[error("{0} not found")]
    NotFound(String),

    /// A role limit would be exceeded.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(#[from] QuotaExceeded),

    /// The uploaded dataset does not fit the agent.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// The request is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The operation conflicts with the entity's current state.
    #[error("{0}")]
    Conflict(String),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[source] StoreError),

    /// Authentication error.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The voice platform refused the credentials or does not know the agent.
    #[error("voice platform connection failed: {0}")]
    ConnectionRejected(String),

    /// An external service could not be reached or answered garbage.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ControlError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound("record".to_string()),
            other => Self::Store(other),
        }
    }
}

impl ControlError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) | Self::QuotaExceeded(_) => 403,
            Self::NotFound(_) => 404,
            Self::Dataset(_) | Self::InvalidInput(_) | Self::ConnectionRejected(_) => 400,
            Self::Conflict(_) => 409,
            Self::Upstream(_) => 502,
            Self::Store(StoreError::Unavailable(_)) => 503,
            Self::Store(_) | Self::Internal(_) => 500,
            Self::Auth(e) => e.http_status_code(),
        }
    }

    /// Machine-readable error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::QuotaExceeded(_) => "quota_exceeded",
            Self::Dataset(DatasetError::InvalidFormat(_)) => "invalid_format",
            Self::Dataset(DatasetError::MissingPhoneField { .. }) => "missing_phone_field",
            Self::Dataset(DatasetError::MissingVariables { .. }) => "missing_variables",
            Self::InvalidInput(_) | Self::Auth(AuthError::InvalidPayload(_)) => "bad_request",
            Self::Conflict(_) => "conflict",
            Self::ConnectionRejected(_) => "connection_failed",
            Self::Store(StoreError::Unavailable(_)) => "storage_unavailable",
            Self::Auth(AuthError::InvalidSignature | AuthError::Expired) => "unauthorized",
            Self::Auth(AuthError::Upstream(_)) | Self::Upstream(_) => "upstream_unavailable",
            Self::Auth(AuthError::NotConfigured(_)) => "not_configured",
            Self::Store(_) | Self::Internal(_) | Self::Auth(AuthError::Internal(_)) => "internal",
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Store(StoreError::Unavailable(_)) | Self::Upstream(_) | Self::Internal(_) => true,
            Self::Auth(e) => e.is_retriable(),
            _ => false,
        }
    }
}
