//! Session-based access control.
//!
//! ```text
//!   bearer token ──blake3──▶ SessionKey ──▶ SessionStore ──▶ Session{user_id, expires_at}
//!                                                               │
//!                                            Repository::get_user ◀┘ ──▶ Caller{user_id, role}
//! ```
//!
//! Only token digests are stored. Expired sessions are treated as absent and
//! removed when next looked up.

use std::sync::Arc;

use callboard_core::{Role, UserId};
use callboard_store::{RecordStore, Repository, Session, SessionKey, SessionStore, StoreError};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{ControlError, Result};
use crate::types::{Caller, IssuedSession};

/// Resolves bearer tokens to callers and manages sessions.
pub struct AccessGate<R: RecordStore, S: SessionStore> {
    repo: Arc<Repository<R>>,
    sessions: Arc<S>,
    ttl: chrono::Duration,
}

impl<R: RecordStore, S: SessionStore> AccessGate<R, S> {
    /// Create a gate issuing sessions valid for `ttl`.
    #[must_use]
    pub fn new(repo: Arc<Repository<R>>, sessions: Arc<S>, ttl: chrono::Duration) -> Self {
        Self {
            repo,
            sessions,
            ttl,
        }
    }

    /// The session store.
    #[must_use]
    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    /// Resolve a bearer token to the caller it authenticates.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Unauthorized` if the token is missing, unknown, or
    /// expired, or if its user no longer resolves. Storage failures other than a
    /// missing user are passed through.
    pub async fn require_authenticated(&self, token: Option<&str>) -> Result<Caller> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ControlError::Unauthorized("missing session token".to_string()))?;

        let key = SessionKey::from_token(token);
        let session = self
            .sessions
            .get_session(&key)?
            .ok_or_else(|| ControlError::Unauthorized("unknown session".to_string()))?;

        if session.is_expired(Utc::now()) {
            self.sessions.delete_session(&key)?;
            tracing::debug!(user_id = %session.user_id, "Removed expired session");
            return Err(ControlError::Unauthorized("session expired".to_string()));
        }

        match self.repo.get_user(session.user_id).await {
            Ok(user) => Ok(Caller {
                user_id: user.id,
                role: user.role,
            }),
            Err(StoreError::NotFound) => {
                tracing::warn!(user_id = %session.user_id, "Session refers to an unknown user");
                Err(ControlError::Unauthorized("user not found".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a bearer token and require an exact role.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Unauthorized` as [`require_authenticated`](Self::require_authenticated)
    /// does, then `ControlError::Forbidden` if the caller holds another role.
    pub async fn require_role(&self, token: Option<&str>, role: Role) -> Result<Caller> {
        let caller = self.require_authenticated(token).await?;
        if caller.role != role {
            return Err(ControlError::Forbidden(format!("requires role {role}")));
        }
        Ok(caller)
    }

    /// Open a session for `user_id` and return its token.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be stored.
    pub fn open_session(&self, user_id: UserId) -> Result<IssuedSession> {
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let now = Utc::now();
        let session = Session {
            user_id,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions
            .put_session(&SessionKey::from_token(&token), &session)?;

        tracing::info!(user_id = %user_id, expires_at = %session.expires_at, "Opened session");

        Ok(IssuedSession {
            token,
            expires_at: session.expires_at,
        })
    }

    /// Close the session behind `token`. Unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub fn close_session(&self, token: &str) -> Result<()> {
        self.sessions
            .delete_session(&SessionKey::from_token(token.trim()))?;
        Ok(())
    }

    /// Remove every session expired at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let purged = self.sessions.purge_expired(now)?;
        if purged > 0 {
            tracing::info!(purged, "Purged expired sessions");
        }
        Ok(purged)
    }
}
