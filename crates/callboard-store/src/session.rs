//! `RocksDB` session storage.
//!
//! Sessions are keyed by the blake3 digest of the opaque token handed to the
//! client, so a copy of the database never yields usable tokens. Values are CBOR.
//!
//! Column families:
//!
//! - `sessions`: session records, keyed by token digest

use std::path::Path;
use std::sync::Arc;

use callboard_core::UserId;
use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Column family names.
pub mod cf {
    /// Session records, keyed by token digest.
    pub const SESSIONS: &str = "sessions";
}

/// The storage key of a session: the blake3 digest of its token.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey([u8; 32]);

impl SessionKey {
    /// Derive the key for a client token.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        Self(*blake3::hash(token.as_bytes()).as_bytes())
    }

    /// The raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SessionKey({:02x}{:02x}{:02x}{:02x}..)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// A login session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The user this session authenticates.
    pub user_id: UserId,
    /// When the session was opened.
    pub created_at: DateTime<Utc>,
    /// When the session stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session is no longer valid at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Persistent session storage.
pub trait SessionStore: Send + Sync {
    /// Insert or replace a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_session(&self, key: &SessionKey, session: &Session) -> Result<()>;

    /// Get a session, expired or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_session(&self, key: &SessionKey) -> Result<Option<Session>>;

    /// Delete a session. Deleting a missing session is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn delete_session(&self, key: &SessionKey) -> Result<()>;

    /// Delete every session expired at `now`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// RocksDB-backed session store.
pub struct RocksSessionStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksSessionStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(
            cf::SESSIONS,
            Options::default(),
        )];

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(cf::SESSIONS)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {}", cf::SESSIONS)))
    }

    fn serialize(session: &Session) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(session, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    fn deserialize(data: &[u8]) -> Result<Session> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

impl SessionStore for RocksSessionStore {
    fn put_session(&self, key: &SessionKey, session: &Session) -> Result<()> {
        let cf = self.cf()?;
        let value = Self::serialize(session)?;
        self.db
            .put_cf(&cf, key.as_bytes(), value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_session(&self, key: &SessionKey) -> Result<Option<Session>> {
        let cf = self.cf()?;
        self.db
            .get_cf(&cf, key.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn delete_session(&self, key: &SessionKey) -> Result<()> {
        let cf = self.cf()?;
        self.db
            .delete_cf(&cf, key.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let cf = self.cf()?;
        let mut batch = WriteBatch::default();
        let mut purged = 0;

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            // Unreadable entries are dropped as well.
            let expired = match Self::deserialize(&value) {
                Ok(session) => session.is_expired(now),
                Err(_) => true,
            };
            if expired {
                batch.delete_cf(&cf, key);
                purged += 1;
            }
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;

    fn create_test_store() -> (RocksSessionStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksSessionStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn session(user: u64, ttl: Duration) -> Session {
        let now = Utc::now();
        Session {
            user_id: UserId::new(user),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    #[test]
    fn session_crud() {
        let (store, _dir) = create_test_store();
        let key = SessionKey::from_token("token-a");
        let s = session(1, Duration::days(30));

        store.put_session(&key, &s).unwrap();
        assert_eq!(store.get_session(&key).unwrap(), Some(s));

        store.delete_session(&key).unwrap();
        assert!(store.get_session(&key).unwrap().is_none());
        store.delete_session(&key).unwrap();
    }

    #[test]
    fn keys_are_token_digests() {
        let a = SessionKey::from_token("token-a");
        assert_eq!(a, SessionKey::from_token("token-a"));
        assert_ne!(a, SessionKey::from_token("token-b"));
        assert_ne!(&a.as_bytes()[..7], b"token-a");
    }

    #[test]
    fn purge_removes_only_expired() {
        let (store, _dir) = create_test_store();
        let live = SessionKey::from_token("live");
        let dead = SessionKey::from_token("dead");
        store.put_session(&live, &session(1, Duration::days(1))).unwrap();
        store.put_session(&dead, &session(2, Duration::seconds(-1))).unwrap();

        assert_eq!(store.purge_expired(Utc::now()).unwrap(), 1);
        assert!(store.get_session(&live).unwrap().is_some());
        assert!(store.get_session(&dead).unwrap().is_none());
    }

    #[test]
    fn sessions_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let key = SessionKey::from_token("persist");
        {
            let store = RocksSessionStore::open(dir.path()).unwrap();
            store.put_session(&key, &session(4, Duration::days(1))).unwrap();
        }
        let store = RocksSessionStore::open(dir.path()).unwrap();
        assert_eq!(store.get_session(&key).unwrap().unwrap().user_id, UserId::new(4));
    }
}
