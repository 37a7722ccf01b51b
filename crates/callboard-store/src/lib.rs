//! Storage layer for callboard.
//!
//! Entities live in an external, spreadsheet-style record store whose records have
//! opaque string handles and which only supports formula-filtered scans. This crate
//! presents that store as a conventional integer-keyed repository.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   Control plane  │────▶│    Repository    │
//! └──────────────────┘     └──┬────────────┬──┘
//!                             │            │
//!                    ┌────────▼───────┐ ┌──▼───────────────┐
//!                    │  IdentityMap   │ │  RecordStore     │
//!                    │  (ID ⇄ handle) │ │  (trait)         │
//!                    └────────────────┘ └──┬────────────┬──┘
//!                                          │            │
//!                             ┌────────────▼───┐ ┌──────▼───────────┐
//!                             │ AirtableClient │ │ MemoryRecordStore│
//!                             └────────────────┘ └──────────────────┘
//! ```
//!
//! Login sessions are kept locally in `RocksDB` ([`RocksSessionStore`]).
//!
//! # Example
//!
//! ```no_run
//! use callboard_store::{MemoryRecordStore, NewUser, Repository};
//!
//! # async fn example() -> Result<(), callboard_store::StoreError> {
//! let repo = Repository::new(MemoryRecordStore::new());
//! repo.load_identities().await;
//!
//! let user = repo
//!     .create_user(&NewUser { telegram_id: "12345".into(), username: None })
//!     .await?;
//! let agents = repo.list_agents(user.id).await?;
//! assert!(agents.is_empty());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod airtable;
pub mod convert;
pub mod error;
pub mod identity;
pub mod memory;
pub mod record;
pub mod repo;
pub mod schema;
pub mod session;
pub mod types;

pub use airtable::{AirtableClient, AirtableConfig};
pub use convert::{Entity, Owned};
pub use error::{Result, StoreError};
pub use identity::IdentityMap;
pub use memory::MemoryRecordStore;
pub use record::{Fields, Filter, Record, RecordHandle, RecordStore, ScanQuery, Sort};
pub use repo::Repository;
pub use schema::EntityKind;
pub use session::{RocksSessionStore, Session, SessionKey, SessionStore};
pub use types::{
    Agent, AgentPatch, AgentVariable, Batch, BatchStatus, Call, NewAgent, NewBatch, NewUser,
    Provider, Settings, SettingsUpdate, User,
};
