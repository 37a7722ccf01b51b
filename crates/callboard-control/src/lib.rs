//! Control plane for callboard campaigns.
//!
//! This crate holds the business rules behind every API operation: who the
//! caller is, what their role allows, and whether an uploaded dataset fits the
//! agent it targets. It sits between the HTTP gateway and the storage layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Gateway (HTTP)                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CampaignService                        │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │ AccessGate  │ │   Quotas    │ │  Dataset checks     │    │
//! │  │ (sessions)  │ │  (roles)    │ │  (agent variables)  │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌─────────────┬─────┴───────┬─────────────┐
//!          ▼             ▼             ▼             ▼
//!    ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐
//!    │  Store   │  │ Sessions │  │   Auth   │  │  Voice   │
//!    │(Airtable)│  │ (RocksDB)│  │(Telegram)│  │(platform)│
//!    └──────────┘  └──────────┘  └──────────┘  └──────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use callboard_auth::{MembershipUnavailable, TelegramLogin, TelegramVerifier};
//! use callboard_control::{CampaignControl, CampaignService, ControlConfig, ElevenLabsClient};
//! use callboard_store::{MemoryRecordStore, Repository, RocksSessionStore};
//!
//! # async fn example(login: TelegramLogin) -> Result<(), Box<dyn std::error::Error>> {
//! let repo = Arc::new(Repository::new(MemoryRecordStore::new()));
//! let sessions = Arc::new(RocksSessionStore::open("/tmp/callboard-sessions")?);
//! let control = CampaignService::new(
//!     repo,
//!     sessions,
//!     Arc::new(TelegramVerifier::new("123456:bot-token")),
//!     Arc::new(MembershipUnavailable),
//!     Arc::new(ElevenLabsClient::new("https://api.elevenlabs.io")),
//!     ControlConfig::default(),
//! );
//!
//! let outcome = control.login(&login).await?;
//! let caller = control.authenticate(Some(outcome.session.token.as_str())).await?;
//! println!("Agents: {}", control.list_agents(&caller).await?.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Roles
//!
//! See the [`quota`] module for the per-role limits. Quota checks read live
//! counts and are not atomic with the creation that follows.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod gate;
pub mod quota;
pub mod service;
pub mod types;
pub mod voice;

pub use error::{ControlError, Result};
pub use gate::AccessGate;
pub use quota::{
    check_create_agent, check_create_batch, limits_for, Limit, QuotaExceeded, Resource,
    RoleLimits,
};
pub use service::{CampaignControl, CampaignService};
pub use types::{
    BatchDetail, Caller, ChannelStatus, ConnectionCheck, ConnectionReport, ControlConfig,
    DatasetCheck, DatasetReport, IssuedSession, LoginOutcome, RoleChange, UserProfile,
};
pub use voice::{ElevenLabsClient, VoiceAgentInfo, VoicePlatform, DEFAULT_VOICE_API_URL};

#[cfg(any(test, feature = "test-utils"))]
pub use voice::MockVoicePlatform;

// Re-export commonly used types from dependencies for convenience
pub use callboard_core::{AgentId, BatchId, Role, UserId};
pub use callboard_store::{
    Agent, AgentPatch, AgentVariable, Batch, Call, NewAgent, NewBatch, Settings, SettingsUpdate,
    User,
};
