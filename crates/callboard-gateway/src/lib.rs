//! HTTP gateway for the callboard campaign platform.
//!
//! This crate provides the public JSON API. It handles:
//!
//! - Bearer session authentication and admin gating
//! - REST endpoints for agents, batches, calls, settings, and administration
//! - The uniform `{"error": {"code", "message"}}` error body
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Clients (HTTP/JSON)                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     callboard-gateway                       │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │   Auth      │ │   Router    │ │    ApiError         │    │
//! │  │  Extractors │ │  + Handlers │ │    responses        │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                    ┌──────────────────┐
//!                    │  Control plane   │
//!                    └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use callboard_auth::{MembershipUnavailable, UnverifiedLogin};
//! use callboard_control::{CampaignService, ControlConfig, ElevenLabsClient, DEFAULT_VOICE_API_URL};
//! use callboard_gateway::{create_router, GatewayConfig, GatewayState};
//! use callboard_store::{MemoryRecordStore, Repository, RocksSessionStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = Arc::new(Repository::new(MemoryRecordStore::new()));
//! let sessions = Arc::new(RocksSessionStore::open("/tmp/callboard-sessions")?);
//! let control = Arc::new(CampaignService::new(
//!     repo,
//!     sessions,
//!     Arc::new(UnverifiedLogin),
//!     Arc::new(MembershipUnavailable),
//!     Arc::new(ElevenLabsClient::new(DEFAULT_VOICE_API_URL)),
//!     ControlConfig::default(),
//! ));
//!
//! let state = GatewayState::new(control, GatewayConfig::default());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::{ConfigError, GatewayConfig};
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;

// Re-export key types for convenience
pub use auth::{AdminUser, AuthUser};
