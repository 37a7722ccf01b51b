//! Core types and utilities for callboard.
//!
//! This crate provides the foundational types used throughout the callboard platform:
//!
//! - **Identifiers**: Strongly-typed virtual IDs for users, agents, batches, and calls
//! - **Roles**: The closed set of user roles that drive resource limits
//! - **Dataset validation**: The call-target list validator shared by the server and
//!   any client that wants to pre-check an upload
//!
//! The crate performs no I/O so it can be linked into both sides of the wire.
//!
//! # Example
//!
//! ```
//! use callboard_core::{dataset, AgentId, Role};
//!
//! let agent_id = AgentId::new(7);
//! assert_eq!(agent_id.get(), 7);
//!
//! assert_eq!(Role::parse("subscriber"), Some(Role::Subscriber));
//!
//! let summary = dataset::validate("phone,name\n+15550001,Ann", &["name"]).unwrap();
//! assert_eq!(summary.record_count, 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod dataset;
pub mod ids;
pub mod role;

pub use dataset::{DatasetError, DatasetFormat, DatasetSummary};
pub use ids::{AgentId, BatchId, CallId, IdError, UserId};
pub use role::Role;
