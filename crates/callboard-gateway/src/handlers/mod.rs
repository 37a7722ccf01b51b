//! HTTP request handlers.
//!
//! This module contains all the endpoint handlers for the gateway API.

pub mod admin;
pub mod agents;
pub mod auth;
pub mod batches;
pub mod calls;
pub mod health;
pub mod settings;
