//! Authentication extractors.
//!
//! `AuthUser` resolves the `Authorization: Bearer <token>` header to a caller;
//! `AdminUser` additionally requires the admin role.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use callboard_control::{CampaignControl, Caller};

use crate::error::ApiError;
use crate::state::GatewayState;

/// The bearer token of a request, if it carries one.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// An authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Caller);

/// An authenticated caller holding the admin role.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Caller);

#[async_trait]
impl<C> FromRequestParts<Arc<GatewayState<C>>> for AuthUser
where
    C: CampaignControl + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState<C>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers);
        let caller = state.control.authenticate(token).await?;
        Ok(Self(caller))
    }
}

#[async_trait]
impl<C> FromRequestParts<Arc<GatewayState<C>>> for AdminUser
where
    C: CampaignControl + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState<C>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers);
        let caller = state.control.authenticate_admin(token).await?;
        Ok(Self(caller))
    }
}
