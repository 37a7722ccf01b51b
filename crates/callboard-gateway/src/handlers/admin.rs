//! Administration endpoints. Every handler requires the admin role.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use callboard_control::{AgentId, AgentPatch, CampaignControl, RoleChange, UserId};

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::state::GatewayState;

/// Every user, newest first.
///
/// # Errors
///
/// Returns 403 for non-admins.
pub async fn list_users<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AdminUser(admin): AdminUser,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let users = state.control.list_users(&admin).await?;
    Ok(Json(users))
}

/// Change a user's role.
///
/// # Errors
///
/// Returns 400 for unknown roles and 404 for unknown users.
pub async fn set_user_role<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AdminUser(admin): AdminUser,
    ApiPath(user_id): ApiPath<UserId>,
    ApiJson(change): ApiJson<RoleChange>,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let user = state
        .control
        .set_user_role(&admin, user_id, change.role)
        .await?;
    Ok(Json(user))
}

/// A user's agents.
///
/// # Errors
///
/// Returns 403 for non-admins.
pub async fn list_user_agents<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AdminUser(admin): AdminUser,
    ApiPath(user_id): ApiPath<UserId>,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let agents = state.control.list_user_agents(&admin, user_id).await?;
    Ok(Json(agents))
}

/// Update any agent.
///
/// # Errors
///
/// Returns 404 if the agent does not exist.
pub async fn update_agent<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AdminUser(admin): AdminUser,
    ApiPath(agent_id): ApiPath<AgentId>,
    ApiJson(patch): ApiJson<AgentPatch>,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    let agent = state
        .control
        .admin_update_agent(&admin, agent_id, patch)
        .await?;
    Ok(Json(agent))
}

/// Delete any agent. Unknown IDs succeed without effect.
///
/// # Errors
///
/// Returns 403 for non-admins.
pub async fn delete_agent<C>(
    State(state): State<Arc<GatewayState<C>>>,
    AdminUser(admin): AdminUser,
    ApiPath(agent_id): ApiPath<AgentId>,
) -> Result<impl IntoResponse, ApiError>
where
    C: CampaignControl + 'static,
{
    state.control.admin_delete_agent(&admin, agent_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
